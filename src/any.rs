use core::{
    any::{type_name, Any},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
};
use std::sync::Arc;

pub(crate) type RcAny = Arc<dyn Any + Send + Sync>;

/// Process-unique identity of a dependency.
///
/// Allocated once per constructed dependency and shared by its clones.
/// Two dependencies built from the same closure never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyId(u64);

impl DependencyId {
    #[inline]
    #[must_use]
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl Display for DependencyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DependencyInfo {
    pub id: DependencyId,
    pub name: &'static str,
}

impl PartialEq for DependencyInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DependencyInfo {}

impl Hash for DependencyInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for DependencyInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DependencyInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl DependencyInfo {
    /// Allocates a fresh identity for a dependency providing `T`
    #[inline]
    #[must_use]
    pub(crate) fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            id: DependencyId::next(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let name = self.name.split_once('<').map_or(self.name, |(name, _)| name);
        name.rsplit_once("::").map_or(name, |(_, name)| name)
    }
}

impl Display for DependencyInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.short_name(), self.id)
    }
}
