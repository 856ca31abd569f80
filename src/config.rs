/// Config for a dependency provider
/// ## Fields
/// - `cache_provides`:
///   If `true`, the first value produced by the factory is cached for the whole process
///   and every later resolution returns a clone of it.
///
///   The cache is never invalidated and isn't per context.
///   Active overrides still take precedence over the cached value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub cache_provides: bool,
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn cached() -> Self {
        Self { cache_provides: true }
    }
}

/// Config for a contextual dependency
/// ## Fields
/// - `detect_leaks`:
///   If `true`, releasing a scope while references to its resource are still alive
///   is reported as [`crate::ResolveErrorKind::DependencyLeak`].
///
///   The resource is released in both cases, only the report is affected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeConfig {
    pub detect_leaks: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self { detect_leaks: true }
    }
}

/// What a newly spawned execution context sees of its parent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InheritPolicy {
    /// The child starts without overrides and scopes
    #[default]
    Isolated,
    /// The child starts with a copy of the parent's overrides and scopes taken at spawn time.
    /// Later changes on either side are not visible to the other one.
    Snapshot,
}
