use std::thread;
use tracing::error;

use crate::{any::DependencyInfo, context::ContextId};

/// A guard tried to release an entry that is not on top of its stack.
///
/// Overrides and scopes of one context must be closed in reverse order of opening.
/// Seeing this error means that order was broken and the state of the context can't be trusted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "\
    Stack of {dependency} in context {context} is corrupted: \
    expected entry {expected} on top, found {found:?}\
    "
)]
pub struct StackCorruption {
    pub dependency: DependencyInfo,
    pub context: ContextId,
    pub expected: u64,
    pub found: Option<u64>,
}

impl StackCorruption {
    /// Corruption is fatal: panics unless the thread is already unwinding
    pub(crate) fn raise(self) {
        if thread::panicking() {
            error!(err = %self, "Stack corrupted while unwinding");
        } else {
            panic!("{self}");
        }
    }
}
