use super::ResolveErrorKind;

/// Default error type of dependency factories.
///
/// Any error type works as long as it can absorb [`ResolveErrorKind`],
/// this one is just convenient for factories returning [`anyhow::Error`].
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
