use crate::Subject;
use thiserror::Error;

/// A required collaborator was never provided.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing restriction source")]
    MissingRestrictionSource,

    #[error("missing group resolver")]
    MissingGroupResolver,

    #[error("missing label lookup")]
    MissingLabelLookup,
}

/// A collaborator could not produce the data a decision depends on.
#[derive(Debug, Error)]
#[error("failed to read {what}: {source}")]
pub struct StoreError {
    what: String,
    #[source]
    source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum LookupError {
    /// The subject has no backing identity object.
    #[error("no identity object for {0}")]
    NotFound(Subject),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// === impl StoreError ===

impl StoreError {
    pub fn new(what: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            what: what.into(),
            source: source.into(),
        }
    }
}
