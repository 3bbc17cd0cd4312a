use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a [`DataStore`](crate::DataStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("{entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: String },
    #[error("{entity} {id} already exists")]
    Conflict { entity: &'static str, id: String },
}

/// Outcome of a failed load.
///
/// A single batch fetch can fail many pending `load` calls at once, so the error is cheaply
/// cloneable and every caller of the batch window receives the same value.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("batch fetch failed: {0}")]
    Store(#[source] Arc<StoreError>),
    #[error("failed to load key {key}: {reason}")]
    Key { key: String, reason: Arc<str> },
    #[error("batch function returned {returned} results for {expected} keys")]
    ContractViolation { expected: usize, returned: usize },
    #[error("loader worker terminated before responding")]
    WorkerTerminated,
}

impl LoadError {
    /// Builds a per-key failure, suitable for placing at a single position of a batch result.
    pub fn key<K: std::fmt::Debug>(key: &K, reason: impl Into<Arc<str>>) -> Self {
        LoadError::Key { key: format!("{:?}", key), reason: reason.into() }
    }
}

impl From<StoreError> for LoadError {
    fn from(e: StoreError) -> Self {
        LoadError::Store(Arc::new(e))
    }
}
