use async_trait::async_trait;

use crate::error::LoadError;

/// Outcome for a single key: the loaded value, `None` if the resource has no such entry, or a
/// per-key error.
pub type KeyResult<V> = Result<Option<V>, LoadError>;

/// Outcome of one batch fetch. The outer error fails every key of the batch.
pub type BatchResult<V> = Result<Vec<KeyResult<V>>, LoadError>;

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives a slice of keys
/// that have been requested during the `Loader`'s most recent execution frame, and some user
/// defined context struct.
///
/// The keys are unique and appear in the order they were first requested. Like the reference
/// facebook dataloader, the returned vector must hold exactly one outcome per key, in the same
/// order as `keys`. A missing entry is reported as `Ok(None)`. Per-key outcomes, including
/// per-key errors, are cached; a failure of the whole batch is not.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    async fn load(keys: &[K], context: &Self::Context) -> BatchResult<V>;
}
