use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Drop;

use tokio::sync::{mpsc, oneshot};
use tracing_futures::Instrument;

use crate::{
    batch_function::{BatchFunction, KeyResult},
    cache::NoCache,
    config::LoaderConfig,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_many`] to fetch values from the underlying
/// resource or cache. The cache can be cleared with calls to [`Loader::clear`],
/// [`Loader::clear_many`] and [`Loader::clear_all`], and values can be added to the cache
/// out-of-band through the use of [`Loader::prime`] and [`Loader::prime_many`].
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple tasks, and the loader will enqueue the requested operations on the
/// request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader.
///
/// A loader caches everything it resolves for as long as it lives, so it should be scoped to a
/// single inbound request. Dropping the loader stops its worker.
pub struct Loader<K, V>
where
    K: 'static + Eq + Debug + Clone + Send,
    V: 'static + Send + Debug + Clone,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V> Drop for Loader<K, V>
where
    K: 'static + Eq + Debug + Clone + Send,
    V: 'static + Send + Debug + Clone,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V> Loader<K, V>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    /// Creates a new Loader for the provided BatchFunction and Context type, with the default
    /// configuration.
    ///
    /// Note: the batch function is passed in as a marker for type inference. Must be called from
    /// within a tokio runtime.
    pub fn new<F, ContextT>(batch_fn: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        Self::with_config(batch_fn, context, LoaderConfig::default())
    }

    pub fn with_config<F, ContextT>(_: F, context: ContextT, config: LoaderConfig) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let tag = config.name.unwrap_or_else(|| std::any::type_name::<(K, V)>().to_owned());
        let span = tracing::trace_span!("LoaderWorker", kv = %tag);

        let load_task_handle = if config.cache {
            let worker = LoaderWorker::<K, V, F, HashMap<K, KeyResult<V>>, ContextT>::new(
                HashMap::new(),
                rx,
                context,
                config.max_batch_size,
                config.delay,
                &tag,
            );
            tokio::task::spawn(worker.start().instrument(span))
        } else {
            let worker = LoaderWorker::<K, V, F, NoCache<K, KeyResult<V>>, ContextT>::new(
                NoCache::default(),
                rx,
                context,
                config.max_batch_size,
                config.delay,
                &tag,
            );
            tokio::task::spawn(worker.start().instrument(span))
        };

        Self { request_tx: tx, load_task_handle }
    }

    /// Loads a value from the underlying resource.
    ///
    /// Returns `Ok(None)` if the BatchFunction found no value for the key.
    ///
    /// If the value is already in the loader cache, it is returned as soon as it is processed.
    /// Otherwise, the requested key is enqueued for batch loading in the next loader execution
    /// frame.
    pub async fn load(&self, key: K) -> KeyResult<V> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::One(key, response_tx)));
        response_rx.await.unwrap_or(Err(LoadError::WorkerTerminated))
    }

    /// Loads many values at once.
    ///
    /// The result has one entry per requested key, in the same order. A failure for one key only
    /// shows up at that key's position.
    ///
    /// If all the values are already present in the loader cache, they are returned as soon as the
    /// request is processed by the worker. Otherwise, the missing keys are enqueued for batch
    /// loading in the next loader execution frame.
    pub async fn load_many(&self, keys: Vec<K>) -> Vec<KeyResult<V>> {
        let key_count = keys.len();
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx)));
        response_rx.await.unwrap_or_else(|_| vec![Err(LoadError::WorkerTerminated); key_count])
    }

    /// Adds a value to the cache, unless the key already has one.
    ///
    /// Use [`Loader::clear`] first to replace an existing value.
    pub fn prime(&self, key: K, value: V) {
        self.send(LoaderOp::Prime(key, value));
    }

    /// Adds many values to the cache at once.
    pub fn prime_many(&self, key_vals: Vec<(K, V)>) {
        self.send(LoaderOp::PrimeMany(key_vals));
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub fn clear(&self, key: K) {
        self.send(LoaderOp::Clear(key));
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub fn clear_many(&self, keys: Vec<K>) {
        self.send(LoaderOp::ClearMany(keys));
    }

    /// Empties the cache.
    pub fn clear_all(&self) {
        self.send(LoaderOp::ClearAll);
    }

    fn send(&self, op: LoaderOp<K, V>) {
        if let Err(e) = self.request_tx.send(op) {
            tracing::warn!(op = ?e.0, "loader worker is gone, dropping op");
        }
    }
}
