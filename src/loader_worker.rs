use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::time::Duration;

use futures::future::{self, FutureExt};
use tokio::sync::mpsc;

#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;
use crate::{
    batch_function::{BatchFunction, BatchResult, KeyResult},
    cache::Cache,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp},
};

/// A load request waiting on the current execution frame, together with the outcomes that were
/// already known (cached) when it arrived.
struct PendingLoad<K, V> {
    request: LoadRequest<K, V>,
    resolved: Vec<Option<KeyResult<V>>>,
}

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts its `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests
/// 2. Flushing the request queue and staging keys for loading.
/// 3. Executing its load batch function.
///
/// One cycle through this loop may be called an "execution frame", and the keys staged during
/// one frame form a batch window.
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work
/// arrives. Once the first op arrives it keeps the window open for the configured delay (or, with
/// a zero delay, yields to the scheduler once) so that sibling tasks get to enqueue their
/// requests too, including tasks running on other threads of a multi-threaded runtime.
///
/// In state (2), the worker will synchronously pull requests from the queue until there are no
/// more pending requests. Prime and Clear requests are resolved immediately against the cache.
/// For Load requests, the worker checks if the request can be resolved immediately from the
/// cache. If so, it immediately sends the value on the load request's response channel, otherwise
/// it stages the missing keys. Staged keys are unique and kept in first-seen order.
///
/// In state (3), the loader invokes its `BatchFunction` with the staged keys (split into chunks
/// if a maximum batch size is configured). Every per-key outcome, value or error, is inserted
/// into the cache. A failure of the whole batch is handed to the waiting requests but not
/// cached, so a later load retries.
pub struct LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
    keys_to_load: Vec<K>,
    staged: HashSet<K>,
    pending_requests: Vec<PendingLoad<K, V>>,
    context: ContextT,
    max_batch_size: Option<NonZeroUsize>,
    delay: Duration,
    phantom_batch_function: PhantomData<F>,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
}

impl<K, V, F, CacheT, ContextT> LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = KeyResult<V>>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
        context: ContextT,
        max_batch_size: Option<NonZeroUsize>,
        delay: Duration,
        #[allow(unused_variables)] tag: &str,
    ) -> Self {
        Self {
            cache,
            request_rx,
            keys_to_load: Vec::new(),
            staged: HashSet::new(),
            pending_requests: Vec::new(),
            context,
            max_batch_size,
            delay,
            phantom_batch_function: PhantomData,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(tag),
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first op.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            if self.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.delay).await;
            }
            // Flush remainder of the op queue before executing load.
            while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
                self.mux_op(op);
            }
            if !self.pending_requests.is_empty() {
                self.execute_load().await;
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V>) {
        match op {
            LoaderOp::Load(request) => {
                let resolved = self
                    .cache
                    .get_key_vals(request.keys())
                    .into_iter()
                    .map(|(_k, v)| v.cloned())
                    .collect::<Vec<Option<KeyResult<V>>>>();
                let keys_to_load = request
                    .keys()
                    .iter()
                    .zip(&resolved)
                    .filter_map(|(k, v)| if v.is_none() { Some(k.clone()) } else { None })
                    .collect::<Vec<_>>();
                tracing::debug!(requested_keys = ?request.keys(), ?keys_to_load);
                #[cfg(feature = "stats")]
                {
                    let requested = request.keys().len() as u32;
                    self.stats.record_load_request(requested);
                    self.stats.record_cache_hits(requested - keys_to_load.len() as u32);
                }
                if keys_to_load.is_empty() {
                    request.send_response(resolved.into_iter().flatten());
                } else {
                    for key in keys_to_load {
                        if self.staged.insert(key.clone()) {
                            self.keys_to_load.push(key);
                        }
                    }
                    self.pending_requests.push(PendingLoad { request, resolved });
                }
            }
            LoaderOp::Prime(key, value) => self.cache.insert_vacant(key, Ok(Some(value))),
            LoaderOp::PrimeMany(key_vals) => {
                for (key, value) in key_vals {
                    self.cache.insert_vacant(key, Ok(Some(value)));
                }
            }
            LoaderOp::Clear(key) => self.cache.remove(std::slice::from_ref(&key)),
            LoaderOp::ClearMany(keys) => self.cache.remove(&keys),
            LoaderOp::ClearAll => self.cache.flush(),
        }
    }

    #[tracing::instrument(skip(self), fields(keys = self.keys_to_load.len()))]
    async fn execute_load(&mut self) {
        let keys = std::mem::take(&mut self.keys_to_load);
        self.staged.clear();
        let chunk_size = self.max_batch_size.map_or(keys.len(), NonZeroUsize::get).max(1);

        let context = &self.context;
        let batches = keys
            .chunks(chunk_size)
            .map(|chunk| async move { (chunk, F::load(chunk, context).await) });
        let results = future::join_all(batches).await;

        let mut outcomes: HashMap<K, KeyResult<V>> = HashMap::with_capacity(keys.len());
        for (chunk, result) in results {
            #[cfg(feature = "stats")]
            self.stats.record_load_exec(chunk.len() as u32);
            match check_batch(chunk, result) {
                Ok(values) => {
                    for (key, value) in chunk.iter().zip(values) {
                        self.cache.insert(key.clone(), value.clone());
                        outcomes.insert(key.clone(), value);
                    }
                }
                Err(e) => {
                    for key in chunk {
                        outcomes.insert(key.clone(), Err(e.clone()));
                    }
                }
            }
        }
        #[cfg(feature = "stats")]
        self.stats.record_load_exec_completed(
            keys.len() as u32,
            outcomes.values().filter(|v| matches!(v, Ok(Some(_)))).count() as u32,
        );

        for PendingLoad { request, resolved } in self.pending_requests.drain(..) {
            let values = request
                .keys()
                .iter()
                .zip(resolved)
                // Every key missing from the cache was staged, so it has an outcome.
                .map(|(k, known)| known.or_else(|| outcomes.get(k).cloned()).unwrap_or(Ok(None)))
                .collect::<Vec<_>>();
            request.send_response(values);
        }
    }
}

/// Validates the batch function's reply against the keys it was given.
fn check_batch<K: Debug, V>(keys: &[K], result: BatchResult<V>) -> BatchResult<V> {
    match result {
        Ok(values) if values.len() == keys.len() => Ok(values),
        Ok(values) => {
            tracing::error!(
                expected = keys.len(),
                returned = values.len(),
                ?keys,
                "batch function returned the wrong number of results"
            );
            Err(LoadError::ContractViolation { expected: keys.len(), returned: values.len() })
        }
        Err(e) => {
            tracing::warn!(error = %e, ?keys, "batch load failed");
            Err(e)
        }
    }
}
