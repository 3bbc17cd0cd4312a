/// Counters kept by a `LoaderWorker` when the `stats` feature is enabled. They are reported
/// through `tracing` once the worker shuts down.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Human readable name used to identify this worker stats when it is reported.
    tag: String,
    /// Number of `LoaderOp::Load` that were received by the worker.
    load_requests: u32,
    /// The total number of keys that were requested for loading (not necessarily unique).
    items_requested: u32,
    /// The number of keys that were immediately found in the loader cache.
    cache_hits: u32,
    /// Number of batch function invocations.
    loads: u32,
    /// The average number of keys passed to a batch function invocation.
    average_batch_size: f32,
    /// The max number of keys passed to a single batch function invocation.
    max_batch_size: u32,
    /// The min number of keys passed to a single batch function invocation.
    min_batch_size: u32,

    /// The max number of unique keys fetched during one execution frame.
    max_window_size: u32,
    /// The min number of unique keys fetched during one execution frame.
    min_window_size: u32,
    /// The total number of keys that resolved to a value.
    items_loaded: u32,
}

impl WorkerStats {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            min_batch_size: u32::MAX,
            min_window_size: u32::MAX,
            ..Default::default()
        }
    }

    pub fn record_load_request(&mut self, items_requested: u32) {
        self.load_requests += 1;
        self.items_requested += items_requested;
    }

    pub fn record_cache_hits(&mut self, hits: u32) {
        self.cache_hits += hits;
    }

    pub fn record_load_exec(&mut self, batch_size: u32) {
        let new_total_load = self.loads + 1;
        self.average_batch_size = (((self.average_batch_size as f64 * self.loads as f64)
            + batch_size as f64)
            / new_total_load as f64) as f32;
        self.loads = new_total_load;
        self.max_batch_size = self.max_batch_size.max(batch_size);
        self.min_batch_size = self.min_batch_size.min(batch_size);
    }

    pub fn record_load_exec_completed(&mut self, window_size: u32, loaded_item_count: u32) {
        self.items_loaded += loaded_item_count;
        self.max_window_size = self.max_window_size.max(window_size);
        self.min_window_size = self.min_window_size.min(window_size);
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_batch_extremes_and_average() {
        let mut stats = WorkerStats::new("test");
        stats.record_load_exec(2);
        stats.record_load_exec(6);
        stats.record_load_exec_completed(8, 5);
        assert_eq!(stats.loads, 2);
        assert_eq!(stats.max_batch_size, 6);
        assert_eq!(stats.min_batch_size, 2);
        assert!((stats.average_batch_size - 4.0).abs() < f32::EPSILON);
        assert_eq!(stats.max_window_size, 8);
        assert_eq!(stats.items_loaded, 5);
    }
}
