use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// The default is 1ms, which is enough for sibling resolvers running on other worker threads of
/// a multi-threaded runtime to enqueue their keys.
const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// Tunables for a [`Loader`](crate::Loader).
///
/// Deserializable so it can sit inside an application's configuration file; every field is
/// optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Tag used for the worker's tracing span. Defaults to the key/value type names.
    pub name: Option<String>,
    /// Upper bound on keys handed to a single batch function call. A larger window is split into
    /// consecutive chunks, preserving key order.
    pub max_batch_size: Option<NonZeroUsize>,
    /// Whether resolved values are memoized for the lifetime of the loader.
    pub cache: bool,
    /// How long the worker keeps the batch window open after the first op arrives. Zero only
    /// yields to the scheduler once, which coalesces reliably on a current-thread runtime only.
    #[serde(rename = "delayMs", deserialize_with = "deserialize_millis")]
    pub delay: Duration,
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { name: None, max_batch_size: None, cache: true, delay: DEFAULT_DELAY }
    }
}

impl LoaderConfig {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// A size of zero removes the limit.
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = NonZeroUsize::new(size);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: LoaderConfig = serde_json::from_str(r#"{ "maxBatchSize": 50 }"#).unwrap();
        assert_eq!(config.max_batch_size, NonZeroUsize::new(50));
        assert!(config.cache);
        assert_eq!(config.name, None);
        assert_eq!(config.delay, DEFAULT_DELAY);
    }

    #[test]
    fn delay_is_read_in_milliseconds() {
        let config: LoaderConfig = serde_json::from_str(r#"{ "delayMs": 5 }"#).unwrap();
        assert_eq!(config.delay, Duration::from_millis(5));
    }

    #[test]
    fn zero_batch_size_means_unbounded() {
        let config = LoaderConfig::default().max_batch_size(0).cache(false).name("users");
        assert_eq!(config.max_batch_size, None);
        assert!(!config.cache);
        assert_eq!(config.name.as_deref(), Some("users"));
    }
}
