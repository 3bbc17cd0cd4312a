use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Storage for resolved values, owned by a single `LoaderWorker`.
pub trait Cache {
    type K;
    type V;

    /// Returns key value pairs for the requested keys.
    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)>;

    /// Inserts a value, replacing any previous entry.
    fn insert(&mut self, key: Self::K, value: Self::V);

    /// Inserts a value only if the key has no entry yet.
    fn insert_vacant(&mut self, key: Self::K, value: Self::V);

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)> {
        keys.iter().map(|k| (k, self.get(k))).collect::<Vec<_>>()
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        self.insert(key, value);
    }

    fn insert_vacant(&mut self, key: Self::K, value: Self::V) {
        self.entry(key).or_insert(value);
    }

    fn remove(&mut self, keys: &[Self::K]) {
        for key in keys.iter() {
            self.remove(key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }
}

/// A cache that never holds anything. Every load goes to the batch function; batching and
/// in-window deduplication still apply.
#[derive(Debug)]
pub struct NoCache<K, V>(std::marker::PhantomData<(K, V)>);

impl<K, V> Default for NoCache<K, V> {
    fn default() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<K, V> Cache for NoCache<K, V> {
    type K = K;
    type V = V;

    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)> {
        keys.iter().map(|k| (k, None)).collect()
    }

    fn insert(&mut self, _key: Self::K, _value: Self::V) {}
    fn insert_vacant(&mut self, _key: Self::K, _value: Self::V) {}
    fn remove(&mut self, _keys: &[Self::K]) {}
    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_vacant_keeps_existing_entry() {
        let mut cache: HashMap<u8, &str> = HashMap::new();
        Cache::insert(&mut cache, 1, "first");
        cache.insert_vacant(1, "second");
        cache.insert_vacant(2, "other");

        let keys = [1, 2, 3];
        let vals = cache.get_key_vals(&keys).into_iter().map(|(_, v)| v.copied()).collect::<Vec<_>>();
        assert_eq!(vals, vec![Some("first"), Some("other"), None]);
    }

    #[test]
    fn remove_and_flush() {
        let mut cache: HashMap<u8, u8> = HashMap::new();
        Cache::insert(&mut cache, 1, 10);
        Cache::insert(&mut cache, 2, 20);
        Cache::remove(&mut cache, &[1]);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&20));
        cache.flush();
        assert!(cache.is_empty());
    }

    #[test]
    fn no_cache_never_hits() {
        let mut cache = NoCache::<u8, u8>::default();
        cache.insert(1, 10);
        assert!(cache.get_key_vals(&[1]).iter().all(|(_, v)| v.is_none()));
    }
}
