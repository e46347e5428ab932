//! Artifact cache - load-once storage for model sessions and transforms
//!
//! Check (read lock) → take load lock → re-check → load → insert.
//! Concurrent first use of the same key performs a single load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

pub struct ArtifactCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
    load_lock: Mutex<()>,
    loads: AtomicU64,
}

impl<T> ArtifactCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(()),
            loads: AtomicU64::new(0),
        }
    }

    /// Return the cached artifact, running `loader` at most once per key
    pub fn get_or_load<E, F>(&self, key: &str, loader: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(hit) = self.entries.read().get(key) {
            return Ok(Arc::clone(hit));
        }

        let _guard = self.load_lock.lock();
        if let Some(hit) = self.entries.read().get(key) {
            return Ok(Arc::clone(hit));
        }

        let artifact = Arc::new(loader()?);
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(key.to_string(), Arc::clone(&artifact));
        Ok(artifact)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of loader runs so far
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Release every cached artifact
    pub fn clear(&self) {
        let _guard = self.load_lock.lock();
        let released = {
            let mut entries = self.entries.write();
            let n = entries.len();
            entries.clear();
            n
        };
        if released > 0 {
            log::info!("Released {} cached model artifacts", released);
        }
    }
}

impl<T> Default for ArtifactCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_loads_once() {
        let cache: ArtifactCache<String> = ArtifactCache::new();
        let a = cache.get_or_load::<(), _>("m", || Ok("model".to_string())).unwrap();
        let b = cache.get_or_load::<(), _>("m", || Ok("other".to_string())).unwrap();
        assert_eq!(*a, "model");
        assert_eq!(*b, "model");
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn test_failed_load_not_cached() {
        let cache: ArtifactCache<u32> = ArtifactCache::new();
        let err = cache.get_or_load("k", || Err::<u32, _>("boom"));
        assert!(err.is_err());
        assert!(!cache.contains("k"));
        assert_eq!(*cache.get_or_load::<(), _>("k", || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_concurrent_first_use_single_load() {
        let cache: Arc<ArtifactCache<u64>> = Arc::new(ArtifactCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache
                        .get_or_load::<(), _>("shared", || {
                            thread::sleep(Duration::from_millis(20));
                            Ok(42)
                        })
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(*h.join().unwrap(), 42);
        }
        assert_eq!(cache.load_count(), 1);
    }

    #[test]
    fn test_clear_forces_reload() {
        let cache: ArtifactCache<u8> = ArtifactCache::new();
        cache.get_or_load::<(), _>("a", || Ok(1)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.get_or_load::<(), _>("a", || Ok(2)).unwrap();
        assert_eq!(cache.load_count(), 2);
    }
}
