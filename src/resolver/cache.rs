use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Default number of resolved URIs kept per session
pub const DEFAULT_CAPACITY: usize = 32;

/// Bounded path -> display URI cache shared by the foreground resolver and
/// the preloader. Cleared wholesale whenever the image list is replaced.
#[derive(Debug)]
pub struct UriCache {
    entries: Mutex<LruCache<String, String>>,
}

impl UriCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.lock().get(path).cloned()
    }

    pub fn insert(&self, path: &str, uri: String) {
        self.lock().put(path.to_string(), uri);
    }

    pub fn remove(&self, path: &str) {
        self.lock().pop(path);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for UriCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
