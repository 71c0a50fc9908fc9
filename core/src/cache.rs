//! Cache collaborator and cached downloads.
//!
//! # Design
//! `Cache` is a string-keyed byte store injected by the application; nothing
//! in this crate owns a process-wide instance. `MemoryCache` is a bounded
//! LRU implementation. `DownloadManager` serves cache hits without touching
//! the transport and stores successful downloads under their URL.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use url::Url;

use crate::error::Error;
use crate::http::{HttpRequest, DEFAULT_TIMEOUT};
use crate::response::StatusCode;
use crate::router::Outcome;
use crate::transport::{Transport, TransportTask};

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn add(&self, key: &str, data: Vec<u8>);

    /// Store `data` and return the previous value.
    fn replace(&self, key: &str, data: Vec<u8>) -> Option<Vec<u8>>;

    /// Remove and return the stored value.
    fn remove(&self, key: &str) -> Option<Vec<u8>>;
}

const DEFAULT_CAPACITY: usize = 256;

/// In-memory LRU cache.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn add(&self, key: &str, data: Vec<u8>) {
        self.lock().put(key.to_string(), data);
    }

    fn replace(&self, key: &str, data: Vec<u8>) -> Option<Vec<u8>> {
        self.lock().put(key.to_string(), data)
    }

    fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().pop(key)
    }
}

/// Downloads absolute URLs through a transport, optionally backed by a cache.
pub struct DownloadManager {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn Cache>>,
}

impl DownloadManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Fetch `url`. A cache hit completes immediately with the cached bytes
    /// and no response metadata, and returns no task.
    pub fn download<F>(&self, url: &str, completion: F) -> Option<Arc<dyn TransportTask>>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        if let Err(e) = Url::parse(url) {
            completion(Outcome {
                error: Some(Error::InvalidUrl(format!("{url}: {e}"))),
                ..Outcome::default()
            });
            return None;
        }

        if let Some(data) = self.cache.as_ref().and_then(|cache| cache.get(url)) {
            tracing::trace!(target: "request_core::cache", url=%url, "cache hit");
            completion(Outcome {
                data: Some(data),
                ..Outcome::default()
            });
            return None;
        }

        let cache = self.cache.clone();
        let key = url.to_string();
        let mut request = HttpRequest::get(url);
        request.timeout = DEFAULT_TIMEOUT;
        let task = self.transport.data_task(
            request,
            Box::new(move |outcome| {
                let succeeded = outcome.error.is_none()
                    && outcome
                        .response
                        .as_ref()
                        .is_some_and(|r| StatusCode::from_code(r.status).is_success());
                if let (true, Some(cache), Some(data)) = (succeeded, &cache, &outcome.data) {
                    cache.add(&key, data.clone());
                }
                completion(Outcome {
                    data: outcome.data,
                    response: outcome.response,
                    error: outcome.error.map(Error::from),
                })
            }),
        );
        task.resume();
        Some(task)
    }
}
