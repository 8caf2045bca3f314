//! Persistent document store contract and the in-process implementation.
//!
//! Documents are keyed by URN (`_metadata.links.self.href`); the URL of the
//! fetched resource is kept in a secondary index so the fetch layer can look
//! up prior versions and etags by URL. Reads go through a process-local,
//! best-effort TTL cache keyed by URL.

use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use thiserror::Error;

use crate::document::Document;
use crate::urn::Urn;

mod storage;

pub use storage::SnapshotStorage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document has no self link and cannot be upserted")]
    MissingSelf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub urn: Urn,
    pub url: String,
    pub version: Option<u32>,
    pub etag: Option<String>,
}

/// Narrow contract the crawler core needs from a document store. Upserts are
/// last-writer-wins; reads must be safe under concurrency.
pub trait DocumentStore: Send + Sync {
    fn get(&self, kind: &str, url: &str) -> Result<Option<Document>, StoreError>;
    fn etag(&self, kind: &str, url: &str) -> Result<Option<String>, StoreError>;
    fn upsert(&self, document: &Document) -> Result<Urn, StoreError>;
    fn list(&self, kind: &str) -> Result<Vec<DocumentSummary>, StoreError>;
    fn delete(&self, kind: &str, urn: &Urn) -> Result<bool, StoreError>;
    fn count(&self, kind: &str) -> Result<usize, StoreError>;
}

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    at: Instant,
    document: Option<Document>,
}

#[derive(Default)]
struct Inner {
    by_urn: FnvHashMap<String, Document>,
    by_url: FnvHashMap<String, String>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    cache: Mutex<FnvHashMap<String, CacheEntry>>,
    cache_ttl: Duration,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::with_cache_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(cache_ttl: Duration) -> MemoryStore {
        MemoryStore {
            inner: RwLock::new(Inner::default()),
            cache: Mutex::new(FnvHashMap::default()),
            cache_ttl,
        }
    }

    /// All stored documents, for snapshotting.
    pub fn documents(&self) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.by_urn.values().cloned().collect())
    }

    /// Rebuild the store from a snapshot. Documents without a self link are
    /// skipped with a warning.
    pub fn restore(&self, documents: Vec<Document>) -> Result<(), StoreError> {
        for document in documents {
            match self.upsert(&document) {
                Ok(_) => (),
                Err(StoreError::MissingSelf) => {
                    warn!(
                        "skipping snapshot document without self link: {}",
                        document.metadata.url
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn cached(&self, url: &str) -> Result<Option<Option<Document>>, StoreError> {
        let cache = self.cache.lock().map_err(poisoned)?;
        Ok(cache
            .get(url)
            .filter(|entry| entry.at.elapsed() < self.cache_ttl)
            .map(|entry| entry.document.clone()))
    }

    fn remember(&self, url: &str, document: Option<Document>) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().map_err(poisoned)?;
        cache.insert(
            url.to_owned(),
            CacheEntry {
                at: Instant::now(),
                document,
            },
        );
        Ok(())
    }

    fn invalidate(&self, url: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().map_err(poisoned)?;
        cache.remove(url);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> MemoryStore {
        MemoryStore::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, kind: &str, url: &str) -> Result<Option<Document>, StoreError> {
        let document = match self.cached(url)? {
            Some(cached) => cached,
            None => {
                let inner = self.inner.read().map_err(poisoned)?;
                let document = inner
                    .by_url
                    .get(url)
                    .and_then(|urn| inner.by_urn.get(urn))
                    .cloned();
                drop(inner);
                self.remember(url, document.clone())?;
                document
            }
        };

        Ok(document.filter(|d| d.metadata.kind == kind))
    }

    fn etag(&self, kind: &str, url: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(kind, url)?.and_then(|d| d.metadata.etag))
    }

    fn upsert(&self, document: &Document) -> Result<Urn, StoreError> {
        let urn = document.self_urn().ok_or(StoreError::MissingSelf)?.clone();

        let mut inner = self.inner.write().map_err(poisoned)?;
        inner
            .by_url
            .insert(document.metadata.url.clone(), urn.as_str().to_owned());
        inner
            .by_urn
            .insert(urn.as_str().to_owned(), document.clone());
        drop(inner);

        self.invalidate(&document.metadata.url)?;
        Ok(urn)
    }

    fn list(&self, kind: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut summaries: Vec<DocumentSummary> = inner
            .by_urn
            .values()
            .filter(|d| d.metadata.kind == kind)
            .map(|d| DocumentSummary {
                urn: d.self_urn().cloned().unwrap_or_else(|| "".into()),
                url: d.metadata.url.clone(),
                version: d.metadata.version,
                etag: d.metadata.etag.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.urn.cmp(&b.urn));
        Ok(summaries)
    }

    fn delete(&self, kind: &str, urn: &Urn) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        match inner.by_urn.get(urn.as_str()) {
            Some(document) if document.metadata.kind == kind => {
                let url = document.metadata.url.clone();
                inner.by_urn.remove(urn.as_str());
                inner.by_url.remove(&url);
                drop(inner);
                self.invalidate(&url)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn count(&self, kind: &str) -> Result<usize, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .by_urn
            .values()
            .filter(|d| d.metadata.kind == kind)
            .count())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_owned())
}
