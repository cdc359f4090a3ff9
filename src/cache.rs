//! Per-company candidate cache with a freshness window.
//!
//! Only static discovery output is cached. Entries are keyed by the
//! lowercase-trimmed company name and replaced wholesale on every fresh run.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::models::Candidate;

/// Error type for cache writes.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Cached discovery output for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Company name as given on the run that produced this entry.
    pub company: String,
    pub cached_at: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
}

impl CacheEntry {
    pub fn new(company: &str, candidates: Vec<Candidate>) -> Self {
        Self {
            company: company.to_string(),
            cached_at: Utc::now(),
            candidates,
        }
    }

    /// Fresh while `now - cached_at <= ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.cached_at) <= ttl
    }
}

/// Cache key for a company name.
pub fn cache_key(company: &str) -> String {
    company.trim().to_lowercase()
}

/// Candidate cache interface.
///
/// A missing, stale or unreadable entry is a miss; reads never fail.
#[async_trait]
pub trait CandidateCache: Send + Sync {
    /// Fresh entry for `company` as of `now`, if any.
    async fn get_at(&self, company: &str, ttl: Duration, now: DateTime<Utc>)
        -> Option<CacheEntry>;

    /// Replace the entry for `company`.
    async fn put(&self, company: &str, candidates: &[Candidate]) -> Result<(), CacheError>;

    /// Every stored entry, fresh or not, ordered by key.
    async fn entries(&self) -> Vec<CacheEntry>;

    /// Remove one company's entry, or all entries. Returns how many were removed.
    async fn remove(&self, company: Option<&str>) -> Result<usize, CacheError>;

    /// Fresh entry for `company`.
    async fn get(&self, company: &str, ttl: Duration) -> Option<CacheEntry> {
        self.get_at(company, ttl, Utc::now()).await
    }
}

type CacheDocument = BTreeMap<String, CacheEntry>;

/// Cache stored as a single JSON document on disk.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the cache file, so readers see either the old or the new
/// document. Every read-modify-write cycle holds an exclusive lock on a
/// `<cache>.lock` file next to the cache, so separate handles and separate
/// processes sharing one cache file never drop each other's entries.
pub struct JsonFileCache {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Load, modify and save the document under the file lock.
    ///
    /// `edit` returns its result and whether the document changed; an
    /// unchanged document is not rewritten.
    async fn update<T, F>(&self, edit: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&mut CacheDocument) -> (T, bool) + Send + 'static,
    {
        let _guard = self.lock.write().await;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<T, CacheError> {
            let _lock = acquire_lock(&path)?;
            let mut doc = load_document(&path);
            let (result, changed) = edit(&mut doc);
            if changed {
                save_document(&path, &doc)?;
            }
            Ok(result)
        })
        .await
        .map_err(|e| CacheError::Io(std::io::Error::other(e)))?
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Open the sidecar lock file and block until it is held exclusively.
/// The lock is released when the returned file is dropped.
fn acquire_lock(path: &Path) -> Result<File, CacheError> {
    std::fs::create_dir_all(parent_dir(path))?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))?;
    file.lock_exclusive()?;
    Ok(file)
}

/// Load the document, treating absence or corruption as empty.
fn load_document(path: &Path) -> CacheDocument {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheDocument::new(),
        Err(e) => {
            warn!("Cache {} unreadable, ignoring: {}", path.display(), e);
            return CacheDocument::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Cache {} corrupt, ignoring: {}", path.display(), e);
            CacheDocument::new()
        }
    }
}

fn save_document(path: &Path, doc: &CacheDocument) -> Result<(), CacheError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    serde_json::to_writer_pretty(&mut tmp, doc)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl CandidateCache for JsonFileCache {
    async fn get_at(
        &self,
        company: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let _guard = self.lock.read().await;
        let key = cache_key(company);
        let entry = load_document(&self.path).remove(&key)?;

        if entry.is_fresh(ttl, now) {
            debug!("Cache hit for '{}' (cached_at={})", key, entry.cached_at);
            Some(entry)
        } else {
            debug!("Cache entry for '{}' is stale (cached_at={})", key, entry.cached_at);
            None
        }
    }

    async fn put(&self, company: &str, candidates: &[Candidate]) -> Result<(), CacheError> {
        let key = cache_key(company);
        let entry = CacheEntry::new(company.trim(), candidates.to_vec());
        self.update(move |doc| {
            doc.insert(key, entry);
            ((), true)
        })
        .await
    }

    async fn entries(&self) -> Vec<CacheEntry> {
        let _guard = self.lock.read().await;
        load_document(&self.path).into_values().collect()
    }

    async fn remove(&self, company: Option<&str>) -> Result<usize, CacheError> {
        let key = company.map(cache_key);
        self.update(move |doc| {
            let removed = match key {
                Some(key) => usize::from(doc.remove(&key).is_some()),
                None => std::mem::take(doc).len(),
            };
            (removed, removed > 0)
        })
        .await
    }
}

/// In-process cache, used for `--no-cache` runs and tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry as-is, including its timestamp.
    pub async fn insert(&self, entry: CacheEntry) {
        self.entries
            .lock()
            .await
            .insert(cache_key(&entry.company), entry);
    }
}

#[async_trait]
impl CandidateCache for MemoryCache {
    async fn get_at(
        &self,
        company: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        self.entries
            .lock()
            .await
            .get(&cache_key(company))
            .filter(|entry| entry.is_fresh(ttl, now))
            .cloned()
    }

    async fn put(&self, company: &str, candidates: &[Candidate]) -> Result<(), CacheError> {
        self.insert(CacheEntry::new(company.trim(), candidates.to_vec()))
            .await;
        Ok(())
    }

    async fn entries(&self) -> Vec<CacheEntry> {
        let entries = self.entries.lock().await;
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by_key(|e| cache_key(&e.company));
        all
    }

    async fn remove(&self, company: Option<&str>) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock().await;
        Ok(match company {
            Some(company) => usize::from(entries.remove(&cache_key(company)).is_some()),
            None => entries.drain().count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscoveryMethod, DocType, PdfCandidate, ScoreBreakdown};
    use tempfile::tempdir;

    fn sample_candidates() -> Vec<Candidate> {
        let mut candidate = Candidate::new(
            "https://acme.example/investors".to_string(),
            DiscoveryMethod::Serp,
            0.9,
        );
        let mut breakdown = ScoreBreakdown::new();
        breakdown.insert("ir_path".to_string(), 0.30);
        breakdown.insert("anchor_keyword".to_string(), 0.25);
        candidate.pdfs.push(PdfCandidate {
            score: 0.30 + 0.25 + 0.10,
            score_breakdown: breakdown,
            doc_type: DocType::Annual,
            fiscal_year: Some(2023),
            anchor_text: "Annual Report 2023".to_string(),
            pdf_url: "https://acme.example/investors/ar.pdf".to_string(),
            resolved_url: "https://cdn.acme.example/ar.pdf".to_string(),
            content_length: Some(123_456),
            head_confirmed_pdf: true,
        });
        candidate.record_error("https://acme.example/x returned HTTP 404");
        vec![candidate]
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("  Acme Corp "), "acme corp");
    }

    #[test]
    fn test_freshness_boundary() {
        let entry = CacheEntry::new("Acme", Vec::new());
        let ttl = Duration::days(7);
        assert!(entry.is_fresh(ttl, entry.cached_at + ttl));
        assert!(!entry.is_fresh(ttl, entry.cached_at + ttl + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_file_round_trip_within_ttl() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache.json"));
        let candidates = sample_candidates();

        cache.put("Acme Corp", &candidates).await.unwrap();
        let entry = cache.get(" acme corp", Duration::days(7)).await.unwrap();

        assert_eq!(entry.candidates, candidates);
        assert_eq!(entry.company, "Acme Corp");
    }

    #[tokio::test]
    async fn test_file_miss_after_ttl() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache.json"));
        cache.put("Acme", &sample_candidates()).await.unwrap();

        let later = Utc::now() + Duration::days(8);
        assert!(cache.get_at("Acme", Duration::days(7), later).await.is_none());
        // The stale entry is still listed until overwritten.
        assert_eq!(cache.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss_and_recoverable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let cache = JsonFileCache::new(&path);

        assert!(cache.get("Acme", Duration::days(7)).await.is_none());
        assert!(cache.entries().await.is_empty());

        cache.put("Acme", &sample_candidates()).await.unwrap();
        assert!(cache.get("Acme", Duration::days(7)).await.is_some());
    }

    #[tokio::test]
    async fn test_put_replaces_and_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested").join("cache.json"));

        cache.put("Acme", &sample_candidates()).await.unwrap();
        cache.put("Globex", &sample_candidates()).await.unwrap();
        cache.put("ACME", &[]).await.unwrap();

        let acme = cache.get("acme", Duration::days(7)).await.unwrap();
        assert!(acme.candidates.is_empty());
        assert_eq!(
            cache.get("globex", Duration::days(7)).await.unwrap().candidates.len(),
            1
        );

        // No temporary files left behind, only the cache and its lock.
        let mut files: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["cache.json", "cache.json.lock"]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_for_different_keys() {
        let dir = tempdir().unwrap();
        let cache = std::sync::Arc::new(JsonFileCache::new(dir.path().join("cache.json")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.put(&format!("company {i}"), &[]).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.entries().await.len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_handles_on_one_file_keep_every_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut handles = Vec::new();
        for i in 0..32 {
            // A fresh handle per writer, as separate processes would have.
            let cache = JsonFileCache::new(&path);
            handles.push(tokio::spawn(async move {
                cache.put(&format!("company {i}"), &sample_candidates()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = JsonFileCache::new(&path).entries().await;
        assert_eq!(entries.len(), 32);
        assert!(entries.iter().all(|e| e.candidates.len() == 1));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache.json"));
        cache.put("Acme", &[]).await.unwrap();
        cache.put("Globex", &[]).await.unwrap();

        assert_eq!(cache.remove(Some("acme")).await.unwrap(), 1);
        assert_eq!(cache.remove(Some("acme")).await.unwrap(), 0);
        assert_eq!(cache.remove(None).await.unwrap(), 1);
        assert!(cache.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip_and_expiry() {
        let cache = MemoryCache::new();
        let candidates = sample_candidates();
        cache.put("Acme", &candidates).await.unwrap();

        let entry = cache.get("ACME", Duration::days(1)).await.unwrap();
        assert_eq!(entry.candidates, candidates);

        let later = entry.cached_at + Duration::days(2);
        assert!(cache.get_at("acme", Duration::days(1), later).await.is_none());
    }
}
