//! Document cache: acquired code pages keyed by jurisdiction and source.
//!
//! Entries are JSON files written atomically (temp file + rename), so
//! concurrent promotions for the same key resolve as last-writer-wins and
//! readers never see a torn file. Freshness is judged by the caller against
//! `fetched_at`; expired entries stay on disk for the stale-cache rung.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// A previously acquired document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub jurisdiction_id: String,
    pub source_url: String,
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedDocument {
    /// Whether the entry is younger than `ttl` at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.fetched_at) < ttl,
            Err(_) => true,
        }
    }
}

/// Key-addressed document store.
pub trait CacheStore: Send + Sync {
    /// The entry for `key`, fresh or not.
    fn get(&self, key: &str) -> Result<Option<CachedDocument>>;
    /// Insert or overwrite the entry for `key`.
    fn put(&self, key: &str, doc: &CachedDocument) -> Result<()>;
    /// Remove an entry; returns whether one existed.
    fn remove(&self, key: &str) -> Result<bool>;
    /// All entries with their keys.
    fn entries(&self) -> Result<Vec<(String, CachedDocument)>>;
}

/// Cache key for a jurisdiction's source document.
pub fn cache_key(jurisdiction_id: &str, source_url: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("key regex is valid"));
    let source = source_url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let source: String = re.replace_all(source, "_").chars().take(120).collect();
    format!("{}__{}", re.replace_all(jurisdiction_id, "_"), source)
}

/// Filesystem cache, one JSON file per key.
pub struct FileCacheStore {
    cache_dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;
        tracing::debug!("document cache at {}", cache_dir.display());
        Ok(Self { cache_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<CachedDocument>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read cache entry: {}", path.display()))?;
        match serde_json::from_str(&data) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!("ignoring corrupt cache entry {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, doc: &CachedDocument) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self
            .cache_dir
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        let data = serde_json::to_vec(doc)?;
        fs::write(&tmp, data)
            .with_context(|| format!("failed to write cache file: {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e)
                .with_context(|| format!("failed to promote cache file: {}", path.display()));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove cache entry: {}", path.display()))?;
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<(String, CachedDocument)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(doc) = self.get(key)? {
                out.push((key.to_string(), doc));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// In-process cache, for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CachedDocument>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<CachedDocument>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn put(&self, key: &str, doc: &CachedDocument) -> Result<()> {
        self.entries.insert(key.to_string(), doc.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn entries(&self) -> Result<Vec<(String, CachedDocument)>> {
        let mut out: Vec<(String, CachedDocument)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
