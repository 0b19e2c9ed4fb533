//! Artifact cache.
//!
//! Completed builds are recorded by cache key. The cache is shared by every
//! build job of a run. Lookups load an immutable snapshot of the entry map
//! and never wait on writers; a store publishes a new snapshot. Writes for
//! the same key are serialized by a per-key mutex, so the first writer wins.
//!
//! On disk each entry is one JSON file, `<cache>/entries/<key>.json`, written
//! atomically. Entries are loaded once at the start of a run and written back
//! by [`ArtifactCache::flush`] at the end.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::fs::{ensure_dir, read_to_string, write_atomic};

const ENTRIES_DIR: &str = "entries";

/// Hex fingerprint identifying one formula build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(hex: impl Into<String>) -> Self {
        CacheKey(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in install paths and reports.
    pub fn short(&self) -> &str {
        self.0.get(..16).unwrap_or(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed build. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub formula: String,
    pub key: CacheKey,
    pub install_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(formula: impl Into<String>, key: CacheKey, install_path: PathBuf) -> Self {
        CacheEntry {
            formula: formula.into(),
            key,
            install_path,
            created_at: Utc::now(),
        }
    }

    /// Whether the recorded install path still exists.
    pub fn is_live(&self) -> bool {
        self.install_path.is_dir()
    }
}

/// Shared store of completed builds.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    dir: Option<PathBuf>,
    entries: ArcSwap<HashMap<CacheKey, Arc<CacheEntry>>>,
    key_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    dirty: Mutex<HashSet<CacheKey>>,
    removed: Mutex<HashSet<CacheKey>>,
}

impl ArtifactCache {
    /// A cache that lives only for this process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load every entry persisted under `dir`.
    ///
    /// Unreadable entry files are skipped with a warning; a corrupt entry
    /// only costs a rebuild.
    pub fn load(dir: &Path) -> Result<Self> {
        let entries_dir = dir.join(ENTRIES_DIR);
        let mut entries = HashMap::new();

        if entries_dir.is_dir() {
            let listing = std::fs::read_dir(&entries_dir)
                .with_context(|| format!("failed to read {}", entries_dir.display()))?;
            for file in listing {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match read_entry(&path) {
                    Ok(entry) => {
                        entries.insert(entry.key.clone(), Arc::new(entry));
                    }
                    Err(e) => tracing::warn!("ignoring cache entry {}: {:#}", path.display(), e),
                }
            }
        }

        tracing::debug!("loaded {} cache entr(ies) from {}", entries.len(), dir.display());
        Ok(ArtifactCache {
            dir: Some(dir.to_path_buf()),
            entries: ArcSwap::from_pointee(entries),
            ..Self::default()
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Entry for `key`, if one exists and its install path is still present.
    pub fn lookup(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.entries.load().get(key).filter(|e| e.is_live()).cloned()
    }

    /// Record a completed build.
    ///
    /// Writers for the same key are serialized. If a live entry already
    /// exists it is kept and returned instead of `entry`; a stale entry
    /// (install path gone) is superseded.
    pub fn store(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let key_lock = self.key_lock(&entry.key);
        let _guard = key_lock.lock().unwrap();

        if let Some(existing) = self.lookup(&entry.key) {
            tracing::debug!("cache entry {} already stored", entry.key.short());
            return existing;
        }

        let key = entry.key.clone();
        let entry = Arc::new(entry);
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), Arc::clone(&entry));
            next
        });
        self.removed.lock().unwrap().remove(&key);
        self.dirty.lock().unwrap().insert(key);
        entry
    }

    /// Drop every entry recorded for `formula`. Returns how many were removed.
    pub fn invalidate(&self, formula: &str) -> usize {
        let mut keys: Vec<CacheKey> = Vec::new();
        self.entries.rcu(|current| {
            keys = current
                .values()
                .filter(|e| e.formula == formula)
                .map(|e| e.key.clone())
                .collect();
            let mut next = HashMap::clone(current);
            for key in &keys {
                next.remove(key);
            }
            next
        });

        let mut removed = self.removed.lock().unwrap();
        let mut dirty = self.dirty.lock().unwrap();
        for key in &keys {
            dirty.remove(key);
            removed.insert(key.clone());
        }

        tracing::debug!("invalidated {} cache entr(ies) for {}", keys.len(), formula);
        keys.len()
    }

    /// Snapshot of all entries, ordered by formula name then creation time.
    pub fn entries(&self) -> Vec<Arc<CacheEntry>> {
        let mut out: Vec<_> = self.entries.load().values().cloned().collect();
        out.sort_by(|a, b| {
            a.formula
                .cmp(&b.formula)
                .then(a.created_at.cmp(&b.created_at))
        });
        out
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist new entries and delete invalidated ones.
    ///
    /// A no-op for in-memory caches.
    pub fn flush(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let entries_dir = dir.join(ENTRIES_DIR);
        ensure_dir(&entries_dir)?;

        let removed: Vec<CacheKey> = self.removed.lock().unwrap().drain().collect();
        for key in removed {
            let path = entry_path(&entries_dir, &key);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to remove {}", path.display()))
                }
            }
        }

        let dirty: Vec<CacheKey> = self.dirty.lock().unwrap().drain().collect();
        let entries = self.entries.load_full();
        for key in dirty {
            let Some(entry) = entries.get(&key) else {
                continue;
            };
            let json = serde_json::to_vec_pretty(entry.as_ref())
                .context("failed to serialize cache entry")?;
            write_atomic(&entry_path(&entries_dir, &key), &json)?;
        }

        Ok(())
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap();
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}

fn entry_path(entries_dir: &Path, key: &CacheKey) -> PathBuf {
    entries_dir.join(format!("{}.json", key.as_str()))
}

fn read_entry(path: &Path) -> Result<CacheEntry> {
    let contents = read_to_string(path)?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn entry_in(tmp: &TempDir, formula: &str, key: &str) -> CacheEntry {
        let install = tmp.path().join("Cellar").join(formula).join(key);
        std::fs::create_dir_all(&install).unwrap();
        CacheEntry::new(formula, CacheKey::new(key), install)
    }

    #[test]
    fn test_store_and_lookup() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::in_memory();
        let entry = entry_in(&tmp, "cmake", "aaaa");

        assert!(cache.lookup(&entry.key).is_none());
        cache.store(entry.clone());
        assert_eq!(cache.lookup(&entry.key).unwrap().install_path, entry.install_path);
    }

    #[test]
    fn test_lookup_ignores_missing_install_path() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::in_memory();
        let entry = entry_in(&tmp, "cmake", "aaaa");
        cache.store(entry.clone());

        std::fs::remove_dir_all(&entry.install_path).unwrap();
        assert!(cache.lookup(&entry.key).is_none());
    }

    #[test]
    fn test_first_writer_wins() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::in_memory();
        let first = entry_in(&tmp, "eigen", "k1");
        let mut second = entry_in(&tmp, "eigen", "k1");
        second.install_path = tmp.path().join("elsewhere");
        std::fs::create_dir_all(&second.install_path).unwrap();

        cache.store(first.clone());
        let kept = cache.store(second);
        assert_eq!(kept.install_path, first.install_path);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_store_same_key() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(ArtifactCache::in_memory());
        let candidates: Vec<CacheEntry> = (0..8)
            .map(|i| {
                let install = tmp.path().join(format!("prefix-{i}"));
                std::fs::create_dir_all(&install).unwrap();
                CacheEntry::new("flann", CacheKey::new("shared"), install)
            })
            .collect();

        let handles: Vec<_> = candidates
            .into_iter()
            .map(|entry| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.store(entry).install_path.clone())
            })
            .collect();
        let winners: HashSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(winners.len(), 1);
        let stored = cache.lookup(&CacheKey::new("shared")).unwrap();
        assert!(winners.contains(&stored.install_path));
    }

    #[test]
    fn test_concurrent_store_distinct_keys() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(ArtifactCache::in_memory());
        let before = cache.entries();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let entry = entry_in(&tmp, "pcl", &format!("k{i}"));
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.store(entry);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert!((0..16).all(|i| cache.lookup(&CacheKey::new(format!("k{i}"))).is_some()));
        assert!(before.is_empty());
    }

    #[test]
    fn test_invalidate_by_formula() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::in_memory();
        cache.store(entry_in(&tmp, "vtk", "k1"));
        cache.store(entry_in(&tmp, "vtk", "k2"));
        cache.store(entry_in(&tmp, "qhull", "k3"));

        assert_eq!(cache.invalidate("vtk"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&CacheKey::new("k3")).is_some());
    }

    #[test]
    fn test_flush_and_reload() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cache");

        let cache = ArtifactCache::load(&dir).unwrap();
        cache.store(entry_in(&tmp, "boost", "b1"));
        cache.store(entry_in(&tmp, "flann", "f1"));
        cache.flush().unwrap();
        assert!(dir.join("entries").join("b1.json").is_file());

        let reloaded = ArtifactCache::load(&dir).unwrap();
        let names: Vec<_> = reloaded.entries().iter().map(|e| e.formula.clone()).collect();
        assert_eq!(names, vec!["boost", "flann"]);

        reloaded.invalidate("boost");
        reloaded.flush().unwrap();
        assert!(!dir.join("entries").join("b1.json").exists());
        assert_eq!(ArtifactCache::load(&dir).unwrap().len(), 1);
    }

    #[test]
    fn test_load_skips_corrupt_entries() {
        let tmp = TempDir::new().unwrap();
        let entries = tmp.path().join("entries");
        std::fs::create_dir_all(&entries).unwrap();
        std::fs::write(entries.join("bad.json"), "{ not json").unwrap();

        let cache = ArtifactCache::load(tmp.path()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_short_key() {
        let key = CacheKey::new("0123456789abcdef0123");
        assert_eq!(key.short(), "0123456789abcdef");
        assert_eq!(CacheKey::new("ab").short(), "ab");
    }
}
