//! Implementation of `formulary cache`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::cache::{ArtifactCache, CacheEntry};

/// Every persisted cache entry, ordered by formula.
pub fn list_entries(cache_dir: &Path) -> Result<Vec<Arc<CacheEntry>>> {
    Ok(ArtifactCache::load(cache_dir)?.entries())
}

/// Remove every persisted entry for `formula`. Returns how many were removed.
pub fn invalidate(cache_dir: &Path, formula: &str) -> Result<usize> {
    let cache = ArtifactCache::load(cache_dir)?;
    let removed = cache.invalidate(formula);
    cache.flush()?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use tempfile::TempDir;

    #[test]
    fn test_invalidate_persists() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = tmp.path().join("cache");
        let prefix = tmp.path().join("Cellar/eigen/1");
        std::fs::create_dir_all(&prefix).unwrap();

        let cache = ArtifactCache::load(&cache_dir).unwrap();
        cache.store(CacheEntry::new("eigen", CacheKey::new("e1"), prefix));
        cache.flush().unwrap();

        assert_eq!(list_entries(&cache_dir).unwrap().len(), 1);
        assert_eq!(invalidate(&cache_dir, "eigen").unwrap(), 1);
        assert!(list_entries(&cache_dir).unwrap().is_empty());
        assert_eq!(invalidate(&cache_dir, "eigen").unwrap(), 0);
    }
}
