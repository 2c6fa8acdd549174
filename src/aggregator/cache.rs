//! On-disk payload cache with TTL
//!
//! Keys are the endpoint path plus its sorted parameter pairs,
//! serialized deterministically and hashed to a file name. Writes are
//! idempotent overwrites, so concurrent writers racing on one key are
//! safe; expiry is judged by file modification time.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Cache policy injected into the aggregator once
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn with_ttl_hours(hours: u64) -> Self {
        Self {
            ttl: Duration::from_secs(hours * 3600),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::with_ttl_hours(24)
    }
}

struct MemoryEntry {
    payload: Value,
    stored_at: Instant,
}

/// Disk-backed cache with an in-memory front
pub struct DiskCache {
    dir: PathBuf,
    policy: CachePolicy,
    memory: DashMap<String, MemoryEntry>,
}

impl DiskCache {
    /// Open a cache rooted at `dir`, creating the directory
    /// idempotently.
    pub fn open(dir: impl Into<PathBuf>, policy: CachePolicy) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Cache(format!("Failed to create {}: {e}", dir.display())))?;

        Ok(Self {
            dir,
            policy,
            memory: DashMap::new(),
        })
    }

    /// Deterministic cache key: endpoint path plus sorted non-null
    /// parameter pairs.
    pub fn key(endpoint: &str, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();

        let mut key = endpoint.to_string();
        for (name, value) in sorted {
            key.push('&');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        key
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut name = String::with_capacity(64);
        for byte in digest {
            name.push_str(&format!("{byte:02x}"));
        }
        self.dir.join(format!("{name}.json"))
    }

    /// Fetch a payload if present and within TTL
    pub async fn get(&self, endpoint: &str, params: &[(String, String)]) -> Option<Value> {
        let key = Self::key(endpoint, params);

        if let Some(entry) = self.memory.get(&key) {
            if entry.stored_at.elapsed() <= self.policy.ttl {
                return Some(entry.payload.clone());
            }
        }
        self.memory.remove(&key);

        let path = self.path_for(&key);
        if !is_fresh(&path, self.policy.ttl) {
            return None;
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(payload) => {
                    debug!(endpoint, "Cache hit");
                    Some(payload)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding corrupt cache entry");
                    None
                }
            },
            Err(_) => None,
        }
    }

    /// Store a payload. Failures are logged and swallowed; a cold cache
    /// never fails a fetch.
    pub async fn put(&self, endpoint: &str, params: &[(String, String)], payload: &Value) {
        let key = Self::key(endpoint, params);
        let path = self.path_for(&key);

        match serde_json::to_vec(payload) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(path = %path.display(), error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "Cache serialization failed"),
        }

        self.memory.insert(
            key,
            MemoryEntry {
                payload: payload.clone(),
                stored_at: Instant::now(),
            },
        );
    }
}

fn is_fresh(path: &Path, ttl: Duration) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age <= ttl)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn params() -> Vec<(String, String)> {
        vec![
            ("timeLast".to_string(), "7d".to_string()),
            ("base".to_string(), "0xabc".to_string()),
        ]
    }

    #[test]
    fn test_key_is_deterministic_and_sorted() {
        let forward = DiskCache::key("/transfers", &params());
        let mut reversed = params();
        reversed.reverse();
        let backward = DiskCache::key("/transfers", &reversed);

        assert_eq!(forward, backward);
        assert_eq!(forward, "/transfers&base=0xabc&timeLast=7d");
    }

    #[tokio::test]
    async fn test_roundtrip_within_ttl() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::open(dir.path(), CachePolicy::with_ttl_hours(24)).unwrap();
        let payload = json!({"transfers": [{"historicalUSD": 1.0}]});

        cache.put("/transfers", &params(), &payload).await;
        let hit = cache.get("/transfers", &params()).await;
        assert_eq!(hit, Some(payload));
    }

    #[tokio::test]
    async fn test_expired_entry_misses() {
        let dir = tempdir().unwrap();
        let payload = json!({"ok": true});

        {
            let cache = DiskCache::open(dir.path(), CachePolicy::default()).unwrap();
            cache.put("/balances/address/0xabc", &[], &payload).await;
        }

        // Reopen with a zero TTL: the same entry must read as stale
        let cache = DiskCache::open(
            dir.path(),
            CachePolicy {
                ttl: Duration::ZERO,
            },
        )
        .unwrap();
        assert!(cache.get("/balances/address/0xabc", &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let payload = json!([1, 2, 3]);

        {
            let cache = DiskCache::open(dir.path(), CachePolicy::default()).unwrap();
            cache.put("/flow/address/0xabc", &[], &payload).await;
        }

        let cache = DiskCache::open(dir.path(), CachePolicy::default()).unwrap();
        assert_eq!(cache.get("/flow/address/0xabc", &[]).await, Some(payload));
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempdir().unwrap();
        assert!(DiskCache::open(dir.path(), CachePolicy::default()).is_ok());
        assert!(DiskCache::open(dir.path(), CachePolicy::default()).is_ok());
    }
}
