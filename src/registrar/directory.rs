use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Directory lookup/mutation error.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory user {0} not found")]
    UserNotFound(String),
    #[error("directory backend unavailable: {0}")]
    Unavailable(String),
}

/// Privilege directory for administrative users. The bulk enrollment endpoint
/// consults it to authorize the requesting administrator.
pub trait AdminDirectory: Send + Sync {
    fn privileges_for(&self, user: &str) -> Result<HashSet<String>, DirectoryError>;
    fn grant(&self, user: &str, privilege: &str) -> Result<(), DirectoryError>;
    fn revoke(&self, user: &str, privilege: &str) -> Result<(), DirectoryError>;
}

/// Instance-owned TTL cache. Entries are loaded through the supplied closure
/// on miss or expiry; there is no background eviction, stale entries are
/// replaced on access and removed by `invalidate`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value, or run `load` and cache its result. A load
    /// failure is returned without poisoning the entry.
    pub fn get_with<E>(
        &self,
        key: &K,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Ok(entries) = self.entries.lock() {
            if let Some((stored_at, value)) = entries.get(key) {
                if stored_at.elapsed() < self.ttl {
                    return Ok(value.clone());
                }
            }
        }

        let value = load()?;
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), (Instant::now(), value.clone()));
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// Read-through caching decorator over any [`AdminDirectory`]. Lookups are
/// served from a per-instance TTL cache; every mutation invalidates the
/// affected user before delegating.
pub struct CachedAdminDirectory<D> {
    inner: Arc<D>,
    cache: TtlCache<String, HashSet<String>>,
}

impl<D: AdminDirectory> CachedAdminDirectory<D> {
    pub fn new(inner: Arc<D>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }
}

impl<D: AdminDirectory> AdminDirectory for CachedAdminDirectory<D> {
    fn privileges_for(&self, user: &str) -> Result<HashSet<String>, DirectoryError> {
        let key = user.to_string();
        self.cache.get_with(&key, || {
            debug!(user, "privilege cache miss");
            self.inner.privileges_for(user)
        })
    }

    fn grant(&self, user: &str, privilege: &str) -> Result<(), DirectoryError> {
        self.cache.invalidate(&user.to_string());
        self.inner.grant(user, privilege)
    }

    fn revoke(&self, user: &str, privilege: &str) -> Result<(), DirectoryError> {
        self.cache.invalidate(&user.to_string());
        self.inner.revoke(user, privilege)
    }
}

/// Mutex-backed directory for demos and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    privileges: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: &str, privileges: &[&str]) -> Self {
        if let Ok(mut map) = self.privileges.lock() {
            map.insert(
                user.to_string(),
                privileges.iter().map(|p| p.to_string()).collect(),
            );
        }
        self
    }
}

impl AdminDirectory for MemoryDirectory {
    fn privileges_for(&self, user: &str) -> Result<HashSet<String>, DirectoryError> {
        let map = self
            .privileges
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        map.get(user)
            .cloned()
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))
    }

    fn grant(&self, user: &str, privilege: &str) -> Result<(), DirectoryError> {
        let mut map = self
            .privileges
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        map.entry(user.to_string())
            .or_default()
            .insert(privilege.to_string());
        Ok(())
    }

    fn revoke(&self, user: &str, privilege: &str) -> Result<(), DirectoryError> {
        let mut map = self
            .privileges
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        let entry = map
            .get_mut(user)
            .ok_or_else(|| DirectoryError::UserNotFound(user.to_string()))?;
        entry.remove(privilege);
        Ok(())
    }
}
