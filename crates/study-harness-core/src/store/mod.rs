//! Session storage abstraction for Study Harness.
//!
//! The [`SessionStore`] trait is the only contract the retrieval pipeline
//! has with its session storage: per-user replace, read, remove, and an
//! age-based sweep. The default backend is the process-local
//! [`InMemorySessionStore`](memory::InMemorySessionStore); a shared cache
//! can be swapped in when the service runs on more than one instance.
//!
//! Callers must not assume entries survive a restart.
//!
//! [`SessionCache`] layers the session lifecycle on top of a store: it
//! holds the TTL and runs the eviction sweep opportunistically on every
//! put, so no background scheduler is needed.

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::StudyError;
use crate::models::SessionEntry;

/// Default session time-to-live: one hour.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3_600;

/// Abstract per-user session storage.
///
/// Implementations must be `Send + Sync` and safe under concurrent access.
/// Writes are last-writer-wins; no read-modify-write transaction exists.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put`](SessionStore::put) | Replace the entry for `entry.user_id` |
/// | [`get`](SessionStore::get) | Read a user's entry, regardless of age |
/// | [`remove`](SessionStore::remove) | Drop a user's entry |
/// | [`evict_expired`](SessionStore::evict_expired) | Remove every entry older than `ttl` |
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `entry`, unconditionally replacing any entry for the same user.
    async fn put(&self, entry: SessionEntry) -> Result<()>;

    /// Read a user's entry. Expiry is not checked here.
    async fn get(&self, user_id: &str) -> Result<Option<Arc<SessionEntry>>>;

    /// Remove a user's entry. Returns whether one existed.
    async fn remove(&self, user_id: &str) -> Result<bool>;

    /// Remove every entry with `now - loaded_at > ttl`. Returns the number
    /// of entries removed.
    async fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize>;
}

/// Session lifecycle over a [`SessionStore`] backend.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the user's entry, then sweep expired entries using the new
    /// entry's `loaded_at` as the current time.
    pub async fn put(&self, entry: SessionEntry) -> Result<(), StudyError> {
        let now = entry.loaded_at;
        self.store.put(entry).await.map_err(store_error)?;
        let evicted = self
            .store
            .evict_expired(now, self.ttl)
            .await
            .map_err(store_error)?;
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired study sessions");
        }
        Ok(())
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<Arc<SessionEntry>>, StudyError> {
        self.store.get(user_id).await.map_err(store_error)
    }

    pub async fn remove(&self, user_id: &str) -> Result<bool, StudyError> {
        self.store.remove(user_id).await.map_err(store_error)
    }

    pub async fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, StudyError> {
        self.store
            .evict_expired(now, self.ttl)
            .await
            .map_err(store_error)
    }
}

fn store_error(e: anyhow::Error) -> StudyError {
    StudyError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::memory::InMemorySessionStore;
    use super::*;
    use crate::models::{Chunk, SourceDocument, SourceKind};

    fn entry(user: &str, text: &str, loaded_at: DateTime<Utc>) -> SessionEntry {
        let doc = SourceDocument::from_raw(text, "label", SourceKind::Upload, 1).unwrap();
        let chunks = vec![Chunk {
            index: 0,
            text: doc.text.clone(),
        }];
        SessionEntry::new(user, doc, chunks, loaded_at)
    }

    fn cache() -> SessionCache {
        SessionCache::new(
            Arc::new(InMemorySessionStore::new()),
            Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        )
    }

    #[tokio::test]
    async fn put_replaces_never_merges() {
        let cache = cache();
        let now = Utc::now();
        cache.put(entry("u1", "first material", now)).await.unwrap();
        cache.put(entry("u1", "second material", now)).await.unwrap();

        let got = cache.get("u1").await.unwrap().unwrap();
        assert_eq!(got.document.text, "second material");
        assert_eq!(got.chunks.len(), 1);
    }

    #[tokio::test]
    async fn put_sweeps_expired_entries_of_other_users() {
        let cache = cache();
        let now = Utc::now();
        cache
            .put(entry("stale", "old material", now - Duration::minutes(61)))
            .await
            .unwrap();
        assert!(cache.get("stale").await.unwrap().is_some());

        cache.put(entry("fresh", "new material", now)).await.unwrap();
        assert!(cache.get("stale").await.unwrap().is_none());
        assert!(cache.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_serves_stale_entries_until_swept() {
        let cache = cache();
        let loaded = Utc::now() - Duration::hours(2);
        cache.put(entry("u1", "material", loaded)).await.unwrap();

        // The sweep on put ran with the entry's own timestamp, so it survives.
        assert!(cache.get("u1").await.unwrap().is_some());

        let evicted = cache.evict_expired(Utc::now()).await.unwrap();
        assert_eq!(evicted, 1);
        assert!(cache.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_clears_entry() {
        let cache = cache();
        cache.put(entry("u1", "material", Utc::now())).await.unwrap();
        assert!(cache.remove("u1").await.unwrap());
        assert!(!cache.remove("u1").await.unwrap());
        assert!(cache.get("u1").await.unwrap().is_none());
    }
}
