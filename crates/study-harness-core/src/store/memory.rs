//! In-memory [`SessionStore`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Entries are held as
//! `Arc<SessionEntry>` so reads never copy the document text. Nothing is
//! persisted; a restart loses every session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::models::SessionEntry;

use super::SessionStore;

/// Process-local session store.
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Arc<SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live entries, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("session store lock poisoned")
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, entry: SessionEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(entry.user_id.clone(), Arc::new(entry));
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Arc<SessionEntry>>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(user_id).cloned())
    }

    async fn remove(&self, user_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(user_id).is_some())
    }

    async fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, e| now - e.loaded_at <= ttl);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceDocument, SourceKind};

    fn entry(user: &str, loaded_at: DateTime<Utc>) -> SessionEntry {
        let doc =
            SourceDocument::from_raw("some study text", "notes.txt", SourceKind::Upload, 1)
                .unwrap();
        SessionEntry::new(user, doc, Vec::new(), loaded_at)
    }

    #[tokio::test]
    async fn one_entry_per_user() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        store.put(entry("a", now)).await.unwrap();
        store.put(entry("a", now)).await.unwrap();
        store.put(entry("b", now)).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn evicts_only_entries_older_than_ttl() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let ttl = Duration::hours(1);
        store.put(entry("old", now - Duration::minutes(90))).await.unwrap();
        store.put(entry("edge", now - ttl)).await.unwrap();
        store.put(entry("new", now)).await.unwrap();

        assert!(store.get("old").await.unwrap().is_some());
        let removed = store.evict_expired(now, ttl).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("old").await.unwrap().is_none());
        assert!(store.get("edge").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_puts_leave_one_entry() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.put(entry("racer", Utc::now())).await.unwrap();
                store.get("racer").await.unwrap().is_some()
            }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
        assert_eq!(store.len(), 1);
    }
}
