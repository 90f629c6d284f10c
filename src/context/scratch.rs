//! Session-scoped scratch storage that outlives the provider redirect
//!
//! The only state a handshake keeps between its two requests is the
//! pending field snapshot. It lives under a single key in a
//! [`ScratchStore`] scoped to the user's session and is accessed through the
//! typed [`SnapshotSlot`].

use crate::models::{PendingFieldSnapshot, SnapshotError};
use crate::settings::ScratchSettings;
use crate::utils::tokens::generate_session_id;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("scratch storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored snapshot is unreadable: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// String key/value storage scoped to one session
pub trait ScratchStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage is unavailable
    fn put(&self, key: &str, value: String) -> Result<(), ScratchError>;

    /// Read the value under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage is unavailable
    fn get(&self, key: &str) -> Result<Option<String>, ScratchError>;

    /// Remove and return the value under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage is unavailable
    fn remove(&self, key: &str) -> Result<Option<String>, ScratchError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type Sessions = HashMap<String, HashMap<String, Entry>>;

/// In-process scratch storage for all sessions, with entry expiry
#[derive(Clone)]
pub struct MemoryScratchStore {
    sessions: Arc<RwLock<Sessions>>,
    ttl: Duration,
}

impl MemoryScratchStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ScratchSettings) -> Self {
        let ttl = i64::try_from(settings.ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX);
        Self::new(ttl)
    }

    /// Handle on the entries of an existing session
    #[must_use]
    pub fn session(&self, session_id: &str) -> SessionScratch {
        SessionScratch {
            store: self.clone(),
            session_id: session_id.to_string(),
        }
    }

    /// Handle on a freshly identified session
    #[must_use]
    pub fn new_session(&self) -> SessionScratch {
        self.session(&generate_session_id())
    }

    /// Drop expired entries and empty sessions. Returns the number of
    /// entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn purge_expired(&self) -> Result<usize, ScratchError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        Ok(evict_expired(&mut sessions, Utc::now()))
    }

    /// Number of sessions currently holding entries
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn session_count(&self) -> Result<usize, ScratchError> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }
}

fn evict_expired(sessions: &mut Sessions, now: DateTime<Utc>) -> usize {
    let mut removed = 0;
    for entries in sessions.values_mut() {
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        removed += before - entries.len();
    }
    sessions.retain(|_, entries| !entries.is_empty());

    if removed > 0 {
        debug!("Purged {removed} expired scratch entries");
    }
    removed
}

fn poisoned<T>(_: T) -> ScratchError {
    ScratchError::Unavailable("scratch storage lock poisoned".to_string())
}

/// Scratch entries of a single session
#[derive(Clone)]
pub struct SessionScratch {
    store: MemoryScratchStore,
    session_id: String,
}

impl SessionScratch {
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl ScratchStore for SessionScratch {
    fn put(&self, key: &str, value: String) -> Result<(), ScratchError> {
        let now = Utc::now();
        let entry = Entry {
            value,
            expires_at: now.checked_add_signed(self.store.ttl),
        };
        let mut sessions = self.store.sessions.write().map_err(poisoned)?;
        // Sweep sessions whose handshake never came back
        evict_expired(&mut sessions, now);
        sessions
            .entry(self.session_id.clone())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, ScratchError> {
        let now = Utc::now();
        let sessions = self.store.sessions.read().map_err(poisoned)?;
        Ok(sessions
            .get(&self.session_id)
            .and_then(|entries| entries.get(key))
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn remove(&self, key: &str) -> Result<Option<String>, ScratchError> {
        let now = Utc::now();
        let mut sessions = self.store.sessions.write().map_err(poisoned)?;
        let Some(entries) = sessions.get_mut(&self.session_id) else {
            return Ok(None);
        };
        let removed = entries.remove(key);
        if entries.is_empty() {
            sessions.remove(&self.session_id);
        }
        Ok(removed
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }
}

/// Typed access to the pending field snapshot of one session
pub struct SnapshotSlot<'a> {
    store: &'a dyn ScratchStore,
    key: &'a str,
}

impl<'a> SnapshotSlot<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ScratchStore, key: &'a str) -> Self {
        Self { store, key }
    }

    /// Save a snapshot, replacing any orphaned one
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or storage fails
    pub fn store(&self, snapshot: &PendingFieldSnapshot) -> Result<(), ScratchError> {
        self.store.put(self.key, snapshot.encode()?)
    }

    /// Read and clear the snapshot. A second call returns `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the stored value cannot be decoded
    pub fn take(&self) -> Result<Option<PendingFieldSnapshot>, ScratchError> {
        match self.store.remove(self.key)? {
            Some(encoded) => Ok(Some(PendingFieldSnapshot::decode(&encoded)?)),
            None => Ok(None),
        }
    }

    /// Whether a snapshot is waiting
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails
    pub fn is_present(&self) -> Result<bool, ScratchError> {
        Ok(self.store.get(self.key)?.is_some())
    }

    /// Drop any stored snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails
    pub fn clear(&self) -> Result<(), ScratchError> {
        self.store.remove(self.key).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordSchema, UserRecord};

    fn snapshot() -> PendingFieldSnapshot {
        let mut user = UserRecord::new(Arc::new(RecordSchema::users()));
        user.set("login", Some("ada".to_string())).unwrap();
        PendingFieldSnapshot::capture(&user, true)
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = MemoryScratchStore::new(Duration::hours(1));
        let alice = store.session("alice");
        let bob = store.session("bob");

        alice.put("openid_attributes", "a".to_string()).unwrap();

        assert_eq!(alice.get("openid_attributes").unwrap().as_deref(), Some("a"));
        assert!(bob.get("openid_attributes").unwrap().is_none());
        assert_eq!(store.session_count().unwrap(), 1);
    }

    #[test]
    fn test_remove_clears_value_and_empty_session() {
        let store = MemoryScratchStore::new(Duration::hours(1));
        let session = store.new_session();
        session.put("k", "v".to_string()).unwrap();

        assert_eq!(session.remove("k").unwrap().as_deref(), Some("v"));
        assert!(session.remove("k").unwrap().is_none());
        assert_eq!(store.session_count().unwrap(), 0);
    }

    #[test]
    fn test_expired_entries_are_invisible_and_purged() {
        let store = MemoryScratchStore::new(Duration::zero());
        let session = store.session("s");
        session.put("k", "v".to_string()).unwrap();

        assert!(session.get("k").unwrap().is_none());
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.session_count().unwrap(), 0);
    }

    #[test]
    fn test_writes_evict_abandoned_sessions() {
        let store = MemoryScratchStore::new(Duration::zero());
        store.session("abandoned").put("k", "v".to_string()).unwrap();
        store.session("next").put("k", "v".to_string()).unwrap();

        assert_eq!(store.session_count().unwrap(), 1);
    }

    #[test]
    fn test_writes_keep_live_sessions() {
        let store = MemoryScratchStore::new(Duration::hours(1));
        store.session("a").put("k", "v".to_string()).unwrap();
        store.session("b").put("k", "v".to_string()).unwrap();

        assert_eq!(store.session_count().unwrap(), 2);
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_from_settings_handles_huge_ttl() {
        let store = MemoryScratchStore::from_settings(&ScratchSettings {
            snapshot_key: "openid_attributes".to_string(),
            ttl_hours: u64::MAX,
        });
        let session = store.session("s");
        session.put("k", "v".to_string()).unwrap();
        assert_eq!(session.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_snapshot_slot_take_clears() {
        let store = MemoryScratchStore::new(Duration::hours(1));
        let session = store.session("s");
        let slot = SnapshotSlot::new(&session, "openid_attributes");
        let original = snapshot();

        slot.store(&original).unwrap();
        assert!(slot.is_present().unwrap());

        assert_eq!(slot.take().unwrap(), Some(original));
        assert!(slot.take().unwrap().is_none());
        assert!(!slot.is_present().unwrap());
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let store = MemoryScratchStore::new(Duration::hours(1));
        let session = store.session("s");
        session.put("openid_attributes", "%%%".to_string()).unwrap();

        let slot = SnapshotSlot::new(&session, "openid_attributes");
        assert!(matches!(slot.take(), Err(ScratchError::Snapshot(_))));
    }
}
