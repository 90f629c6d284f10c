//! In-memory record store

use crate::identity::Identity;
use crate::models::UserRecord;
use crate::store::{RecordStore, StoreError};
use log::debug;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Record store backed by a map, counting every write it performs
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<u64, UserRecord>>>,
    next_id: Arc<AtomicU64>,
    writes: Arc<AtomicUsize>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a record by id
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the lock is poisoned
    pub fn find(&self, id: u64) -> Result<UserRecord, StoreError> {
        self.records
            .read()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Number of stored records
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    /// Whether the store holds no records
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Number of successful inserts and updates so far
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("record store lock poisoned".to_string())
}

impl RecordStore for MemoryRecordStore {
    fn find_by_openid_identifier(
        &self,
        identity: &Identity,
    ) -> Result<Option<UserRecord>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .find(|record| record.openid_identifier().as_ref() == Some(identity))
            .cloned())
    }

    fn identifier_taken(
        &self,
        identity: &Identity,
        excluding: Option<u64>,
    ) -> Result<bool, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.iter().any(|(id, record)| {
            Some(*id) != excluding && record.openid_identifier().as_ref() == Some(identity)
        }))
    }

    fn save(&self, record: &mut UserRecord) -> Result<u64, StoreError> {
        let mut records = self.records.write().map_err(poisoned)?;

        if let Some(identity) = record.openid_identifier() {
            let taken = records.iter().any(|(id, other)| {
                Some(*id) != record.id() && other.openid_identifier().as_ref() == Some(&identity)
            });
            if taken {
                return Err(StoreError::DuplicateIdentity(identity));
            }
        }

        let id = match record.id() {
            Some(id) if records.contains_key(&id) => id,
            Some(id) => return Err(StoreError::NotFound(id)),
            None => self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        };

        record.mark_persisted(id);

        let mut stored = record.clone();
        stored.set_password(None);
        stored.set_password_confirmation(None);
        stored.errors_mut().clear();
        records.insert(id, stored);
        self.writes.fetch_add(1, Ordering::SeqCst);

        debug!("Saved {} record {id}", record.schema().name());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordSchema;
    use std::sync::Arc;

    fn user_with_identity(identity: &str) -> UserRecord {
        let mut user = UserRecord::new(Arc::new(RecordSchema::users()));
        user.set("openid_identifier", Some(identity.to_string()))
            .unwrap();
        user.set_password(Some("secret".to_string()));
        user
    }

    #[test]
    fn test_save_assigns_id_and_strips_plaintext_password() {
        let store = MemoryRecordStore::new();
        let mut user = user_with_identity("https://example.com/ada");

        let id = store.save(&mut user).unwrap();

        assert_eq!(user.id(), Some(id));
        assert!(!user.identity_changed());
        assert_eq!(store.find(id).unwrap().password(), None);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_lookup_by_identifier() {
        let store = MemoryRecordStore::new();
        let mut user = user_with_identity("https://example.com/ada");
        store.save(&mut user).unwrap();

        let found = store
            .find_by_openid_identifier(&Identity::new("https://example.com/ada"))
            .unwrap();
        assert_eq!(found.and_then(|r| r.id()), user.id());

        assert!(store
            .find_by_openid_identifier(&Identity::new("https://example.com/babbage"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_identity_must_be_unique() {
        let store = MemoryRecordStore::new();
        let mut ada = user_with_identity("https://example.com/ada");
        store.save(&mut ada).unwrap();

        let identity = Identity::new("https://example.com/ada");
        assert!(store.identifier_taken(&identity, None).unwrap());
        assert!(!store.identifier_taken(&identity, ada.id()).unwrap());

        let mut impostor = user_with_identity("https://example.com/ada");
        assert!(matches!(
            store.save(&mut impostor),
            Err(StoreError::DuplicateIdentity(_))
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_update_keeps_id() {
        let store = MemoryRecordStore::new();
        let mut user = user_with_identity("https://example.com/ada");
        let id = store.save(&mut user).unwrap();

        user.set("email", Some("ada@example.com".to_string())).unwrap();
        assert_eq!(store.save(&mut user).unwrap(), id);
        assert_eq!(store.find(id).unwrap().get("email"), Some("ada@example.com"));
        assert_eq!(store.write_count(), 2);
    }
}
