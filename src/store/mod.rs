//! Persistence seam for identity records

pub mod memory;

pub use memory::MemoryRecordStore;

use crate::identity::Identity;
use crate::models::UserRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identity {0} is already bound to another record")]
    DuplicateIdentity(Identity),
    #[error("record {0} not found")]
    NotFound(u64),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Loads and saves identity records
///
/// Implementations back this with whatever persistence the application
/// uses. Lookup by identifier is the hook for applications that keep several
/// identifiers per account.
pub trait RecordStore: Send + Sync {
    /// Find the record bound to `identity`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried
    fn find_by_openid_identifier(&self, identity: &Identity)
        -> Result<Option<UserRecord>, StoreError>;

    /// Whether `identity` is bound to a record other than `excluding`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried
    fn identifier_taken(&self, identity: &Identity, excluding: Option<u64>)
        -> Result<bool, StoreError>;

    /// Insert or update `record`, marking it persisted. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or would bind an identity twice
    fn save(&self, record: &mut UserRecord) -> Result<u64, StoreError>;
}
