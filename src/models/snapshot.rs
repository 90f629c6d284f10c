//! Pending field snapshot kept across the provider redirect

use crate::models::record::UserRecord;
use crate::models::schema::{PASSWORD_CONFIRMATION_FIELD, PASSWORD_FIELD};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("snapshot is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Form values captured before redirecting to the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFieldSnapshot {
    fields: BTreeMap<String, Option<String>>,
}

impl PendingFieldSnapshot {
    /// Capture the snapshot-eligible columns of `record`.
    ///
    /// With `include_secrets` the plaintext password and its confirmation
    /// are captured as well, so a save interrupted by the redirect can still
    /// set the password once it resumes.
    #[must_use]
    pub fn capture(record: &UserRecord, include_secrets: bool) -> Self {
        let mut fields: BTreeMap<String, Option<String>> = record
            .schema()
            .snapshot_fields()
            .map(|field| (field.to_string(), record.get(field).map(ToString::to_string)))
            .collect();

        if include_secrets {
            for field in [PASSWORD_FIELD, PASSWORD_CONFIRMATION_FIELD] {
                fields.insert(field.to_string(), record.get(field).map(ToString::to_string));
            }
        }

        Self { fields }
    }

    /// Write every captured value back onto `record`.
    ///
    /// Fields the record's schema no longer declares are skipped.
    pub fn restore_onto(self, record: &mut UserRecord) {
        for (field, value) in self.fields {
            if let Err(e) = record.set(&field, value) {
                warn!("Skipping snapshot field during restore: {e}");
            }
        }
    }

    /// Captured value of a field; `None` if the field was not captured
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Option<&str>> {
        self.fields.get(field).map(Option::as_deref)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode for transport through string-valued session storage
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails
    pub fn encode(&self) -> Result<String, SnapshotError> {
        let serialized = serde_json::to_string(self)?;
        Ok(URL_SAFE_NO_PAD.encode(serialized))
    }

    /// Decode a snapshot produced by [`PendingFieldSnapshot::encode`]
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Base64 decoding fails
    /// - UTF-8 conversion fails
    /// - JSON deserialization fails
    pub fn decode(encoded: &str) -> Result<Self, SnapshotError> {
        let decoded = URL_SAFE_NO_PAD.decode(encoded.as_bytes())?;
        let serialized = String::from_utf8(decoded)?;
        Ok(serde_json::from_str(&serialized)?)
    }
}
