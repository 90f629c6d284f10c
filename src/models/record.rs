//! In-memory identity record with dirty tracking
//!
//! `UserRecord` is the object both handshake flows operate on. Column
//! values live in a string map keyed by the columns its [`RecordSchema`]
//! declares; the plaintext password and its confirmation are virtual and
//! never part of the persisted attribute set.

use crate::identity::{Identity, IdentityNormalizer};
use crate::models::errors::ValidationErrors;
use crate::models::schema::{
    RecordSchema, PASSWORD_CONFIRMATION_FIELD, PASSWORD_FIELD, PERSISTENCE_TOKEN_FIELD,
};
use crate::utils::tokens::generate_persistence_token;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unknown field `{field}` for {record}")]
    UnknownField { record: String, field: String },
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    schema: Arc<RecordSchema>,
    id: Option<u64>,
    attributes: BTreeMap<String, String>,
    persisted: BTreeMap<String, String>,
    password: Option<String>,
    password_confirmation: Option<String>,
    openid_error: Option<String>,
    errors: ValidationErrors,
}

impl UserRecord {
    /// A new, unsaved record
    #[must_use]
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self {
            schema,
            id: None,
            attributes: BTreeMap::new(),
            persisted: BTreeMap::new(),
            password: None,
            password_confirmation: None,
            openid_error: None,
            errors: ValidationErrors::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    #[must_use]
    pub fn schema_handle(&self) -> Arc<RecordSchema> {
        Arc::clone(&self.schema)
    }

    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    #[must_use]
    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    /// Current value of a column or virtual field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            PASSWORD_FIELD => self.password.as_deref(),
            PASSWORD_CONFIRMATION_FIELD => self.password_confirmation.as_deref(),
            _ => self.attributes.get(field).map(String::as_str),
        }
    }

    /// Whether a field is unset or whitespace only
    #[must_use]
    pub fn is_blank(&self, field: &str) -> bool {
        self.get(field).is_none_or(|value| value.trim().is_empty())
    }

    /// Write a column or virtual field.
    ///
    /// Writing the identity column goes through the same token rotation as
    /// [`UserRecord::assign_openid_identifier`] but skips normalization, so
    /// callers must pass an already normalized value.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema does not declare `field`
    pub fn set(&mut self, field: &str, value: Option<String>) -> Result<(), RecordError> {
        match field {
            PASSWORD_FIELD => self.password = value,
            PASSWORD_CONFIRMATION_FIELD => self.password_confirmation = value,
            _ if field == self.schema.identity_field() => {
                let identity = value.filter(|v| !v.trim().is_empty()).map(Identity::new);
                self.write_identity(identity);
            }
            _ if self.schema.has_field(field) => {
                self.write_attribute(field, value);
            }
            _ => {
                return Err(RecordError::UnknownField {
                    record: self.schema.name().to_string(),
                    field: field.to_string(),
                })
            }
        }
        Ok(())
    }

    fn write_attribute(&mut self, field: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.attributes.insert(field.to_string(), value);
            }
            None => {
                self.attributes.remove(field);
            }
        }
    }

    /// Whether a column differs from its last persisted value
    #[must_use]
    pub fn changed(&self, field: &str) -> bool {
        self.attributes.get(field) != self.persisted.get(field)
    }

    /// Persisted column values
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    // =========================================================================
    // OpenID identity
    // =========================================================================

    #[must_use]
    pub fn openid_identifier(&self) -> Option<Identity> {
        self.get(self.schema.identity_field()).map(Identity::new)
    }

    #[must_use]
    pub fn using_openid(&self) -> bool {
        !self.is_blank(self.schema.identity_field())
    }

    #[must_use]
    pub fn identity_changed(&self) -> bool {
        self.changed(self.schema.identity_field())
    }

    /// Assign a user-supplied identifier.
    ///
    /// Blank input clears the identity. Input the normalizer rejects leaves
    /// the current identity untouched and is remembered for the next
    /// validation pass instead of failing here.
    pub fn assign_openid_identifier(&mut self, raw: &str, normalizer: &dyn IdentityNormalizer) {
        if raw.trim().is_empty() {
            self.openid_error = None;
            self.write_identity(None);
            return;
        }

        match normalizer.normalize(raw) {
            Ok(identity) => {
                self.openid_error = None;
                self.write_identity(Some(identity));
            }
            Err(e) => {
                debug!("Rejected OpenID identifier for {}: {e}", self.schema.name());
                self.openid_error = Some(e.to_string());
            }
        }
    }

    fn write_identity(&mut self, identity: Option<Identity>) {
        let field = self.schema.identity_field().to_string();
        let value = identity.map(Identity::into_inner);
        if self.attributes.get(&field) == value.as_ref() {
            return;
        }

        self.write_attribute(&field, value);
        self.reset_persistence_token();
    }

    /// Issue a fresh long-lived session proof, invalidating the old one
    pub fn reset_persistence_token(&mut self) {
        if self.schema.has_field(PERSISTENCE_TOKEN_FIELD) {
            self.write_attribute(PERSISTENCE_TOKEN_FIELD, Some(generate_persistence_token()));
        }
    }

    /// Error recorded while assigning or verifying the identity
    #[must_use]
    pub fn openid_error(&self) -> Option<&str> {
        self.openid_error.as_deref()
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    #[must_use]
    pub fn password_confirmation(&self) -> Option<&str> {
        self.password_confirmation.as_deref()
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    pub fn set_password_confirmation(&mut self, confirmation: Option<String>) {
        self.password_confirmation = confirmation;
    }

    /// A password is needed for new records, when one is being set, or when
    /// no hashed password is stored yet
    #[must_use]
    pub fn require_password(&self) -> bool {
        self.is_new_record()
            || self.password.is_some()
            || self.is_blank(self.schema.crypted_password_field())
    }

    // =========================================================================
    // Validation state
    // =========================================================================

    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ValidationErrors {
        &mut self.errors
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record that the current attribute set has been written to storage
    pub fn mark_persisted(&mut self, id: u64) {
        self.id = Some(id);
        self.persisted = self.attributes.clone();
    }
}
