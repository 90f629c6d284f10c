//! Fluent builder for customized test records

use crate::identity::OpenIdNormalizer;
use crate::models::{RecordSchema, UserRecord};
use std::sync::Arc;

/// Builder for identity records with sensible defaults
pub struct TestUserBuilder {
    schema: Arc<RecordSchema>,
    fields: Vec<(String, String)>,
    identity: Option<String>,
    password: Option<String>,
    password_confirmation: Option<String>,
    persisted_id: Option<u64>,
}

impl TestUserBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: Arc::new(RecordSchema::users()),
            fields: Vec::new(),
            identity: None,
            password: None,
            password_confirmation: None,
            persisted_id: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: &str, value: &str) -> Self {
        self.fields.push((field.to_string(), value.to_string()));
        self
    }

    /// Raw identifier, normalized on build
    #[must_use]
    pub fn with_identity(mut self, raw: &str) -> Self {
        self.identity = Some(raw.to_string());
        self
    }

    /// Password and a matching confirmation
    #[must_use]
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self.password_confirmation = Some(password.to_string());
        self
    }

    #[must_use]
    pub fn with_password_confirmation(mut self, confirmation: &str) -> Self {
        self.password_confirmation = Some(confirmation.to_string());
        self
    }

    /// Build the record as already persisted under `id`, with no pending
    /// changes
    #[must_use]
    pub fn persisted(mut self, id: u64) -> Self {
        self.persisted_id = Some(id);
        self
    }

    /// # Panics
    ///
    /// Panics if a field is not declared by the schema
    #[must_use]
    pub fn build(self) -> UserRecord {
        let mut user = UserRecord::new(self.schema);
        for (field, value) in self.fields {
            user.set(&field, Some(value)).unwrap();
        }
        if let Some(raw) = &self.identity {
            user.assign_openid_identifier(raw, &OpenIdNormalizer);
        }
        if let Some(id) = self.persisted_id {
            user.mark_persisted(id);
        }
        user.set_password(self.password);
        user.set_password_confirmation(self.password_confirmation);
        user
    }
}

impl Default for TestUserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
