//! Static field declarations for identity records
//!
//! A [`RecordSchema`] lists the columns a record type carries and which of
//! them play special roles. The snapshot taken before the provider redirect
//! is derived from this list rather than from whatever attributes happen to
//! be set on a live record.

pub const OPENID_IDENTIFIER_FIELD: &str = "openid_identifier";
pub const PASSWORD_FIELD: &str = "password";
pub const PASSWORD_CONFIRMATION_FIELD: &str = "password_confirmation";
pub const PERSISTENCE_TOKEN_FIELD: &str = "persistence_token";
pub const NAME_FIELD: &str = "name";
pub const FIRST_NAME_FIELD: &str = "first_name";
pub const LAST_NAME_FIELD: &str = "last_name";

/// Security-sensitive and bookkeeping columns that never travel in a snapshot.
/// The hashed-password and salt columns are added per schema.
const SNAPSHOT_EXCLUDED: &[&str] = &[
    PASSWORD_FIELD,
    PERSISTENCE_TOKEN_FIELD,
    "perishable_token",
    "single_access_token",
    "login_count",
    "failed_login_count",
    "last_request_at",
    "current_login_at",
    "last_login_at",
    "current_login_ip",
    "last_login_ip",
    "created_at",
    "updated_at",
    "lock_version",
];

/// Column layout of an identity record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    fields: Vec<String>,
    identity_field: String,
    login_field: Option<String>,
    email_field: Option<String>,
    crypted_password_field: String,
    password_salt_field: String,
}

impl RecordSchema {
    /// Declare a schema from its column names.
    ///
    /// Role defaults: `openid_identifier` is the identity column,
    /// `crypted_password`/`password_salt` hold the hashed secret, and `login`
    /// and `email` are the login and email columns when declared.
    #[must_use]
    pub fn new<I, S>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let login_field = fields.iter().find(|f| *f == "login").cloned();
        let email_field = fields.iter().find(|f| *f == "email").cloned();

        Self {
            name: name.to_string(),
            fields,
            identity_field: OPENID_IDENTIFIER_FIELD.to_string(),
            login_field,
            email_field,
            crypted_password_field: "crypted_password".to_string(),
            password_salt_field: "password_salt".to_string(),
        }
    }

    /// The stock `users` table
    #[must_use]
    pub fn users() -> Self {
        Self::new(
            "users",
            [
                "created_at",
                "updated_at",
                "lock_version",
                "login",
                "crypted_password",
                "password_salt",
                "persistence_token",
                "single_access_token",
                "perishable_token",
                "openid_identifier",
                "email",
                "name",
                "first_name",
                "last_name",
                "login_count",
                "failed_login_count",
                "last_request_at",
                "current_login_at",
                "last_login_at",
                "current_login_ip",
                "last_login_ip",
            ],
        )
    }

    #[must_use]
    pub fn with_identity_field(mut self, field: &str) -> Self {
        self.identity_field = field.to_string();
        self
    }

    #[must_use]
    pub fn with_login_field(mut self, field: Option<&str>) -> Self {
        self.login_field = field.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_email_field(mut self, field: Option<&str>) -> Self {
        self.email_field = field.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_crypted_password_field(mut self, field: &str) -> Self {
        self.crypted_password_field = field.to_string();
        self
    }

    #[must_use]
    pub fn with_password_salt_field(mut self, field: &str) -> Self {
        self.password_salt_field = field.to_string();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    #[must_use]
    pub fn login_field(&self) -> Option<&str> {
        self.login_field.as_deref()
    }

    #[must_use]
    pub fn email_field(&self) -> Option<&str> {
        self.email_field.as_deref()
    }

    #[must_use]
    pub fn crypted_password_field(&self) -> &str {
        &self.crypted_password_field
    }

    #[must_use]
    pub fn password_salt_field(&self) -> &str {
        &self.password_salt_field
    }

    /// Whether a column is kept out of snapshots (case-insensitive)
    #[must_use]
    pub fn is_snapshot_excluded(&self, field: &str) -> bool {
        SNAPSHOT_EXCLUDED
            .iter()
            .copied()
            .chain([
                self.crypted_password_field.as_str(),
                self.password_salt_field.as_str(),
            ])
            .any(|excluded| excluded.eq_ignore_ascii_case(field))
    }

    /// Columns copied into a snapshot, in declaration order
    pub fn snapshot_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(String::as_str)
            .filter(|field| !self.is_snapshot_excluded(field))
    }

    /// Registration fields the provider is asked to return
    #[must_use]
    pub fn required_registration_fields(&self) -> Vec<String> {
        [self.login_field.as_ref(), self.email_field.as_ref()]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_snapshot_fields_skip_sensitive_columns() {
        let schema = RecordSchema::users();
        let fields: Vec<&str> = schema.snapshot_fields().collect();

        assert_eq!(
            fields,
            vec![
                "login",
                "openid_identifier",
                "email",
                "name",
                "first_name",
                "last_name"
            ]
        );
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let schema = RecordSchema::new("accounts", ["Login", "Persistence_Token", "LOCK_VERSION"]);
        let fields: Vec<&str> = schema.snapshot_fields().collect();

        assert_eq!(fields, vec!["Login"]);
        assert!(schema.is_snapshot_excluded("CRYPTED_PASSWORD"));
    }

    #[test]
    fn test_custom_secret_columns_are_excluded() {
        let schema = RecordSchema::new("members", ["handle", "digest", "pepper", "openid_identifier"])
            .with_crypted_password_field("digest")
            .with_password_salt_field("pepper");

        let fields: Vec<&str> = schema.snapshot_fields().collect();
        assert_eq!(fields, vec!["handle", "openid_identifier"]);
    }

    #[test]
    fn test_required_registration_fields() {
        assert_eq!(
            RecordSchema::users().required_registration_fields(),
            vec!["login".to_string(), "email".to_string()]
        );

        let schema = RecordSchema::new("members", ["email", "openid_identifier"]);
        assert_eq!(schema.login_field(), None);
        assert_eq!(schema.required_registration_fields(), vec!["email".to_string()]);
    }
}
