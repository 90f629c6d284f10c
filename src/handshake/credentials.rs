//! Password validation applied to records that do not use OpenID

use crate::models::schema::PASSWORD_FIELD;
use crate::models::UserRecord;
use crate::settings::PasswordSettings;

/// Credential checks owned by the host application
pub trait CredentialValidator: Send + Sync {
    /// Attach any credential errors to `record`
    fn validate(&self, record: &mut UserRecord);
}

/// Minimum length plus confirmation match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl PasswordPolicy {
    #[must_use]
    pub fn from_settings(settings: &PasswordSettings) -> Self {
        Self {
            min_length: settings.min_length,
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::from_settings(&PasswordSettings::default())
    }
}

impl CredentialValidator for PasswordPolicy {
    fn validate(&self, record: &mut UserRecord) {
        let length = record.password().map_or(0, |p| p.chars().count());
        let confirmed = record.password() == record.password_confirmation();

        if length < self.min_length {
            record.errors_mut().add(
                PASSWORD_FIELD,
                format!("is too short (minimum is {} characters)", self.min_length),
            );
        }
        if !confirmed {
            record
                .errors_mut()
                .add(PASSWORD_FIELD, "doesn't match confirmation");
        }
    }
}
