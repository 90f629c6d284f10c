use crate::context::ScratchError;
use crate::identity::Identity;
use crate::models::SnapshotError;
use crate::store::StoreError;
use thiserror::Error;

/// Failures surfaced by the handshake orchestrators
///
/// The first four variants are domain failures that end up as validation
/// messages. The rest are infrastructure failures and propagate as `Err`.
#[derive(Debug, Error)]
pub enum OpenIdError {
    #[error("{0}")]
    InvalidIdentity(String),
    #[error("{0}")]
    ProviderFailure(String),
    #[error("your OpenID session expired, please try again")]
    SessionExpired,
    #[error("did not match any users in our database, have you set up your account to use OpenID?")]
    NoMatchingAccount(Identity),
    #[error("record store error: {0}")]
    Store(#[from] StoreError),
    #[error("scratch storage error: {0}")]
    Scratch(#[source] ScratchError),
    #[error("pending field snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl OpenIdError {
    /// Whether this failure becomes a validation message rather than a fault
    #[must_use]
    pub fn is_domain_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentity(_)
                | Self::ProviderFailure(_)
                | Self::SessionExpired
                | Self::NoMatchingAccount(_)
        )
    }
}

impl From<ScratchError> for OpenIdError {
    fn from(error: ScratchError) -> Self {
        match error {
            ScratchError::Snapshot(e) => Self::Snapshot(e),
            other => Self::Scratch(other),
        }
    }
}
