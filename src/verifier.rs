//! Two-phase interface to the external OpenID library
//!
//! Discovery, association and signature checking happen behind
//! [`OpenIdVerifier`]. The orchestrator only sees two calls:
//!
//! 1. [`OpenIdVerifier::begin`] turns an identity into a redirect to the
//!    provider, or fails immediately (unreachable provider, bad identity).
//! 2. [`OpenIdVerifier::complete`] inspects the provider's callback and
//!    resolves to a [`HandshakeResult`].

use crate::context::CallbackParams;
use crate::identity::Identity;
use crate::models::ProfileFields;
use actix_web::HttpResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything the verifier needs to talk to the provider on our behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Identity being verified. Absent on a login callback, where the
    /// provider response names the identity.
    pub identity: Option<Identity>,
    /// Simple-registration fields the provider should return
    pub required_fields: Vec<String>,
    /// Simple-registration fields the provider may return
    pub optional_fields: Vec<String>,
    /// Where the provider sends the user back to
    pub return_to: String,
}

/// Instruction to send the user agent to the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectInstruction {
    pub location: String,
}

impl RedirectInstruction {
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// `302 Found` pointing at the provider
    #[must_use]
    pub fn to_response(&self) -> HttpResponse {
        HttpResponse::Found()
            .append_header(("Location", self.location.as_str()))
            .finish()
    }
}

/// Failure reported by the provider or the OpenID library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub message: String,
}

impl ProviderFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderFailure {}

/// Outcome of a completed handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeResult {
    Success {
        identity: Identity,
        profile: Option<ProfileFields>,
    },
    Failure {
        message: String,
    },
}

impl HandshakeResult {
    #[must_use]
    pub fn success(identity: Identity, profile: Option<ProfileFields>) -> Self {
        Self::Success { identity, profile }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ProviderFailure> for HandshakeResult {
    fn from(failure: ProviderFailure) -> Self {
        Self::Failure {
            message: failure.message,
        }
    }
}

#[async_trait]
pub trait OpenIdVerifier: Send + Sync {
    /// Start verification of `request.identity`
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be discovered or contacted,
    /// or if the identity is unusable
    async fn begin(&self, request: &VerificationRequest)
        -> Result<RedirectInstruction, ProviderFailure>;

    /// Finish verification from the provider's callback parameters
    async fn complete(
        &self,
        request: &VerificationRequest,
        callback: &CallbackParams,
    ) -> HandshakeResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{header, StatusCode};

    #[test]
    fn test_redirect_response() {
        let redirect = RedirectInstruction::new("https://provider.example/auth?x=1");
        let response = redirect.to_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://provider.example/auth?x=1"
        );
    }

    #[test]
    fn test_provider_failure_becomes_failed_result() {
        let result: HandshakeResult = ProviderFailure::new("provider unreachable").into();
        assert_eq!(result, HandshakeResult::failure("provider unreachable"));
        assert!(!result.is_success());
    }
}
