//! Scripted stand-in for the external OpenID library

use crate::context::CallbackParams;
use crate::identity::Identity;
use crate::models::ProfileFields;
use crate::verifier::{
    HandshakeResult, OpenIdVerifier, ProviderFailure, RedirectInstruction, VerificationRequest,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::constants::PROVIDER_ENDPOINT;

/// Verifier whose `begin` and `complete` results are scripted by the test.
///
/// By default `begin` redirects to [`PROVIDER_ENDPOINT`] and `complete`
/// succeeds with the identity it was asked about, failing when there is none.
#[derive(Default)]
pub struct ScriptedVerifier {
    begin_failure: Mutex<Option<String>>,
    complete_result: Mutex<Option<HandshakeResult>>,
    begin_calls: AtomicUsize,
    complete_calls: AtomicUsize,
    last_begin: Mutex<Option<VerificationRequest>>,
    last_complete: Mutex<Option<VerificationRequest>>,
}

impl ScriptedVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `begin` fail with `message`
    ///
    /// # Panics
    ///
    /// Panics if the script lock is poisoned
    pub fn fail_begin(&self, message: &str) {
        *self.begin_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make every `complete` succeed with `identity`
    ///
    /// # Panics
    ///
    /// Panics if the script lock is poisoned
    pub fn succeed_with(&self, identity: Identity, profile: Option<ProfileFields>) {
        *self.complete_result.lock().unwrap() = Some(HandshakeResult::success(identity, profile));
    }

    /// Make every `complete` fail with `message`
    ///
    /// # Panics
    ///
    /// Panics if the script lock is poisoned
    pub fn fail_with(&self, message: &str) {
        *self.complete_result.lock().unwrap() = Some(HandshakeResult::failure(message));
    }

    #[must_use]
    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// # Panics
    ///
    /// Panics if the recording lock is poisoned
    #[must_use]
    pub fn last_begin_request(&self) -> Option<VerificationRequest> {
        self.last_begin.lock().unwrap().clone()
    }

    /// # Panics
    ///
    /// Panics if the recording lock is poisoned
    #[must_use]
    pub fn last_complete_request(&self) -> Option<VerificationRequest> {
        self.last_complete.lock().unwrap().clone()
    }
}

#[async_trait]
impl OpenIdVerifier for ScriptedVerifier {
    async fn begin(
        &self,
        request: &VerificationRequest,
    ) -> Result<RedirectInstruction, ProviderFailure> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_begin.lock().unwrap() = Some(request.clone());

        if let Some(message) = self.begin_failure.lock().unwrap().clone() {
            return Err(ProviderFailure::new(message));
        }

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("openid.mode", "checkid_setup");
        if let Some(identity) = &request.identity {
            query.append_pair("openid.identity", identity.as_str());
        }
        query.append_pair("openid.return_to", &request.return_to);
        Ok(RedirectInstruction::new(format!(
            "{PROVIDER_ENDPOINT}?{}",
            query.finish()
        )))
    }

    async fn complete(
        &self,
        request: &VerificationRequest,
        _callback: &CallbackParams,
    ) -> HandshakeResult {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_complete.lock().unwrap() = Some(request.clone());

        if let Some(result) = self.complete_result.lock().unwrap().clone() {
            return result;
        }
        match &request.identity {
            Some(identity) => HandshakeResult::success(identity.clone(), None),
            None => HandshakeResult::failure("no identity to verify"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VerificationRequest {
        VerificationRequest {
            identity: Some(Identity::new("https://example.com/ada")),
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            return_to: "https://app.example/users?for_model=1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_default_script() {
        let verifier = ScriptedVerifier::new();

        let redirect = verifier.begin(&request()).await.unwrap();
        assert!(redirect.location.starts_with(PROVIDER_ENDPOINT));
        assert!(redirect
            .location
            .contains("openid.return_to=https%3A%2F%2Fapp.example%2Fusers%3Ffor_model%3D1"));

        let result = verifier.complete(&request(), &CallbackParams::new()).await;
        assert!(result.is_success());
        assert_eq!(verifier.begin_calls(), 1);
        assert_eq!(verifier.complete_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let verifier = ScriptedVerifier::new();
        verifier.fail_begin("unreachable");
        verifier.fail_with("canceled");

        assert_eq!(
            verifier.begin(&request()).await.unwrap_err().message,
            "unreachable"
        );
        assert_eq!(
            verifier.complete(&request(), &CallbackParams::new()).await,
            HandshakeResult::failure("canceled")
        );
        assert_eq!(verifier.last_complete_request(), Some(request()));
    }
}
