//! Handshake embedded in a login attempt
//!
//! Unlike the record flow nothing is snapshotted: a verified identity is
//! enough to look the account up. The `remember_me` option is the only form
//! value that has to survive the redirect and it travels in the return URL.

use crate::context::RequestContext;
use crate::handshake::errors::OpenIdError;
use crate::handshake::outcome::{AbortReason, LoginOutcome, Orchestration};
use crate::handshake::phase::{detect_phase, Flow, HandshakePhase, PhaseInputs};
use crate::identity::{Identity, IdentityNormalizer};
use crate::models::schema::OPENID_IDENTIFIER_FIELD;
use crate::models::{UserRecord, ValidationErrors};
use crate::settings::{MarkerSettings, OpenIdSettings};
use crate::store::RecordStore;
use crate::utils::logging::LoggingHelper;
use crate::verifier::{HandshakeResult, OpenIdVerifier, VerificationRequest};
use std::collections::BTreeMap;
use std::sync::Arc;

const FLOW: Flow = Flow::Session;

/// A login in progress
#[derive(Debug, Default)]
pub struct LoginAttempt {
    identity: Option<Identity>,
    identity_error: Option<String>,
    remember_me: bool,
    credentials: BTreeMap<String, String>,
    attempted_record: Option<UserRecord>,
    errors: ValidationErrors,
    last_error: Option<OpenIdError>,
}

impl LoginAttempt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take submitted login credentials. An `openid_identifier` entry is
    /// assigned through `normalizer`; everything else is kept for the
    /// application's own credential check.
    pub fn set_credentials<'a, I>(&mut self, credentials: I, normalizer: &dyn IdentityNormalizer)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in credentials {
            if name == OPENID_IDENTIFIER_FIELD {
                self.assign_openid_identifier(value, normalizer);
            } else {
                self.credentials.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Blank input clears the identity; rejected input clears it and is
    /// reported by the next [`SessionHandshake::authenticate`]
    pub fn assign_openid_identifier(&mut self, raw: &str, normalizer: &dyn IdentityNormalizer) {
        self.identity_error = None;
        self.identity = None;
        if raw.trim().is_empty() {
            return;
        }
        match normalizer.normalize(raw) {
            Ok(identity) => self.identity = Some(identity),
            Err(e) => self.identity_error = Some(e.to_string()),
        }
    }

    #[must_use]
    pub fn openid_identifier(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn credential(&self, name: &str) -> Option<&str> {
        self.credentials.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn remember_me(&self) -> bool {
        self.remember_me
    }

    pub fn set_remember_me(&mut self, remember_me: bool) {
        self.remember_me = remember_me;
    }

    #[must_use]
    pub fn attempted_record(&self) -> Option<&UserRecord> {
        self.attempted_record.as_ref()
    }

    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// The failure behind the last unsuccessful attempt
    #[must_use]
    pub fn last_error(&self) -> Option<&OpenIdError> {
        self.last_error.as_ref()
    }

    /// Whether this attempt should go through OpenID rather than the
    /// application's own credential check
    #[must_use]
    pub fn authenticating_with_openid(
        &self,
        request: &dyn RequestContext,
        markers: &MarkerSettings,
    ) -> bool {
        self.attempted_record.is_none()
            && self.errors.is_empty()
            && (self.identity.is_some()
                || PhaseInputs::callback_pending(FLOW, request.params(), markers))
    }

    fn read_remember_me(&mut self, request: &dyn RequestContext, markers: &MarkerSettings) {
        if let Some(value) = request.param(&markers.remember_me_param) {
            self.remember_me = value == "true";
        }
    }

    fn fail(&mut self, error: OpenIdError) {
        match &error {
            OpenIdError::InvalidIdentity(_) | OpenIdError::NoMatchingAccount(_) => {
                self.errors.add(OPENID_IDENTIFIER_FIELD, error.to_string());
            }
            _ => self.errors.add_to_base(error.to_string()),
        }
        self.last_error = Some(error);
    }
}

/// Orchestrates the session-centric flow
pub struct SessionHandshake {
    settings: OpenIdSettings,
    verifier: Arc<dyn OpenIdVerifier>,
    store: Arc<dyn RecordStore>,
}

impl SessionHandshake {
    #[must_use]
    pub fn new(
        settings: &OpenIdSettings,
        verifier: Arc<dyn OpenIdVerifier>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            verifier,
            store,
        }
    }

    #[must_use]
    pub fn detect_phase(&self, attempt: &LoginAttempt, request: &dyn RequestContext) -> HandshakePhase {
        if !attempt.authenticating_with_openid(request, &self.settings.markers) {
            return HandshakePhase::NotUsingOpenId;
        }
        let using_openid = attempt.identity.is_some();
        detect_phase(&PhaseInputs {
            enabled: self.settings.authentication.enabled,
            using_openid,
            identity_changed: using_openid,
            callback_pending: PhaseInputs::callback_pending(
                FLOW,
                request.params(),
                &self.settings.markers,
            ),
        })
    }

    /// Run the handshake step this request calls for. On `Proceed` after a
    /// completed handshake the matched account is the attempt's
    /// [`LoginAttempt::attempted_record`].
    ///
    /// # Errors
    ///
    /// Returns an error if the account lookup fails
    pub async fn orchestrate(
        &self,
        attempt: &mut LoginAttempt,
        request: &dyn RequestContext,
    ) -> Result<Orchestration, OpenIdError> {
        let phase = self.detect_phase(attempt, request);
        LoggingHelper::log_phase(FLOW, phase);

        match phase {
            HandshakePhase::NotUsingOpenId | HandshakePhase::AwaitingCallback => {
                Ok(Orchestration::Proceed)
            }
            HandshakePhase::Starting => Ok(self.start(attempt, request).await),
            HandshakePhase::Completing => self.complete(attempt, request).await,
        }
    }

    async fn start(&self, attempt: &mut LoginAttempt, request: &dyn RequestContext) -> Orchestration {
        attempt.read_remember_me(request, &self.settings.markers);
        let verification = self.verification_request(attempt, request);
        if let Some(identity) = &attempt.identity {
            LoggingHelper::log_handshake_started(FLOW, identity, &verification.return_to);
        }

        match self.verifier.begin(&verification).await {
            Ok(redirect) => {
                LoggingHelper::log_redirect(FLOW, &redirect.location);
                Orchestration::Abort(AbortReason::HandshakeInProgress(redirect))
            }
            Err(failure) => {
                LoggingHelper::log_handshake_failed(FLOW, &failure.message);
                Orchestration::Abort(AbortReason::Failed(OpenIdError::ProviderFailure(
                    failure.message,
                )))
            }
        }
    }

    async fn complete(
        &self,
        attempt: &mut LoginAttempt,
        request: &dyn RequestContext,
    ) -> Result<Orchestration, OpenIdError> {
        attempt.read_remember_me(request, &self.settings.markers);
        let verification = self.verification_request(attempt, request);

        let identity = match self.verifier.complete(&verification, request.params()).await {
            HandshakeResult::Success { identity, .. } => identity,
            HandshakeResult::Failure { message } => {
                LoggingHelper::log_handshake_failed(FLOW, &message);
                return Ok(Orchestration::Abort(AbortReason::Failed(
                    OpenIdError::ProviderFailure(message),
                )));
            }
        };
        LoggingHelper::log_handshake_completed(FLOW, &identity);

        match self.store.find_by_openid_identifier(&identity)? {
            Some(record) => {
                attempt.identity = Some(identity);
                attempt.attempted_record = Some(record);
                Ok(Orchestration::Proceed)
            }
            None => {
                LoggingHelper::log_no_matching_account(&identity);
                Ok(Orchestration::Abort(AbortReason::Failed(
                    OpenIdError::NoMatchingAccount(identity),
                )))
            }
        }
    }

    /// Validate the attempt and run the OpenID login
    ///
    /// # Errors
    ///
    /// Returns an error if the account lookup fails. Provider failures and
    /// unknown accounts are reported as [`LoginOutcome::Invalid`] with the
    /// cause in [`LoginAttempt::last_error`].
    pub async fn authenticate(
        &self,
        attempt: &mut LoginAttempt,
        request: &dyn RequestContext,
    ) -> Result<LoginOutcome, OpenIdError> {
        attempt.errors.clear();
        attempt.last_error = None;

        if let Some(message) = attempt.identity_error.clone() {
            attempt.fail(OpenIdError::InvalidIdentity(message));
            return Ok(LoginOutcome::Invalid);
        }

        match self.orchestrate(attempt, request).await? {
            Orchestration::Abort(AbortReason::HandshakeInProgress(redirect)) => {
                Ok(LoginOutcome::Redirect(redirect))
            }
            Orchestration::Abort(AbortReason::Failed(error)) => {
                attempt.fail(error);
                Ok(LoginOutcome::Invalid)
            }
            Orchestration::Proceed => Ok(match attempt.attempted_record.clone() {
                Some(record) => LoginOutcome::Authenticated(Box::new(record)),
                None => LoginOutcome::NotOpenId,
            }),
        }
    }

    fn verification_request(
        &self,
        attempt: &LoginAttempt,
        request: &dyn RequestContext,
    ) -> VerificationRequest {
        let markers = &self.settings.markers;
        let remember_me = if attempt.remember_me { "true" } else { "false" };
        VerificationRequest {
            identity: attempt.identity.clone(),
            required_fields: Vec::new(),
            optional_fields: Vec::new(),
            return_to: request.url_for(&[
                (markers.session_marker.as_str(), "1"),
                (markers.remember_me_param.as_str(), remember_me),
                (markers.callback_param.as_str(), "1"),
            ]),
        }
    }
}
