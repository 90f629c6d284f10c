//! Handshake embedded in saving an identity record
//!
//! A save that sets or changes the OpenID identity is split across two
//! requests. The first snapshots the submitted fields, sends the user to the
//! provider and writes nothing. The provider's callback restores the
//! snapshot, finishes verification, merges any registration data and only
//! then validates and persists the record.

use crate::context::{RequestContext, ScratchStore, SnapshotSlot};
use crate::handshake::credentials::{CredentialValidator, PasswordPolicy};
use crate::handshake::errors::OpenIdError;
use crate::handshake::outcome::{AbortReason, Orchestration, SaveOutcome};
use crate::handshake::phase::{detect_phase, Flow, HandshakePhase, PhaseInputs};
use crate::models::{PendingFieldSnapshot, UserRecord};
use crate::settings::OpenIdSettings;
use crate::store::{RecordStore, StoreError};
use crate::utils::logging::LoggingHelper;
use crate::verifier::{HandshakeResult, OpenIdVerifier, VerificationRequest};
use log::debug;
use std::sync::Arc;

const FLOW: Flow = Flow::Record;

/// Orchestrates the record-centric flow
pub struct RecordHandshake {
    settings: OpenIdSettings,
    verifier: Arc<dyn OpenIdVerifier>,
    store: Arc<dyn RecordStore>,
    credentials: Arc<dyn CredentialValidator>,
}

impl RecordHandshake {
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
            credentials: Arc::new(PasswordPolicy::from_settings(&settings.password)),
        }
    }

    /// Replace the default password policy
    #[must_use]
    pub fn with_credential_validator(mut self, credentials: Arc<dyn CredentialValidator>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn detect_phase(&self, record: &UserRecord, request: &dyn RequestContext) -> HandshakePhase {
        detect_phase(&PhaseInputs {
            enabled: self.settings.authentication.enabled,
            using_openid: record.using_openid(),
            identity_changed: record.identity_changed(),
            callback_pending: PhaseInputs::callback_pending(
                FLOW,
                request.params(),
                &self.settings.markers,
            ),
        })
    }

    /// Run the handshake step this request calls for.
    ///
    /// `Proceed` means validation and persistence may run. On `Abort` the
    /// caller must stop without writing the record.
    ///
    /// # Errors
    ///
    /// Returns an error if scratch storage or the snapshot encoding fails
    pub async fn orchestrate(
        &self,
        record: &mut UserRecord,
        request: &dyn RequestContext,
        scratch: &dyn ScratchStore,
    ) -> Result<Orchestration, OpenIdError> {
        let phase = self.detect_phase(record, request);
        LoggingHelper::log_phase(FLOW, phase);

        match phase {
            HandshakePhase::NotUsingOpenId | HandshakePhase::AwaitingCallback => {
                Ok(Orchestration::Proceed)
            }
            // Validation reports the rejected identifier
            HandshakePhase::Starting if record.openid_error().is_some() => {
                Ok(Orchestration::Proceed)
            }
            HandshakePhase::Starting => self.start(record, request, scratch).await,
            HandshakePhase::Completing => self.complete(record, request, scratch).await,
        }
    }

    async fn start(
        &self,
        record: &UserRecord,
        request: &dyn RequestContext,
        scratch: &dyn ScratchStore,
    ) -> Result<Orchestration, OpenIdError> {
        let Some(identity) = record.openid_identifier() else {
            return Ok(Orchestration::Proceed);
        };

        let slot = self.snapshot_slot(scratch);
        slot.store(&PendingFieldSnapshot::capture(record, true))?;

        let verification = self.verification_request(record, request);
        LoggingHelper::log_handshake_started(FLOW, &identity, &verification.return_to);

        match self.verifier.begin(&verification).await {
            Ok(redirect) => {
                LoggingHelper::log_redirect(FLOW, &redirect.location);
                Ok(Orchestration::Abort(AbortReason::HandshakeInProgress(
                    redirect,
                )))
            }
            Err(failure) => {
                slot.clear()?;
                LoggingHelper::log_handshake_failed(FLOW, &failure.message);
                Ok(Orchestration::Abort(AbortReason::Failed(
                    OpenIdError::ProviderFailure(failure.message),
                )))
            }
        }
    }

    async fn complete(
        &self,
        record: &mut UserRecord,
        request: &dyn RequestContext,
        scratch: &dyn ScratchStore,
    ) -> Result<Orchestration, OpenIdError> {
        let Some(snapshot) = self.snapshot_slot(scratch).take()? else {
            LoggingHelper::log_session_expired(FLOW);
            return Ok(Orchestration::Abort(AbortReason::Failed(
                OpenIdError::SessionExpired,
            )));
        };
        snapshot.restore_onto(record);

        let verification = self.verification_request(record, request);
        match self.verifier.complete(&verification, request.params()).await {
            HandshakeResult::Success { identity, profile } => {
                LoggingHelper::log_handshake_completed(FLOW, &identity);
                if let Some(profile) = profile {
                    profile.fill_absent(record);
                }
                Ok(Orchestration::Proceed)
            }
            HandshakeResult::Failure { message } => {
                LoggingHelper::log_handshake_failed(FLOW, &message);
                Ok(Orchestration::Abort(AbortReason::Failed(
                    OpenIdError::ProviderFailure(message),
                )))
            }
        }
    }

    /// Orchestrate, validate and persist `record`.
    ///
    /// # Errors
    ///
    /// Returns an error on infrastructure failures. Validation and provider
    /// failures are reported as [`SaveOutcome::Invalid`] with messages on
    /// the record.
    pub async fn save(
        &self,
        record: &mut UserRecord,
        request: &dyn RequestContext,
        scratch: &dyn ScratchStore,
    ) -> Result<SaveOutcome, OpenIdError> {
        record.errors_mut().clear();

        match self.orchestrate(record, request, scratch).await? {
            Orchestration::Proceed => {}
            Orchestration::Abort(AbortReason::HandshakeInProgress(redirect)) => {
                return Ok(SaveOutcome::Redirect(redirect));
            }
            Orchestration::Abort(AbortReason::Failed(error)) => {
                add_identity_error(record, &error.to_string());
                return Ok(SaveOutcome::Invalid);
            }
        }

        if !self.validate(record)? {
            debug!("{} record failed validation", record.schema().name());
            return Ok(SaveOutcome::Invalid);
        }

        match self.store.save(record) {
            Ok(id) => Ok(SaveOutcome::Saved(id)),
            Err(StoreError::DuplicateIdentity(_)) => {
                add_taken_error(record);
                Ok(SaveOutcome::Invalid)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `record` as is, skipping both the handshake and validation
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write
    pub fn save_without_validation(&self, record: &mut UserRecord) -> Result<u64, OpenIdError> {
        Ok(self.store.save(record)?)
    }

    /// Append the OpenID and credential validations to `record`'s errors.
    /// Returns whether the record has no errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the uniqueness lookup fails
    pub fn validate(&self, record: &mut UserRecord) -> Result<bool, OpenIdError> {
        if let Some(message) = record.openid_error().map(ToString::to_string) {
            add_identity_error(record, &message);
        }

        if record.using_openid() {
            if let Some(identity) = record.openid_identifier() {
                if self.store.identifier_taken(&identity, record.id())? {
                    add_taken_error(record);
                }
            }
        } else if record.require_password() {
            self.credentials.validate(record);
        }

        Ok(record.is_valid())
    }

    fn snapshot_slot<'a>(&'a self, scratch: &'a dyn ScratchStore) -> SnapshotSlot<'a> {
        SnapshotSlot::new(scratch, &self.settings.scratch.snapshot_key)
    }

    fn verification_request(
        &self,
        record: &UserRecord,
        request: &dyn RequestContext,
    ) -> VerificationRequest {
        let markers = &self.settings.markers;
        VerificationRequest {
            identity: record.openid_identifier(),
            required_fields: record.schema().required_registration_fields(),
            optional_fields: self.settings.registration.optional_fields.clone(),
            return_to: request.url_for(&[
                (markers.record_marker.as_str(), "1"),
                (markers.callback_param.as_str(), "1"),
            ]),
        }
    }
}

fn add_identity_error(record: &mut UserRecord, message: &str) {
    let field = record.schema().identity_field().to_string();
    record
        .errors_mut()
        .add(&field, format!("had the following error: {message}"));
}

fn add_taken_error(record: &mut UserRecord) {
    let field = record.schema().identity_field().to_string();
    record.errors_mut().add(&field, "has already been taken");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CallbackRequest, MemoryScratchStore};
    use crate::identity::OpenIdNormalizer;
    use crate::store::MemoryRecordStore;
    use crate::testing::mock::ScriptedVerifier;
    use crate::testing::fixtures::TestFixtures;
    use chrono::Duration;

    struct Harness {
        handshake: RecordHandshake,
        verifier: Arc<ScriptedVerifier>,
        store: Arc<MemoryRecordStore>,
        scratch: MemoryScratchStore,
    }

    fn harness() -> Harness {
        let verifier = Arc::new(ScriptedVerifier::new());
        let store = Arc::new(MemoryRecordStore::new());
        let handshake = RecordHandshake::new(
            &OpenIdSettings::default(),
            verifier.clone(),
            store.clone(),
        );
        Harness {
            handshake,
            verifier,
            store,
            scratch: MemoryScratchStore::new(Duration::hours(1)),
        }
    }

    fn form_request() -> CallbackRequest {
        CallbackRequest::parse("https://app.example/users").unwrap()
    }

    fn callback_request() -> CallbackRequest {
        CallbackRequest::parse("https://app.example/users?for_model=1&open_id_complete=1").unwrap()
    }

    #[tokio::test]
    async fn test_plain_save_skips_handshake() {
        let h = harness();
        let mut user = TestFixtures::password_user();

        let outcome = h
            .handshake
            .save(&mut user, &form_request(), &h.scratch.session("s"))
            .await
            .unwrap();

        assert!(outcome.is_saved());
        assert_eq!(h.verifier.begin_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_redirects_with_markers() {
        let h = harness();
        let session = h.scratch.session("s");
        let mut user = TestFixtures::openid_user();

        let outcome = h
            .handshake
            .save(&mut user, &form_request(), &session)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Redirect(_)));
        let request = h.verifier.last_begin_request().unwrap();
        assert_eq!(
            request.return_to,
            "https://app.example/users?for_model=1&open_id_complete=1"
        );
        assert_eq!(request.required_fields, vec!["login", "email"]);
        assert_eq!(request.optional_fields, vec!["fullname"]);
        assert!(SnapshotSlot::new(&session, "openid_attributes")
            .is_present()
            .unwrap());
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_discards_snapshot() {
        let h = harness();
        h.verifier.fail_begin("provider unreachable");
        let session = h.scratch.session("s");
        let mut user = TestFixtures::openid_user();

        let outcome = h
            .handshake
            .save(&mut user, &form_request(), &session)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Invalid));
        assert_eq!(
            user.errors().on("openid_identifier"),
            vec!["had the following error: provider unreachable"]
        );
        assert!(!SnapshotSlot::new(&session, "openid_attributes")
            .is_present()
            .unwrap());
    }

    #[tokio::test]
    async fn test_pending_identity_error_blocks_handshake() {
        let h = harness();
        let mut user = TestFixtures::openid_user();
        user.assign_openid_identifier("http://", &OpenIdNormalizer);

        let outcome = h
            .handshake
            .save(&mut user, &form_request(), &h.scratch.session("s"))
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Invalid));
        assert_eq!(h.verifier.begin_calls(), 0);
        assert_eq!(user.errors().on("openid_identifier").len(), 1);
    }

    #[tokio::test]
    async fn test_callback_from_session_flow_is_ignored() {
        let h = harness();
        let mut user = TestFixtures::password_user();
        let request =
            CallbackRequest::parse("https://app.example/users?for_session=1&open_id_complete=1")
                .unwrap();

        assert_eq!(
            h.handshake.detect_phase(&user, &request),
            HandshakePhase::NotUsingOpenId
        );
        let outcome = h
            .handshake
            .save(&mut user, &request, &h.scratch.session("s"))
            .await
            .unwrap();
        assert!(outcome.is_saved());
        assert_eq!(h.verifier.complete_calls(), 0);
    }

    #[tokio::test]
    async fn test_uniqueness_only_checked_for_openid_users() {
        let h = harness();
        let mut first = TestFixtures::openid_user();
        h.handshake.save_without_validation(&mut first).unwrap();

        let mut second = TestFixtures::openid_user();
        assert!(!h.handshake.validate(&mut second).unwrap());
        assert_eq!(
            second.errors().on("openid_identifier"),
            vec!["has already been taken"]
        );
        assert!(second.errors().on("password").is_empty());
    }

    #[tokio::test]
    async fn test_completion_restores_and_saves() {
        let h = harness();
        let session = h.scratch.session("s");
        let mut user = TestFixtures::openid_user();
        h.handshake
            .save(&mut user, &form_request(), &session)
            .await
            .unwrap();

        h.verifier.succeed_with(TestFixtures::identity(), None);
        let mut resumed = TestFixtures::blank_user();
        let outcome = h
            .handshake
            .save(&mut resumed, &callback_request(), &session)
            .await
            .unwrap();

        assert!(outcome.is_saved());
        assert_eq!(resumed.get("login"), Some("ada"));
        assert_eq!(resumed.password(), Some("benice"));
        assert_eq!(resumed.openid_identifier(), Some(TestFixtures::identity()));
    }
}
