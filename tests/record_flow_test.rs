// Integration tests for the handshake embedded in saving a user record
use openid_handshake::context::{ScratchStore, SnapshotSlot};
use openid_handshake::handshake::{OpenIdError, Orchestration, AbortReason};
use openid_handshake::identity::OpenIdNormalizer;
use openid_handshake::models::PendingFieldSnapshot;
use openid_handshake::testing::constants::{TEST_FULLNAME, TEST_PASSWORD};
use openid_handshake::testing::{ScriptedVerifier, TestFixtures, TestUserBuilder};
use openid_handshake::{MemoryRecordStore, ProfileFields, RecordHandshake, SaveOutcome, UserRecord};
use std::sync::Arc;

struct App {
    handshake: RecordHandshake,
    verifier: Arc<ScriptedVerifier>,
    store: Arc<MemoryRecordStore>,
}

fn app() -> App {
    let verifier = Arc::new(ScriptedVerifier::new());
    let store = Arc::new(MemoryRecordStore::new());
    let handshake = RecordHandshake::new(&TestFixtures::settings(), verifier.clone(), store.clone());
    App {
        handshake,
        verifier,
        store,
    }
}

/// Submit the signup form, then come back from the provider
async fn round_trip(app: &App, form: &mut UserRecord, session: &dyn ScratchStore) -> (SaveOutcome, UserRecord) {
    let started = app
        .handshake
        .save(form, &TestFixtures::signup_request(), session)
        .await
        .unwrap();
    assert!(matches!(started, SaveOutcome::Redirect(_)));

    let mut resumed = TestFixtures::blank_user();
    let outcome = app
        .handshake
        .save(&mut resumed, &TestFixtures::signup_callback_request(), session)
        .await
        .unwrap();
    (outcome, resumed)
}

#[tokio::test]
async fn test_invalid_identity_yields_exactly_one_error() {
    let app = app();
    let scratch = TestFixtures::scratch();

    for raw in ["http://", "https://", "http:// spaced out"] {
        let mut user = TestFixtures::password_user();
        user.assign_openid_identifier(raw, &OpenIdNormalizer);
        assert!(user.openid_error().is_some(), "{raw} should be rejected");

        let outcome = app
            .handshake
            .save(&mut user, &TestFixtures::signup_request(), &scratch.session("s"))
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::Invalid));
        assert_eq!(user.errors().on("openid_identifier").len(), 1, "{raw}");
    }
    assert_eq!(app.verifier.begin_calls(), 0);
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn test_starting_never_writes_the_store() {
    let app = app();
    let mut existing = TestFixtures::password_user();
    app.handshake.save_without_validation(&mut existing).unwrap();
    let writes_before = app.store.write_count();

    existing.assign_openid_identifier("https://example.com/ada", &OpenIdNormalizer);
    let outcome = app
        .handshake
        .save(&mut existing, &TestFixtures::signup_request(), &TestFixtures::scratch().session("s"))
        .await
        .unwrap();

    assert!(matches!(outcome, SaveOutcome::Redirect(_)));
    assert_eq!(app.store.write_count(), writes_before);
    let stored = app.store.find(existing.id().unwrap()).unwrap();
    assert!(stored.openid_identifier().is_none());
}

#[tokio::test]
async fn test_fullname_fills_empty_name() {
    let app = app();
    let scratch = TestFixtures::scratch();
    let session = scratch.session("s");
    app.verifier.succeed_with(
        TestFixtures::identity(),
        Some(ProfileFields::new().with("fullname", TEST_FULLNAME)),
    );

    let mut form = TestFixtures::openid_user();
    let (outcome, resumed) = round_trip(&app, &mut form, &session).await;

    assert!(outcome.is_saved());
    assert_eq!(resumed.get("name"), Some("Ada Lovelace"));
    assert_eq!(resumed.get("first_name"), Some("Ada"));
    assert_eq!(resumed.get("last_name"), Some("Lovelace"));
}

#[tokio::test]
async fn test_fullname_never_overwrites_existing_name() {
    let app = app();
    let scratch = TestFixtures::scratch();
    let session = scratch.session("s");
    app.verifier.succeed_with(TestFixtures::identity(), Some(TestFixtures::profile()));

    let mut form = TestUserBuilder::new()
        .with_field("login", "ada")
        .with_field("email", "countess@example.com")
        .with_field("name", "A. L.")
        .with_identity("https://example.com/ada")
        .build();
    let (outcome, resumed) = round_trip(&app, &mut form, &session).await;

    assert!(outcome.is_saved());
    assert_eq!(resumed.get("name"), Some("A. L."));
    assert_eq!(resumed.get("email"), Some("countess@example.com"));
    assert_eq!(resumed.get("first_name"), Some("Ada"));
}

#[tokio::test]
async fn test_canceled_handshake_is_not_persisted() {
    let app = app();
    let scratch = TestFixtures::scratch();
    let session = scratch.session("s");
    app.verifier.fail_with("canceled");

    let mut form = TestFixtures::openid_user();
    let (outcome, resumed) = round_trip(&app, &mut form, &session).await;

    assert!(matches!(outcome, SaveOutcome::Invalid));
    assert!(resumed.is_new_record());
    assert!(resumed
        .errors()
        .on("openid_identifier")
        .iter()
        .any(|message| message.contains("canceled")));
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn test_snapshot_round_trip_includes_password() {
    let app = app();
    let scratch = TestFixtures::scratch();
    let session = scratch.session("s");
    let form = TestFixtures::openid_user();
    let captured = PendingFieldSnapshot::capture(&form, true);

    let mut submitted = form.clone();
    app.handshake
        .save(&mut submitted, &TestFixtures::signup_request(), &session)
        .await
        .unwrap();
    let stored = SnapshotSlot::new(&session, "openid_attributes").take().unwrap();
    assert_eq!(stored.as_ref(), Some(&captured));
    assert_eq!(captured.get("password"), Some(Some(TEST_PASSWORD)));
    assert!(!captured.contains("persistence_token"));
    assert!(!captured.contains("crypted_password"));

    // Put it back and let the callback consume it
    SnapshotSlot::new(&session, "openid_attributes")
        .store(&captured)
        .unwrap();
    let mut resumed = TestFixtures::blank_user();
    let outcome = app
        .handshake
        .save(&mut resumed, &TestFixtures::signup_callback_request(), &session)
        .await
        .unwrap();

    assert!(outcome.is_saved());
    for field in captured.field_names() {
        assert_eq!(
            resumed.get(field),
            captured.get(field).flatten(),
            "{field} not restored"
        );
    }
}

#[tokio::test]
async fn test_second_callback_is_session_expired() {
    let app = app();
    let scratch = TestFixtures::scratch();
    let session = scratch.session("s");

    let mut form = TestFixtures::openid_user();
    let (first, _) = round_trip(&app, &mut form, &session).await;
    assert!(first.is_saved());
    let completions = app.verifier.complete_calls();

    let mut replayed = TestFixtures::blank_user();
    let orchestration = app
        .handshake
        .orchestrate(&mut replayed, &TestFixtures::signup_callback_request(), &session)
        .await
        .unwrap();

    assert!(matches!(
        orchestration,
        Orchestration::Abort(AbortReason::Failed(OpenIdError::SessionExpired))
    ));
    assert_eq!(app.verifier.complete_calls(), completions);
}

#[tokio::test]
async fn test_changing_identity_rotates_persistence_token() {
    let mut user = TestUserBuilder::new()
        .with_field("persistence_token", "old-token")
        .with_identity("https://example.com/ada")
        .persisted(1)
        .build();
    let before = user.get("persistence_token").map(ToString::to_string);

    user.assign_openid_identifier("https://example.com/ada", &OpenIdNormalizer);
    assert_eq!(user.get("persistence_token").map(ToString::to_string), before);

    user.assign_openid_identifier("https://example.com/lovelace", &OpenIdNormalizer);
    assert_ne!(user.get("persistence_token").map(ToString::to_string), before);
}
