//! Pre-built records, requests and settings

use crate::context::{CallbackRequest, MemoryScratchStore};
use crate::identity::{Identity, OpenIdNormalizer};
use crate::models::{ProfileFields, RecordSchema, UserRecord};
use crate::settings::OpenIdSettings;
use chrono::Duration;
use std::sync::Arc;

use super::builders::TestUserBuilder;
use super::constants::{
    APP_URL, TEST_EMAIL, TEST_FULLNAME, TEST_IDENTITY, TEST_LOGIN, TEST_PASSWORD,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    #[must_use]
    pub fn settings() -> OpenIdSettings {
        OpenIdSettings::default()
    }

    #[must_use]
    pub fn schema() -> Arc<RecordSchema> {
        Arc::new(RecordSchema::users())
    }

    /// Normalized identity of the default test user
    #[must_use]
    pub fn identity() -> Identity {
        Identity::new(TEST_IDENTITY)
    }

    #[must_use]
    pub fn blank_user() -> UserRecord {
        UserRecord::new(Self::schema())
    }

    /// Signup form filled in for a password login
    #[must_use]
    pub fn password_user() -> UserRecord {
        TestUserBuilder::new()
            .with_field("login", TEST_LOGIN)
            .with_field("email", TEST_EMAIL)
            .with_password(TEST_PASSWORD)
            .build()
    }

    /// Signup form filled in with an OpenID identifier
    #[must_use]
    pub fn openid_user() -> UserRecord {
        let mut user = Self::password_user();
        user.assign_openid_identifier(TEST_IDENTITY, &OpenIdNormalizer);
        user
    }

    /// Registration data a provider returns for the test user
    #[must_use]
    pub fn profile() -> ProfileFields {
        ProfileFields::new()
            .with("fullname", TEST_FULLNAME)
            .with("email", TEST_EMAIL)
    }

    #[must_use]
    pub fn scratch() -> MemoryScratchStore {
        MemoryScratchStore::new(Duration::hours(1))
    }

    /// # Panics
    ///
    /// Panics if the fixture URL does not parse
    #[must_use]
    pub fn signup_request() -> CallbackRequest {
        Self::request("/users")
    }

    /// # Panics
    ///
    /// Panics if the fixture URL does not parse
    #[must_use]
    pub fn signup_callback_request() -> CallbackRequest {
        Self::request("/users?for_model=1&open_id_complete=1")
    }

    /// # Panics
    ///
    /// Panics if the fixture URL does not parse
    #[must_use]
    pub fn login_request() -> CallbackRequest {
        Self::request("/user_session")
    }

    /// # Panics
    ///
    /// Panics if the fixture URL does not parse
    #[must_use]
    pub fn login_callback_request(remember_me: bool) -> CallbackRequest {
        Self::request(&format!(
            "/user_session?for_session=1&remember_me={remember_me}&open_id_complete=1"
        ))
    }

    fn request(path_and_query: &str) -> CallbackRequest {
        CallbackRequest::parse(&format!("{APP_URL}{path_and_query}")).unwrap()
    }
}
