//! Test helpers shared by unit and integration tests
//!
//! - [`fixtures`] - ready-made records, requests and settings
//! - [`builders`] - fluent builder for customized records
//! - [`mock`] - scripted OpenID verifier that records its calls
//!
//! ```rust
//! use openid_handshake::testing::{builders::TestUserBuilder, fixtures::TestFixtures};
//!
//! let user = TestUserBuilder::new()
//!     .with_identity("example.com/ada")
//!     .with_field("name", "A. L.")
//!     .build();
//! assert!(user.using_openid());
//!
//! let request = TestFixtures::signup_request();
//! # let _ = request;
//! ```

pub mod builders;
pub mod fixtures;
pub mod mock;

pub use builders::TestUserBuilder;
pub use fixtures::TestFixtures;
pub use mock::ScriptedVerifier;

/// Common test constants
pub mod constants {
    /// Base URL of the application under test
    pub const APP_URL: &str = "https://app.example";

    /// Normalized identity of the default test user
    pub const TEST_IDENTITY: &str = "https://example.com/ada";

    /// Identity no test account is bound to
    pub const UNKNOWN_IDENTITY: &str = "https://example.com/babbage";

    pub const TEST_LOGIN: &str = "ada";

    pub const TEST_EMAIL: &str = "ada@example.com";

    pub const TEST_PASSWORD: &str = "benice";

    pub const TEST_FULLNAME: &str = "Ada Lovelace";

    /// Where the scripted verifier sends users
    pub const PROVIDER_ENDPOINT: &str = "https://provider.example/openid";
}
