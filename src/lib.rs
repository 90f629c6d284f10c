#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the openid-handshake crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod authentication;
pub mod context;
pub mod handshake;
pub mod identity;
pub mod models;
pub mod settings;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod utils;
pub mod verifier;

/// Re-export commonly used items
pub use authentication::{HandshakeFactory, HandshakeServices};
pub use context::{CallbackParams, CallbackRequest, RequestContext, ScratchStore, SnapshotSlot};
pub use handshake::{
    AbortReason, HandshakePhase, LoginAttempt, LoginOutcome, OpenIdError, Orchestration,
    RecordHandshake, SaveOutcome, SessionHandshake,
};
pub use identity::{Identity, IdentityNormalizer, OpenIdNormalizer};
pub use models::{PendingFieldSnapshot, ProfileFields, RecordSchema, UserRecord};
pub use settings::OpenIdSettings;
pub use store::{MemoryRecordStore, RecordStore};
pub use verifier::{HandshakeResult, OpenIdVerifier, RedirectInstruction, VerificationRequest};
