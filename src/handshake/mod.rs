//! OpenID handshake orchestration
//!
//! - [`phase`] - pure per-request phase detection
//! - [`record`] - handshake embedded in saving an identity record
//! - [`session`] - handshake embedded in a login attempt
//! - [`credentials`] - password checks for records not using OpenID
//! - [`outcome`] / [`errors`] - what the orchestrators report back

pub mod credentials;
pub mod errors;
pub mod outcome;
pub mod phase;
pub mod record;
pub mod session;

pub use credentials::{CredentialValidator, PasswordPolicy};
pub use errors::OpenIdError;
pub use outcome::{AbortReason, LoginOutcome, Orchestration, SaveOutcome};
pub use phase::{detect_phase, Flow, HandshakePhase, PhaseInputs};
pub use record::RecordHandshake;
pub use session::{LoginAttempt, SessionHandshake};
