use crate::handshake::errors::OpenIdError;
use crate::handshake::phase::HandshakePhase;
use crate::models::UserRecord;
use crate::verifier::RedirectInstruction;

/// Why the enclosing save or login must stop without committing
#[derive(Debug)]
pub enum AbortReason {
    /// Not a failure: the user agent must follow the redirect and the
    /// operation resumes on the provider's callback
    HandshakeInProgress(RedirectInstruction),
    /// A domain failure to report as a validation message
    Failed(OpenIdError),
}

/// Result of running the orchestrator ahead of persistence or login
#[derive(Debug)]
pub enum Orchestration {
    Proceed,
    Abort(AbortReason),
}

impl Orchestration {
    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    #[must_use]
    pub fn redirect(&self) -> Option<&RedirectInstruction> {
        match self {
            Self::Abort(AbortReason::HandshakeInProgress(redirect)) => Some(redirect),
            _ => None,
        }
    }

    /// Phase the attempt is left in, if a handshake is outstanding
    #[must_use]
    pub fn pending_phase(&self) -> Option<HandshakePhase> {
        self.redirect().map(|_| HandshakePhase::AwaitingCallback)
    }
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved(u64),
    /// Handshake in progress; nothing was written
    Redirect(RedirectInstruction),
    /// Validation failed; see the record's errors
    Invalid,
}

impl SaveOutcome {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(Box<UserRecord>),
    /// Handshake in progress
    Redirect(RedirectInstruction),
    /// Login failed; see the attempt's errors
    Invalid,
    /// No OpenID login was attempted; the caller's own credential check runs
    NotOpenId,
}

impl LoginOutcome {
    #[must_use]
    pub fn record(&self) -> Option<&UserRecord> {
        match self {
            Self::Authenticated(record) => Some(record.as_ref()),
            _ => None,
        }
    }
}
