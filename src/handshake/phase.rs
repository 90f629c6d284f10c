//! Per-request handshake phase detection
//!
//! Detection is a pure function of [`PhaseInputs`]: asking twice with the
//! same request state always yields the same phase.

use crate::context::CallbackParams;
use crate::settings::MarkerSettings;
use std::fmt;

/// Which operation a handshake is embedded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Creating or updating an identity record
    Record,
    /// Logging in against an existing record
    Session,
}

impl Flow {
    /// Correlation marker this flow embeds in its return URL
    #[must_use]
    pub fn marker(self, markers: &MarkerSettings) -> &str {
        match self {
            Self::Record => &markers.record_marker,
            Self::Session => &markers.session_marker,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record => f.write_str("record"),
            Self::Session => f.write_str("session"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakePhase {
    /// No handshake is needed; the normal path runs unmodified
    NotUsingOpenId,
    /// Snapshot the form and send the user to the provider
    Starting,
    /// The provider holds the user agent. Never detected from a request;
    /// reported for attempts aborted with a redirect.
    AwaitingCallback,
    /// The provider redirected back; finish verification
    Completing,
}

/// Request state phase detection depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseInputs {
    pub enabled: bool,
    pub using_openid: bool,
    pub identity_changed: bool,
    pub callback_pending: bool,
}

impl PhaseInputs {
    /// Whether the callback flag and `flow`'s correlation marker are both
    /// present, whatever their values
    #[must_use]
    pub fn callback_pending(flow: Flow, params: &CallbackParams, markers: &MarkerSettings) -> bool {
        params.contains(&markers.callback_param) && params.contains(flow.marker(markers))
    }

    #[must_use]
    pub fn should_handshake(&self) -> bool {
        self.enabled && ((self.using_openid && self.identity_changed) || self.callback_pending)
    }
}

/// Decide what the orchestrator does for this request
#[must_use]
pub fn detect_phase(inputs: &PhaseInputs) -> HandshakePhase {
    if !inputs.should_handshake() {
        HandshakePhase::NotUsingOpenId
    } else if inputs.callback_pending {
        HandshakePhase::Completing
    } else {
        HandshakePhase::Starting
    }
}
