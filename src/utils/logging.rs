// Centralized logging for recurring handshake events
use crate::handshake::{Flow, HandshakePhase};
use crate::identity::Identity;
use log::{debug, info, warn};

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log the phase chosen for a request
    pub fn log_phase(flow: Flow, phase: HandshakePhase) {
        debug!("OpenID {flow} handshake phase: {phase:?}");
    }

    /// Log the start of a handshake before the provider redirect
    pub fn log_handshake_started(flow: Flow, identity: &Identity, return_to: &str) {
        info!("🔐 Starting OpenID {flow} handshake for {identity}");
        debug!("   └─ return_to: {return_to}");
    }

    /// Log the redirect issued to the provider
    pub fn log_redirect(flow: Flow, location: &str) {
        info!("↪️  Redirecting {flow} handshake to provider: {location}");
    }

    /// Log a successfully verified identity
    pub fn log_handshake_completed(flow: Flow, identity: &Identity) {
        info!("✅ OpenID {flow} handshake verified {identity}");
    }

    /// Log a provider-reported failure
    pub fn log_handshake_failed(flow: Flow, message: &str) {
        warn!("❌ OpenID {flow} handshake failed: {message}");
    }

    /// Log a callback that arrived without its pending snapshot
    pub fn log_session_expired(flow: Flow) {
        warn!("⌛ OpenID {flow} callback without a pending snapshot, treating as expired");
    }

    /// Log a verified identity that no local account is bound to
    pub fn log_no_matching_account(identity: &Identity) {
        warn!("❌ Verified OpenID {identity} does not match any account");
    }

    /// Log orchestrator construction
    pub fn log_orchestrator_configured(flow: Flow, enabled: bool) {
        if enabled {
            info!("✅ OpenID {flow} handshake configured");
        } else {
            info!("⚠️  OpenID {flow} handshake is disabled");
        }
    }
}
