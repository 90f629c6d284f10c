//! Factory for the configured record and session orchestrators

use crate::context::MemoryScratchStore;
use crate::handshake::{Flow, RecordHandshake, SessionHandshake};
use crate::settings::OpenIdSettings;
use crate::store::RecordStore;
use crate::utils::logging::LoggingHelper;
use crate::verifier::OpenIdVerifier;
use std::sync::Arc;

/// Everything an application needs to run both handshake flows
pub struct HandshakeServices {
    pub record: RecordHandshake,
    pub session: SessionHandshake,
    pub scratch: MemoryScratchStore,
}

/// Factory for creating handshake orchestrators with shared collaborators
pub struct HandshakeFactory;

impl HandshakeFactory {
    /// Create both orchestrators and an in-memory scratch store
    ///
    /// # Arguments
    /// * `settings` - Loaded settings
    /// * `verifier` - The OpenID library adapter
    /// * `store` - Persistence for identity records
    #[must_use]
    pub fn create_complete(
        settings: &OpenIdSettings,
        verifier: Arc<dyn OpenIdVerifier>,
        store: Arc<dyn RecordStore>,
    ) -> HandshakeServices {
        log::info!("🏭 Starting OpenID handshake factory...");

        let services = HandshakeServices {
            record: Self::create_record_handshake(settings, Arc::clone(&verifier), Arc::clone(&store)),
            session: Self::create_session_handshake(settings, verifier, store),
            scratch: MemoryScratchStore::from_settings(&settings.scratch),
        };

        log::info!(
            "   └─ snapshot key: {}, scratch TTL: {}h",
            settings.scratch.snapshot_key,
            settings.scratch.ttl_hours
        );
        log::info!("🏭 OpenID handshake factory completed successfully");
        services
    }

    #[must_use]
    pub fn create_record_handshake(
        settings: &OpenIdSettings,
        verifier: Arc<dyn OpenIdVerifier>,
        store: Arc<dyn RecordStore>,
    ) -> RecordHandshake {
        LoggingHelper::log_orchestrator_configured(Flow::Record, settings.authentication.enabled);
        RecordHandshake::new(settings, verifier, store)
    }

    #[must_use]
    pub fn create_session_handshake(
        settings: &OpenIdSettings,
        verifier: Arc<dyn OpenIdVerifier>,
        store: Arc<dyn RecordStore>,
    ) -> SessionHandshake {
        LoggingHelper::log_orchestrator_configured(Flow::Session, settings.authentication.enabled);
        SessionHandshake::new(settings, verifier, store)
    }
}
