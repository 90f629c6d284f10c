//! Random token generation

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

/// Generate `length` random bytes encoded as URL-safe base64
#[must_use]
pub fn generate_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Fresh long-lived session proof for a record (512 bits)
#[must_use]
pub fn generate_persistence_token() -> String {
    generate_token(64)
}

/// Identifier for a scratch-storage session (192 bits)
#[must_use]
pub fn generate_session_id() -> String {
    generate_token(24)
}
