//! Construction of the handshake orchestrators from settings
//!
//! Both flows share one verifier and one record store; the factory wires
//! them together with the configured markers, password policy and scratch
//! storage.

pub mod factory;

pub use factory::{HandshakeFactory, HandshakeServices};
