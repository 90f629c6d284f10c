//! Request and session context consumed by the orchestrator
//!
//! - [`request`] - request parameters and return-URL construction, with an
//!   actix-web adapter
//! - [`scratch`] - session-scoped storage for the pending field snapshot

pub mod request;
pub mod scratch;

pub use request::{CallbackParams, CallbackRequest, RequestContext};
pub use scratch::{MemoryScratchStore, ScratchError, ScratchStore, SessionScratch, SnapshotSlot};
