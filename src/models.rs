//! Record, snapshot and profile types shared by both handshake flows

pub mod errors;
pub mod profile;
pub mod record;
pub mod schema;
pub mod snapshot;

pub use errors::{ValidationError, ValidationErrors};
pub use profile::ProfileFields;
pub use record::{RecordError, UserRecord};
pub use schema::RecordSchema;
pub use snapshot::{PendingFieldSnapshot, SnapshotError};
