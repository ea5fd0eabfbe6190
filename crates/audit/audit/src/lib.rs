pub mod emitter;
pub mod error;
pub mod log;
pub mod record;
pub mod store;

pub use emitter::AuditEmitter;
pub use error::AuditError;
pub use log::LogAuditStore;
pub use record::{AuditRecord, Outcome};
pub use store::AuditStore;
