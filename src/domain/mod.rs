//! Domain layer: pure entities and the error taxonomy. No I/O, no async,
//! no knowledge of tokio/tracing beyond the `tracing::Level` type used to
//! tag a task's log level.

pub mod errors;
pub mod models;

pub use errors::{DomainResult, ErrorKind, ErrorPayload, SequenceError, TargetError, TaskError};
