//! Concrete persistence adapters. The session file format is left to the
//! implementer by spec; this crate ships one JSON-backed `SequenceStore`.

pub mod file_store;

pub use file_store::FileSequenceStore;
