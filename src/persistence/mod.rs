//! Serialization helpers and the host storage boundary

pub mod codec;
pub mod lenient;
pub mod store;

pub use store::{JsonFileStore, MemoryStore, StateStore};
