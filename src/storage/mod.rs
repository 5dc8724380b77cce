//! Storage collaborator
//!
//! Compiled node code, templates, menu labels, static content and session
//! state all live in a key-value store. Keys combine a [`DataType`], a
//! name, and optionally a session scope and a language variant.

pub mod errors;
pub mod implementations;
pub mod keys;
pub mod traits;

pub use errors::*;
pub use implementations::file_storage::FileStorage;
pub use implementations::in_memory::InMemoryStorage;
pub use keys::{DataType, StorageKey};
pub use traits::*;
