//! Persistence for settings, the block cache and its status record
//!
//! Two `KeyValueStore` implementations are available:
//!
//! - `MemoryStore` - in-memory, nothing survives the process
//! - `FileStore` - one JSON file per key under a data directory
//!
//! The `repository` functions give typed access to the well-known keys.

mod fs;
mod memory;
pub mod repository;
mod traits;

pub use fs::FileStore;
pub use memory::MemoryStore;
pub use traits::{KeyValueStore, StorageChange};
