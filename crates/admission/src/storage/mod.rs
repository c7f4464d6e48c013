//! Record store and document vault implementations.

mod memory;
mod sqlite;
mod vault;

pub use memory::MemoryRecordStore;
pub use sqlite::{SqliteRecordStore, SCHEMA_VERSION};
pub use vault::{FilesystemVault, MemoryVault};
