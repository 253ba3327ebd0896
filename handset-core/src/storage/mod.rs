//! Durable key/value storage for the catalog and engine snapshots.
//!
//! - `KvStore`: string keys to string documents
//! - `MemoryStore`: In-memory implementation
//! - `DirStore`: One file per key inside a data directory

mod dir_store;
mod kv_store;
mod memory_store;

pub use dir_store::DirStore;
pub use kv_store::{file_name_key, key_file_name, KvStore};
pub use memory_store::MemoryStore;
