//! SQLite persistence for the bridge (§6): durable [bridge_core_ext::MessageState]
//! so a restart rehydrates the `MessageStore` rather than starting blank,
//! and the NODEINFO-derived node name directory.
mod codec;
mod error;
mod names;
mod sqlite;

pub use error::StoreError;
pub use names::SqliteNameDirectory;
pub use sqlite::connect;
pub use sqlite::SqlitePersistenceStore;
