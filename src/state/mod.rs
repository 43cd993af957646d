/// State management module
///
/// This module handles all persisted client state:
/// - Catalog data structures (data.rs)
/// - Local key/value storage backends (storage.rs)
/// - The Dream Garage favorites store (garage.rs)

pub mod data;
pub mod garage;
pub mod storage;

pub use data::{Condition, Currency, Vehicle};
pub use garage::{Garage, GarageSnapshot, SubscriptionId, DEFAULT_STORAGE_KEY};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
