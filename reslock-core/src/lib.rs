//! # reslock-core
//!
//! Advisory, time-bounded resource locking on top of an ordered key-value
//! store. Users register as holders of a resource for a TTL window; the
//! registry answers who holds a resource and which resources of a type are
//! locked. Locks are soft: any number of users may hold the same resource.
//!
//! Expiry is lazy. Every operation first range-deletes entries whose expiry
//! score is at or before the current time, and the store's per-collection
//! deadline reclaims collections that are never read again.

pub mod clock;
pub mod config;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod keys;
pub mod registry;
pub mod types;

pub use error::{LockError, LockResult, StoreError, StoreResult};
pub use registry::LockRegistry;
pub use types::{Holder, ResourceType, SweepReport, Timestamp};

#[cfg(test)]
mod keys_test;
