//! Wiffi gateway object store
//!
//! Provides the storage contract the gateway writes device groups, data
//! points and point values into, plus an in-memory backend.
//!
//! # Key Components
//!
//! - **ObjectStore trait**: async storage contract
//! - **MemoryStore**: DashMap backed implementation
//! - **object**: point metadata and value types

pub mod error;

pub mod memory_impl;

pub mod object;

pub mod path;

pub mod time;

pub mod traits;

// Re-exports
pub use error::{Result, StoreError};
pub use memory_impl::{MemoryStats, MemoryStore, StoreOp};
pub use object::{DeviceObject, GroupObject, PointCommon, PointState, ValueType};
pub use time::{FixedTimeProvider, SystemTimeProvider, TimeProvider};
pub use traits::ObjectStore;

/// Helper functions for tests and wiring
pub mod helpers {
    use super::{MemoryStore, ObjectStore};
    use std::sync::Arc;

    /// Create an in-memory store behind the trait object
    pub fn create_test_store() -> Arc<dyn ObjectStore> {
        Arc::new(MemoryStore::new())
    }

    /// Create a concrete MemoryStore for tests that inspect internal state
    pub fn create_test_memory_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }
}
