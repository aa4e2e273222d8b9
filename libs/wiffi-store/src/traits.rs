//! Trait definitions for the object store abstraction

use crate::error::Result;
use crate::object::{DeviceObject, GroupObject, PointCommon, PointState};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;

/// Object store used by the gateway
///
/// Holds the device/group/point tree, point values and the room directory.
/// All ids are full dotted paths (see [`crate::path`]).
///
/// Implementations:
/// - `MemoryStore`: in-process backend used by the service and tests
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    // ========== Introspection ==========

    /// Allow downcasting to concrete types
    fn as_any(&self) -> &dyn Any;

    // ========== Devices ==========

    /// Create a device object; existing devices are left untouched
    async fn create_device(&self, id: &str, name: Option<&str>) -> Result<()>;

    /// List all device objects
    async fn list_devices(&self) -> Result<Vec<DeviceObject>>;

    // ========== Groups ==========

    /// List the groups directly below `device`
    async fn list_groups(&self, device: &str) -> Result<Vec<GroupObject>>;

    /// Create a group object
    ///
    /// A dotted id requires its parent device to exist. Existing groups are
    /// left untouched.
    async fn create_group(&self, id: &str, name: Option<&str>) -> Result<()>;

    /// Delete a group together with every point below it
    ///
    /// Returns false if the group did not exist.
    async fn delete_group(&self, id: &str) -> Result<bool>;

    // ========== Points ==========

    /// Create (or replace) a point object below an existing group
    ///
    /// When `common.default` is set and the point has no value yet, the
    /// default becomes its initial value with ack = true.
    async fn create_point(&self, id: &str, common: PointCommon) -> Result<()>;

    /// Delete a point object and its value
    ///
    /// Returns false if the point did not exist.
    async fn delete_point(&self, id: &str) -> Result<bool>;

    /// Current value of a point, `None` if it has never been written
    async fn get_point(&self, id: &str) -> Result<Option<PointState>>;

    /// Metadata of a point, `None` if the point does not exist
    async fn get_point_object(&self, id: &str) -> Result<Option<PointCommon>>;

    /// Write a point value; fails with `NotFound` for unknown points
    async fn set_point(&self, id: &str, value: Value, ack: bool) -> Result<()>;

    /// Ids of all points below `prefix`
    async fn list_points(&self, prefix: &str) -> Result<Vec<String>>;

    // ========== Rooms ==========

    /// Add a group to the member list of `room`
    async fn add_group_to_room(&self, room: &str, group: &str) -> Result<()>;

    /// Remove a group from every room it is a member of
    async fn remove_group_from_rooms(&self, group: &str) -> Result<()>;

    /// Member ids of `room`
    async fn room_members(&self, room: &str) -> Result<Vec<String>>;

    // ========== Convenience (default implementations) ==========

    /// Check whether a point object exists
    async fn point_exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_point_object(id).await?.is_some())
    }
}
