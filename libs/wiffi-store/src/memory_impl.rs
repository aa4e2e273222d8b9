//! In-memory object store implementation
//!
//! Uses DashMap for concurrent access from every connection task.
//! Backs the service binary and the test suites.

use crate::error::{Result, StoreError};
use crate::object::{DeviceObject, GroupObject, PointCommon, PointState};
use crate::path;
use crate::time::{SystemTimeProvider, TimeProvider};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Store operations that can be forced to fail in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateDevice,
    ListDevices,
    ListGroups,
    CreateGroup,
    DeleteGroup,
    CreatePoint,
    DeletePoint,
    GetPoint,
    SetPoint,
    ListPoints,
    Rooms,
}

/// In-memory object store with concurrent access support
pub struct MemoryStore {
    devices: Arc<DashMap<String, DeviceObject>>,
    groups: Arc<DashMap<String, GroupObject>>,
    points: Arc<DashMap<String, PointCommon>>,
    states: Arc<DashMap<String, PointState>>,
    rooms: Arc<DashMap<String, RwLock<Vec<String>>>>,
    clock: Arc<dyn TimeProvider>,
    write_count: AtomicU64,
    failing_ops: DashSet<StoreOp>,
    failing_ids: DashSet<String>,
}

impl MemoryStore {
    /// Create an empty store using the system clock
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(SystemTimeProvider))
    }

    /// Create an empty store with a custom clock
    pub fn with_time_provider(clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            devices: Arc::new(DashMap::new()),
            groups: Arc::new(DashMap::new()),
            points: Arc::new(DashMap::new()),
            states: Arc::new(DashMap::new()),
            rooms: Arc::new(DashMap::new()),
            clock,
            write_count: AtomicU64::new(0),
            failing_ops: DashSet::new(),
            failing_ids: DashSet::new(),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.devices.clear();
        self.groups.clear();
        self.points.clear();
        self.states.clear();
        self.rooms.clear();
        self.write_count.store(0, Ordering::Relaxed);
    }

    /// Get statistics about stored data
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            device_count: self.devices.len(),
            group_count: self.groups.len(),
            point_count: self.points.len(),
            state_count: self.states.len(),
            room_count: self.rooms.len(),
            write_count: self.write_count.load(Ordering::Relaxed),
        }
    }

    /// Make every call of `op` fail with `StoreError::Unavailable`
    pub fn fail_operation(&self, op: StoreOp) {
        self.failing_ops.insert(op);
    }

    /// Make every operation addressing `id` fail with `StoreError::Unavailable`
    pub fn fail_id(&self, id: &str) {
        self.failing_ids.insert(id.to_string());
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.failing_ops.clear();
        self.failing_ids.clear();
    }

    fn check(&self, op: StoreOp, id: &str) -> Result<()> {
        if self.failing_ops.contains(&op) || self.failing_ids.contains(id) {
            return Err(StoreError::Unavailable(format!("{:?} {}", op, id)));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about memory store usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    pub device_count: usize,
    pub group_count: usize,
    pub point_count: usize,
    pub state_count: usize,
    pub room_count: usize,
    /// Number of successful `set_point` calls
    pub write_count: u64,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn create_device(&self, id: &str, name: Option<&str>) -> Result<()> {
        self.check(StoreOp::CreateDevice, id)?;
        path::validate(id)?;
        self.devices
            .entry(id.to_string())
            .or_insert_with(|| DeviceObject {
                id: id.to_string(),
                name: name.map(str::to_string),
            });
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceObject>> {
        self.check(StoreOp::ListDevices, "")?;
        let mut devices: Vec<DeviceObject> =
            self.devices.iter().map(|d| d.value().clone()).collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    async fn list_groups(&self, device: &str) -> Result<Vec<GroupObject>> {
        self.check(StoreOp::ListGroups, device)?;
        let mut groups: Vec<GroupObject> = self
            .groups
            .iter()
            .filter(|g| path::parent(g.key()) == Some(device))
            .map(|g| g.value().clone())
            .collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn create_group(&self, id: &str, name: Option<&str>) -> Result<()> {
        self.check(StoreOp::CreateGroup, id)?;
        path::validate(id)?;
        if let Some(device) = path::parent(id) {
            if !self.devices.contains_key(device) {
                return Err(StoreError::NotFound(device.to_string()));
            }
        }
        self.groups
            .entry(id.to_string())
            .or_insert_with(|| GroupObject {
                id: id.to_string(),
                name: name.map(str::to_string),
            });
        Ok(())
    }

    async fn delete_group(&self, id: &str) -> Result<bool> {
        self.check(StoreOp::DeleteGroup, id)?;
        let existed = self.groups.remove(id).is_some();
        let before = self.points.len();
        self.points.retain(|key, _| path::child_of(id, key).is_none());
        self.states.retain(|key, _| path::child_of(id, key).is_none());
        debug!(
            "Deleted group {} ({} points)",
            id,
            before.saturating_sub(self.points.len())
        );
        Ok(existed)
    }

    async fn create_point(&self, id: &str, common: PointCommon) -> Result<()> {
        self.check(StoreOp::CreatePoint, id)?;
        path::validate(id)?;
        let group = path::parent(id).ok_or_else(|| StoreError::InvalidId(id.to_string()))?;
        if !self.groups.contains_key(group) {
            return Err(StoreError::NotFound(group.to_string()));
        }

        if let Some(default) = common.default.clone() {
            let ts = self.clock.now_millis();
            self.states.entry(id.to_string()).or_insert(PointState {
                val: default,
                ack: true,
                ts,
            });
        }
        self.points.insert(id.to_string(), common);
        Ok(())
    }

    async fn delete_point(&self, id: &str) -> Result<bool> {
        self.check(StoreOp::DeletePoint, id)?;
        self.states.remove(id);
        Ok(self.points.remove(id).is_some())
    }

    async fn get_point(&self, id: &str) -> Result<Option<PointState>> {
        self.check(StoreOp::GetPoint, id)?;
        Ok(self.states.get(id).map(|s| s.value().clone()))
    }

    async fn get_point_object(&self, id: &str) -> Result<Option<PointCommon>> {
        self.check(StoreOp::GetPoint, id)?;
        Ok(self.points.get(id).map(|p| p.value().clone()))
    }

    async fn set_point(&self, id: &str, value: Value, ack: bool) -> Result<()> {
        self.check(StoreOp::SetPoint, id)?;
        if !self.points.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let state = PointState {
            val: value,
            ack,
            ts: self.clock.now_millis(),
        };
        self.states.insert(id.to_string(), state);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_points(&self, prefix: &str) -> Result<Vec<String>> {
        self.check(StoreOp::ListPoints, prefix)?;
        let mut ids: Vec<String> = self
            .points
            .iter()
            .filter(|p| path::child_of(prefix, p.key()).is_some())
            .map(|p| p.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn add_group_to_room(&self, room: &str, group: &str) -> Result<()> {
        self.check(StoreOp::Rooms, group)?;
        let entry = self.rooms.entry(path::room_id(room)).or_default();
        let mut members = entry.write();
        if !members.iter().any(|m| m == group) {
            members.push(group.to_string());
        }
        Ok(())
    }

    async fn remove_group_from_rooms(&self, group: &str) -> Result<()> {
        self.check(StoreOp::Rooms, group)?;
        for room in self.rooms.iter() {
            room.value().write().retain(|m| m != group);
        }
        Ok(())
    }

    async fn room_members(&self, room: &str) -> Result<Vec<String>> {
        self.check(StoreOp::Rooms, room)?;
        Ok(self
            .rooms
            .get(&path::room_id(room))
            .map(|members| members.read().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::object::ValueType;
    use crate::time::FixedTimeProvider;
    use serde_json::json;

    async fn store_with_group() -> MemoryStore {
        let store = MemoryStore::with_time_provider(Arc::new(FixedTimeProvider::new(1_000)));
        store.create_device("root", Some("Wiffi")).await.unwrap();
        store
            .create_group("root.10_0_0_5", Some("Living room"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_memory_store_device_and_groups() {
        let store = store_with_group().await;
        store.create_group("root.10_0_0_6", None).await.unwrap();
        store.create_group("info", None).await.unwrap();

        let groups = store.list_groups("root").await.unwrap();
        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["root.10_0_0_5", "root.10_0_0_6"]);
        assert_eq!(groups[0].local_id(), "10_0_0_5");
        assert_eq!(store.list_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_group_requires_device() {
        let store = MemoryStore::new();
        let err = store.create_group("root.10_0_0_5", None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id == "root"));
    }

    #[tokio::test]
    async fn test_create_point_initializes_default() {
        let store = store_with_group().await;
        let common = PointCommon {
            value_type: Some(ValueType::Number),
            default: Some(json!(21.5)),
            ..Default::default()
        };
        store
            .create_point("root.10_0_0_5.temp1", common)
            .await
            .unwrap();
        store
            .create_point("root.10_0_0_5.name", PointCommon::default())
            .await
            .unwrap();

        let state = store.get_point("root.10_0_0_5.temp1").await.unwrap().unwrap();
        assert_eq!(state.val, json!(21.5));
        assert!(state.ack);
        assert_eq!(state.ts, 1_000);
        assert!(store.get_point("root.10_0_0_5.name").await.unwrap().is_none());
        assert!(store.point_exists("root.10_0_0_5.name").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_point_requires_group() {
        let store = store_with_group().await;
        let err = store
            .create_point("root.10_0_0_9.temp1", PointCommon::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_point_unknown_is_not_found() {
        let store = store_with_group().await;
        let err = store
            .set_point("root.10_0_0_5.missing", json!(1), true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.stats().write_count, 0);
    }

    #[tokio::test]
    async fn test_set_point_overwrites_value() {
        let store = store_with_group().await;
        store
            .create_point("root.10_0_0_5.Type", PointCommon::default())
            .await
            .unwrap();
        store
            .set_point("root.10_0_0_5.Type", json!("WZ"), false)
            .await
            .unwrap();

        let state = store.get_point("root.10_0_0_5.Type").await.unwrap().unwrap();
        assert_eq!(state.val, json!("WZ"));
        assert!(!state.ack);
        assert_eq!(store.stats().write_count, 1);
    }

    #[tokio::test]
    async fn test_list_points_is_prefix_scoped() {
        let store = store_with_group().await;
        store.create_group("root.10_0_0_50", None).await.unwrap();
        for id in ["root.10_0_0_5.b", "root.10_0_0_5.a", "root.10_0_0_50.c"] {
            store.create_point(id, PointCommon::default()).await.unwrap();
        }

        let ids = store.list_points("root.10_0_0_5").await.unwrap();
        assert_eq!(ids, vec!["root.10_0_0_5.a", "root.10_0_0_5.b"]);
    }

    #[tokio::test]
    async fn test_delete_group_removes_points() {
        let store = store_with_group().await;
        let common = PointCommon {
            default: Some(json!("x")),
            ..Default::default()
        };
        store
            .create_point("root.10_0_0_5.Type", common)
            .await
            .unwrap();

        assert!(store.delete_group("root.10_0_0_5").await.unwrap());
        assert!(!store.delete_group("root.10_0_0_5").await.unwrap());

        let stats = store.stats();
        assert_eq!(stats.group_count, 0);
        assert_eq!(stats.point_count, 0);
        assert_eq!(stats.state_count, 0);
        assert_eq!(stats.device_count, 1);
    }

    #[tokio::test]
    async fn test_delete_point() {
        let store = store_with_group().await;
        store
            .create_point("root.10_0_0_5.temp1", PointCommon::default())
            .await
            .unwrap();
        assert!(store.delete_point("root.10_0_0_5.temp1").await.unwrap());
        assert!(!store.delete_point("root.10_0_0_5.temp1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rooms() {
        let store = store_with_group().await;
        store
            .add_group_to_room("kitchen", "root.10_0_0_5")
            .await
            .unwrap();
        store
            .add_group_to_room("kitchen", "root.10_0_0_5")
            .await
            .unwrap();
        store
            .add_group_to_room("office", "root.10_0_0_5")
            .await
            .unwrap();
        assert_eq!(
            store.room_members("kitchen").await.unwrap(),
            vec!["root.10_0_0_5"]
        );

        store.remove_group_from_rooms("root.10_0_0_5").await.unwrap();
        assert!(store.room_members("kitchen").await.unwrap().is_empty());
        assert!(store.room_members("office").await.unwrap().is_empty());
        assert!(store.room_members("nowhere").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = store_with_group().await;
        store.fail_operation(StoreOp::ListPoints);
        let err = store.list_points("root.10_0_0_5").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.fail_id("root.10_0_0_5.bad");
        let err = store
            .create_point("root.10_0_0_5.bad", PointCommon::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.clear_failures();
        assert!(store.list_points("root.10_0_0_5").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store_with_group().await;
        store.clear();
        assert_eq!(
            store.stats(),
            MemoryStats {
                device_count: 0,
                group_count: 0,
                point_count: 0,
                state_count: 0,
                room_count: 0,
                write_count: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_downcast() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        assert!(store.as_any().downcast_ref::<MemoryStore>().is_some());
    }
}
