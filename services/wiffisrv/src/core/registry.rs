//! Registry synchronization
//!
//! Aligns the device groups in the store with the configured device list:
//! groups of devices that are no longer configured are removed from their
//! rooms and deleted, missing groups are created together with every native
//! point.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};
use wiffi_store::ObjectStore;

use crate::core::config::{DeviceConfig, NativePointDef};
use crate::error::{Result, WiffiSrvError};
use crate::ids;

/// Outcome of a synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Group ids deleted
    pub removed: Vec<String>,
    /// Group ids created
    pub created: Vec<String>,
    /// Group or point ids that failed
    pub failed: Vec<String>,
}

/// Synchronize stored device groups with `devices`
///
/// Every device is processed even if an earlier one failed; any failure makes
/// the whole run return an error afterwards. Created points are not rolled
/// back.
pub async fn sync(
    store: &Arc<dyn ObjectStore>,
    devices: &[DeviceConfig],
    native_points: &[NativePointDef],
) -> Result<SyncReport> {
    store.create_device(ids::ROOT_DEVICE, None).await?;
    let stored = store.list_groups(ids::ROOT_DEVICE).await?;

    let configured: HashSet<&str> = devices
        .iter()
        .map(|device| device.ip.as_str())
        .filter(|ip| !ip.trim().is_empty())
        .collect();

    let mut report = SyncReport::default();
    let mut present = HashSet::new();

    for group in &stored {
        let ip = ids::id_to_ip(group.local_id());
        if configured.contains(ip.as_str()) {
            present.insert(ip);
            continue;
        }

        info!("Removing group {} of unconfigured Wiffi {}", group.id, ip);
        match remove_group(store, &group.id).await {
            Ok(()) => report.removed.push(group.id.clone()),
            Err(e) => {
                error!("Could not remove group {}: {}", group.id, e);
                report.failed.push(group.id.clone());
            },
        }
    }

    for device in devices {
        if device.ip.trim().is_empty() || present.contains(&device.ip) {
            continue;
        }
        let group = ids::group_id(&device.ip);
        info!("Creating group {} for Wiffi {}", group, device.ip);

        let failed = create_group(store, &group, device, native_points).await;
        if failed.is_empty() {
            report.created.push(group);
        } else {
            report.failed.extend(failed);
        }
        present.insert(device.ip.clone());
    }

    if report.failed.is_empty() {
        debug!(
            "Registry synchronized: {} created, {} removed",
            report.created.len(),
            report.removed.len()
        );
        Ok(report)
    } else {
        Err(WiffiSrvError::storage(format!(
            "Registry synchronization failed for {}",
            report.failed.join(", ")
        )))
    }
}

async fn remove_group(store: &Arc<dyn ObjectStore>, group: &str) -> Result<()> {
    store.remove_group_from_rooms(group).await?;
    store.delete_group(group).await?;
    Ok(())
}

/// Create a device group and its native points, returning the failed ids
async fn create_group(
    store: &Arc<dyn ObjectStore>,
    group: &str,
    device: &DeviceConfig,
    native_points: &[NativePointDef],
) -> Vec<String> {
    let mut failed = Vec::new();

    if let Some(room) = device.room.as_deref().filter(|r| !r.is_empty()) {
        if let Err(e) = store.add_group_to_room(room, group).await {
            error!("Could not add {} to room {}: {}", group, room, e);
            failed.push(group.to_string());
        }
    }

    let name = (!device.name.is_empty()).then_some(device.name.as_str());
    if let Err(e) = store.create_group(group, name).await {
        error!("Could not create group {}: {}", group, e);
        failed.push(group.to_string());
        return failed;
    }

    let creations = native_points.iter().map(|point| {
        let id = ids::point_id(group, &point.id);
        let common = point.common.clone();
        async move {
            let result = store.create_point(&id, common).await;
            (id, result)
        }
    });

    for (id, result) in join_all(creations).await {
        if let Err(e) = result {
            error!("Could not create native point {}: {}", id, e);
            failed.push(id);
        }
    }

    failed
}
