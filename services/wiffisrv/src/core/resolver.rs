//! Device resolution: who sent a datagram and does its schema need a pass

use std::sync::Arc;
use wiffi_store::ObjectStore;

use crate::core::config::DeviceConfig;
use crate::error::{Result, WiffiSrvError};
use crate::ids;
use crate::protocol::Datagram;

/// A datagram's sender and what to do with it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub device: DeviceConfig,
    /// Group id of the device, e.g. `root.10_0_0_5`
    pub group: String,
    /// Module type reported in the datagram
    pub module_type: String,
    /// Stored type differs from the reported one
    pub needs_reconcile: bool,
}

/// Identify the sender and compare its module type with the stored one
///
/// No store writes happen here; every error means the datagram is dropped.
pub async fn resolve(
    store: &Arc<dyn ObjectStore>,
    devices: &[DeviceConfig],
    datagram: &Datagram,
) -> Result<Resolved> {
    let ip = datagram
        .find_address()
        .ok_or_else(|| WiffiSrvError::datagram("could not find an ip"))?;

    let device = devices
        .iter()
        .find(|device| device.ip == ip)
        .ok_or_else(|| WiffiSrvError::UnknownDevice(ip.to_string()))?;

    let group = ids::group_id(&device.ip);
    let type_id = ids::point_id(&group, ids::TYPE_POINT);

    let stored = store
        .get_point(&type_id)
        .await?
        .ok_or_else(|| WiffiSrvError::point(format!("could not read {}", type_id)))?;

    let module_type = datagram
        .modultyp
        .clone()
        .ok_or_else(|| WiffiSrvError::datagram(format!("no modultyp in datagram from {}", ip)))?;

    let needs_reconcile = match stored.val.as_str() {
        Some(stored) => stored.to_uppercase() != module_type.to_uppercase(),
        None => true,
    };

    Ok(Resolved {
        device: device.clone(),
        group,
        module_type,
        needs_reconcile,
    })
}
