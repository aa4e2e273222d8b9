//! Fixed store layout: the `root` device and the connection indicator

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use wiffi_store::{ObjectStore, PointCommon, ValueType};

use crate::error::Result;
use crate::ids;

/// Group holding adapter-level information
pub const INFO_GROUP: &str = "info";

/// Boolean point, true while the listener is up
pub const CONNECTION_POINT: &str = "info.connection";

/// Create the objects every installation needs
///
/// Safe to call on every start; existing objects are kept.
pub async fn ensure_layout(store: &Arc<dyn ObjectStore>) -> Result<()> {
    store.create_device(ids::ROOT_DEVICE, None).await?;
    store.create_group(INFO_GROUP, Some("Information")).await?;

    if !store.point_exists(CONNECTION_POINT).await? {
        let common = PointCommon {
            name: Some("Device or service connected".to_string()),
            value_type: Some(ValueType::Boolean),
            role: "indicator.connected".to_string(),
            read: true,
            write: false,
            default: Some(json!(false)),
            ..Default::default()
        };
        store.create_point(CONNECTION_POINT, common).await?;
        debug!("Created {}", CONNECTION_POINT);
    }
    Ok(())
}

/// Update the connection indicator; failures are only logged
pub async fn set_connection(store: &Arc<dyn ObjectStore>, connected: bool) {
    if let Err(e) = store
        .set_point(CONNECTION_POINT, Value::Bool(connected), true)
        .await
    {
        warn!("Could not update {}: {}", CONNECTION_POINT, e);
    }
}
