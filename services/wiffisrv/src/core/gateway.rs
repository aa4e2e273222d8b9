//! Gateway: the datagram pipeline and its reloadable settings
//!
//! `handle_frame` runs resolve -> (reconcile) -> publish for one extracted
//! frame. Settings (devices, native points, extension rules) sit behind an
//! `Arc` swapped on reload, so in-flight datagrams finish with the settings
//! they started with.

use errors::GatewayErrorTrait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};
use wiffi_store::ObjectStore;

use crate::core::config::{AppConfig, DeviceConfig, NativePointDef};
use crate::core::extensions::ExtensionRules;
use crate::core::layout;
use crate::core::publisher::{self, PublishReport};
use crate::core::reconciler::{self, ReconcileReport};
use crate::core::registry::{self, SyncReport};
use crate::core::resolver;
use crate::error::Result;
use crate::ids;
use crate::protocol::Datagram;

/// Settings derived from the configuration
#[derive(Debug)]
pub struct GatewaySettings {
    pub devices: Vec<DeviceConfig>,
    pub native_points: Vec<NativePointDef>,
    pub native_ids: HashSet<String>,
    pub rules: ExtensionRules,
}

impl GatewaySettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let rules = ExtensionRules::compile(&config.extensions)?;
        Ok(Self {
            devices: config.devices.clone(),
            native_points: config.native_points.clone(),
            native_ids: config.native_points.iter().map(|p| p.id.clone()).collect(),
            rules,
        })
    }
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub group: String,
    /// Present when the module type changed and a reconciliation ran
    pub reconcile: Option<ReconcileReport>,
    pub publish: PublishReport,
}

/// Wiffi gateway
pub struct Gateway {
    store: Arc<dyn ObjectStore>,
    settings: RwLock<Arc<GatewaySettings>>,
}

impl Gateway {
    pub fn new(store: Arc<dyn ObjectStore>, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            store,
            settings: RwLock::new(Arc::new(GatewaySettings::from_config(config)?)),
        })
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn settings(&self) -> Arc<GatewaySettings> {
        self.settings.read().clone()
    }

    /// Prepare the store layout and synchronize the device registry
    pub async fn start(&self) -> Result<SyncReport> {
        layout::ensure_layout(&self.store).await?;
        self.sync_registry().await
    }

    pub async fn sync_registry(&self) -> Result<SyncReport> {
        let settings = self.settings();
        let report = registry::sync(&self.store, &settings.devices, &settings.native_points).await?;
        info!(
            "Registry synchronized: {} devices, {} created, {} removed",
            settings.devices.len(),
            report.created.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Replace the settings and synchronize the registry again
    ///
    /// Invalid extension expressions leave the current settings in place.
    pub async fn reload(&self, config: &AppConfig) -> Result<SyncReport> {
        let settings = Arc::new(GatewaySettings::from_config(config)?);
        *self.settings.write() = settings;
        info!("Gateway settings reloaded");
        self.sync_registry().await
    }

    /// Process one extracted frame
    ///
    /// Errors mean the datagram was dropped; they are logged here at the
    /// level the error asks for.
    pub async fn handle_frame(&self, payload: &Map<String, Value>) -> Result<FrameOutcome> {
        let result = self.process(payload).await;
        if let Err(e) = &result {
            if e.log_level() == Level::WARN {
                warn!("{}", e);
            } else {
                error!("{}", e);
            }
        }
        result
    }

    async fn process(&self, payload: &Map<String, Value>) -> Result<FrameOutcome> {
        let settings = self.settings();
        let datagram = Datagram::from_object(payload);
        let resolved = resolver::resolve(&self.store, &settings.devices, &datagram).await?;

        let reconcile = if resolved.needs_reconcile {
            debug!(
                "Module type of {} is {}, reconciling",
                resolved.device.ip, resolved.module_type
            );
            self.reconcile(&settings, &resolved.group, &resolved.module_type, &datagram)
                .await
        } else {
            None
        };

        let publish = publisher::publish(&self.store, &resolved.group, &datagram).await;
        Ok(FrameOutcome {
            group: resolved.group,
            reconcile,
            publish,
        })
    }

    /// Reconcile and record the module type; listing failures are logged and
    /// publishing continues
    async fn reconcile(
        &self,
        settings: &GatewaySettings,
        group: &str,
        module_type: &str,
        datagram: &Datagram,
    ) -> Option<ReconcileReport> {
        let report = match reconciler::reconcile(
            &self.store,
            group,
            datagram,
            &settings.native_ids,
            &settings.rules,
        )
        .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("Reconciliation of {} aborted: {}", group, e);
                return None;
            },
        };

        if !report.halted {
            let type_id = ids::point_id(group, ids::TYPE_POINT);
            if let Err(e) = self
                .store
                .set_point(&type_id, Value::String(module_type.to_string()), true)
                .await
            {
                warn!("Could not record module type for {}: {}", group, e);
            }
        }
        Some(report)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("settings", &self.settings.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::config::ExtensionRuleConfig;
    use serde_json::json;
    use tracing_test::traced_test;
    use wiffi_store::{MemoryStore, StoreOp};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.devices.push(DeviceConfig {
            ip: "10.0.0.5".to_string(),
            name: "Living".to_string(),
            room: None,
        });
        config
    }

    async fn started(config: &AppConfig) -> (Arc<MemoryStore>, Gateway) {
        let memory = Arc::new(MemoryStore::new());
        let gateway = Gateway::new(memory.clone(), config).unwrap();
        gateway.start().await.unwrap();
        (memory, gateway)
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn wz(temp: f64) -> Map<String, Value> {
        payload(json!({"modultyp": "WZ", "vars": [
            {"homematic_name": "Device_ip", "type": "string", "value": "10.0.0.5"},
            {"homematic_name": "temp1", "type": "number", "value": temp}
        ]}))
    }

    #[tokio::test]
    async fn test_first_contact_reconciles_and_publishes() {
        let (_memory, gateway) = started(&config()).await;
        let outcome = gateway.handle_frame(&wz(21.5)).await.unwrap();

        let report = outcome.reconcile.unwrap();
        assert_eq!(
            report.created,
            vec!["root.10_0_0_5.Device_ip", "root.10_0_0_5.temp1"]
        );
        assert_eq!(outcome.publish.written, 2);

        let store = gateway.store();
        let temp = store.get_point("root.10_0_0_5.temp1").await.unwrap().unwrap();
        assert_eq!(temp.val, json!(21.5));
        assert!(temp.ack);
        let ty = store.get_point("root.10_0_0_5.Type").await.unwrap().unwrap();
        assert_eq!(ty.val, json!("WZ"));
    }

    #[tokio::test]
    async fn test_same_type_skips_reconciliation() {
        let (_memory, gateway) = started(&config()).await;
        gateway.handle_frame(&wz(21.5)).await.unwrap();

        let outcome = gateway.handle_frame(&wz(22.0)).await.unwrap();
        assert!(outcome.reconcile.is_none());
        let temp = gateway
            .store()
            .get_point("root.10_0_0_5.temp1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(temp.val, json!(22.0));
    }

    #[tokio::test]
    async fn test_firmware_change_replaces_dynamic_points() {
        let (_memory, gateway) = started(&config()).await;
        gateway.handle_frame(&wz(21.5)).await.unwrap();

        let weather = payload(json!({"modultyp": "weatherman", "vars": [
            {"homematic_name": "Device_ip", "value": "10.0.0.5"},
            {"homematic_name": "wind", "type": "number", "value": 3.2}
        ]}));
        let report = gateway.handle_frame(&weather).await.unwrap().reconcile.unwrap();
        assert_eq!(report.created, vec!["root.10_0_0_5.wind"]);
        assert_eq!(report.removed, vec!["root.10_0_0_5.temp1"]);
        assert!(gateway
            .store()
            .point_exists("root.10_0_0_5.Type")
            .await
            .unwrap());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unknown_device_dropped() {
        let (memory, gateway) = started(&config()).await;
        let writes = memory.stats().write_count;

        let dg = payload(json!({"modultyp": "WZ", "vars": [
            {"homematic_name": "Device_ip", "value": "192.168.1.9"},
            {"homematic_name": "temp1", "value": 1}
        ]}));
        assert!(gateway.handle_frame(&dg).await.is_err());
        assert_eq!(memory.stats().write_count, writes);
        assert!(logs_contain("Unregistered Wiffi with ip 192.168.1.9"));
    }

    #[tokio::test]
    async fn test_halt_keeps_type_unrecorded() {
        let (_memory, gateway) = started(&config()).await;
        let dg = payload(json!({"modultyp": "WZ", "vars": [
            {"homematic_name": "Device_ip", "value": "10.0.0.5"},
            {"value": 1},
            {"homematic_name": "temp1", "value": 2}
        ]}));
        let outcome = gateway.handle_frame(&dg).await.unwrap();
        assert!(outcome.reconcile.unwrap().halted);

        let ty = gateway
            .store()
            .get_point("root.10_0_0_5.Type")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ty.val, json!(""));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_listing_failure_still_publishes() {
        let (memory, gateway) = started(&config()).await;
        gateway.handle_frame(&wz(21.5)).await.unwrap();
        gateway
            .store()
            .set_point("root.10_0_0_5.Type", json!("OLD"), true)
            .await
            .unwrap();

        memory.fail_operation(StoreOp::ListPoints);
        let outcome = gateway.handle_frame(&wz(23.0)).await.unwrap();
        assert!(outcome.reconcile.is_none());
        assert_eq!(outcome.publish.written, 2);
        assert!(logs_contain("Reconciliation of root.10_0_0_5 aborted"));

        memory.clear_failures();
        let ty = gateway
            .store()
            .get_point("root.10_0_0_5.Type")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ty.val, json!("OLD"));
    }

    #[tokio::test]
    async fn test_reload_adds_and_removes_devices() {
        let (_memory, gateway) = started(&config()).await;

        let mut next = AppConfig::default();
        next.devices.push(DeviceConfig {
            ip: "10.0.0.6".to_string(),
            name: String::new(),
            room: Some("kitchen".to_string()),
        });
        let report = gateway.reload(&next).await.unwrap();
        assert_eq!(report.created, vec!["root.10_0_0_6"]);
        assert_eq!(report.removed, vec!["root.10_0_0_5"]);
        assert_eq!(gateway.settings().devices.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_rejects_invalid_rules() {
        let (_memory, gateway) = started(&config()).await;
        let mut next = config();
        next.extensions = vec![ExtensionRuleConfig {
            expression: "[".to_string(),
            attributes: Map::new(),
        }];
        assert!(gateway.reload(&next).await.is_err());
        assert_eq!(gateway.settings().rules.len(), AppConfig::default().extensions.len());
    }
}
