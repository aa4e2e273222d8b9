//! Configuration types for wiffisrv

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use wiffi_store::{PointCommon, ValueType};

use crate::protocol::frame::DEFAULT_MAX_BUFFER_SIZE;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8181;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Provisioned Wiffi modules
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Points created for every device regardless of firmware
    #[serde(default = "default_native_points")]
    pub native_points: Vec<NativePointDef>,

    /// Metadata overlays for dynamic points, in priority order
    #[serde(default = "default_extensions")]
    pub extensions: Vec<ExtensionRuleConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            server: ServerConfig::default(),
            devices: Vec::new(),
            native_points: default_native_points(),
            extensions: default_extensions(),
        }
    }
}

/// Service metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            description: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log root directory, `WIFFI_LOG_DIR` takes precedence
    #[serde(default)]
    pub dir: Option<String>,

    /// Write received datagrams to a separate wire log file
    #[serde(default)]
    pub enable_wire_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            enable_wire_log: false,
        }
    }
}

/// TCP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Receive buffer limit per connection in bytes
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_buffer_size: default_max_buffer_size(),
        }
    }
}

/// One provisioned Wiffi module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Address the module reports in its `*_ip` variable
    pub ip: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Native point definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativePointDef {
    pub id: String,

    #[serde(flatten)]
    pub common: PointCommon,
}

/// Extension rule: case-insensitive expression plus attribute overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRuleConfig {
    pub expression: String,

    #[serde(default, alias = "extensions")]
    pub attributes: Map<String, Value>,
}

fn default_service_name() -> String {
    "wiffisrv".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_buffer_size() -> usize {
    DEFAULT_MAX_BUFFER_SIZE
}

/// Built-in native points: the module type of the last reconciled firmware
pub fn default_native_points() -> Vec<NativePointDef> {
    vec![NativePointDef {
        id: crate::ids::TYPE_POINT.to_string(),
        common: PointCommon {
            name: Some("Type".to_string()),
            desc: Some("Module type reported by the Wiffi".to_string()),
            value_type: Some(ValueType::String),
            role: "info.type".to_string(),
            read: true,
            write: false,
            default: Some(json!("")),
            extra: Map::new(),
        },
    }]
}

fn rule(expression: &str, attributes: Value) -> ExtensionRuleConfig {
    ExtensionRuleConfig {
        expression: expression.to_string(),
        attributes: match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    }
}

/// Built-in extension rules
pub fn default_extensions() -> Vec<ExtensionRuleConfig> {
    vec![
        rule("_ip", json!({"role": "info.ip"})),
        rule("temp", json!({"role": "value.temperature", "unit": "°C"})),
        rule("feuchte|humidity", json!({"role": "value.humidity", "unit": "%"})),
        rule("luftdruck|pressure", json!({"role": "value.pressure", "unit": "hPa"})),
        rule("lux|helligkeit", json!({"role": "value.brightness", "unit": "lx"})),
        rule("co2", json!({"role": "value.co2", "unit": "ppm"})),
        rule("rssi", json!({"role": "value.rssi", "unit": "dBm"})),
        rule("bewegung|motion", json!({"role": "sensor.motion"})),
    ]
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.server.max_buffer_size, 100_000);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8181");
        assert!(config.devices.is_empty());
        assert_eq!(config.native_points.len(), 1);
        assert_eq!(config.native_points[0].id, "Type");
        assert_eq!(config.native_points[0].common.default, Some(json!("")));
        assert_eq!(config.extensions[0].expression, "_ip");
    }

    #[test]
    fn test_native_point_flattened() {
        let def: NativePointDef = serde_json::from_value(json!({
            "id": "rssi",
            "type": "number",
            "role": "value.rssi",
            "unit": "dBm"
        }))
        .unwrap();
        assert_eq!(def.id, "rssi");
        assert_eq!(def.common.value_type, Some(ValueType::Number));
        assert_eq!(def.common.extra.get("unit"), Some(&json!("dBm")));
        assert!(!def.common.extra.contains_key("id"));
    }

    #[test]
    fn test_extension_alias() {
        let rule: ExtensionRuleConfig = serde_yaml::from_str(
            "expression: temp\nextensions:\n  unit: \"°C\"\n",
        )
        .unwrap();
        assert_eq!(rule.attributes.get("unit"), Some(&json!("°C")));
    }

    #[test]
    fn test_device_defaults() {
        let device: DeviceConfig = serde_yaml::from_str("ip: 10.0.0.5\n").unwrap();
        assert_eq!(device.ip, "10.0.0.5");
        assert_eq!(device.name, "");
        assert_eq!(device.room, None);
    }
}
