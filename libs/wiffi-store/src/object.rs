//! Object model shared by all store backends
//!
//! Objects form a three level tree: a device (`root`), point groups below it
//! (one per Wiffi, e.g. `root.10_0_0_5`) and data points inside each group
//! (e.g. `root.10_0_0_5.temp1`). Points carry metadata ([`PointCommon`]) and,
//! separately, a current value ([`PointState`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value type of a data point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

impl ValueType {
    /// Map a declared type name to a value type
    ///
    /// Only the exact names `string`, `number` and `boolean` are recognized.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Check whether a JSON value has this runtime type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_role() -> String {
    "state".to_string()
}

fn default_true() -> bool {
    true
}

/// Data point metadata
///
/// Known attributes are typed fields; anything else (unit, min, max, states,
/// ...) lives in `extra` and round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCommon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    #[serde(default = "default_role")]
    pub role: String,

    #[serde(default = "default_true")]
    pub read: bool,

    #[serde(default)]
    pub write: bool,

    /// Initial value written when the point is created
    #[serde(rename = "def", default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PointCommon {
    fn default() -> Self {
        Self {
            name: None,
            desc: None,
            value_type: None,
            role: default_role(),
            read: true,
            write: false,
            default: None,
            extra: Map::new(),
        }
    }
}

impl PointCommon {
    /// Merge attribute overrides into this metadata
    ///
    /// Every key in `attrs` replaces the attribute of the same name, typed
    /// fields included (`role`, `type`, `def`, ...).
    pub fn overlay(&mut self, attrs: &Map<String, Value>) -> Result<(), serde_json::Error> {
        if attrs.is_empty() {
            return Ok(());
        }
        let mut merged = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in attrs {
            merged.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}

/// Device object (top level of the tree)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceObject {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Point group object, one per Wiffi module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupObject {
    /// Full id including the parent device, e.g. `root.10_0_0_5`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl GroupObject {
    /// Group id without the parent device prefix
    pub fn local_id(&self) -> &str {
        crate::path::leaf(&self.id)
    }
}

/// Current value of a data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointState {
    pub val: Value,
    /// true for a confirmed status update, false for a pending command
    pub ack: bool,
    /// Write time in milliseconds since the Unix epoch
    pub ts: i64,
}
