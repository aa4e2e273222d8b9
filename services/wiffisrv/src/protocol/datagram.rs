//! Datagram model
//!
//! ```json
//! {"modultyp":"WZ","vars":[{"homematic_name":"Device_ip","name":"IP","desc":"...","type":"string","value":"10.0.0.5"}]}
//! ```
//!
//! Parsing is lenient: firmware versions differ in which fields they send, so
//! every field is optional here and the pipeline decides what is mandatory.

use serde_json::{Map, Value};

/// Case-insensitive marker in the name of the variable carrying the address
const ADDRESS_MARKER: &str = "_ip";

/// One variable reported by a Wiffi
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variable {
    /// Stable identifier, becomes the point id
    pub homematic_name: Option<String>,
    pub name: Option<String>,
    pub desc: Option<String>,
    /// Declared type name (`string`, `number`, `boolean`, ...)
    pub declared_type: Option<String>,
    pub value: Value,
}

impl Variable {
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            homematic_name: string_field(obj, "homematic_name"),
            name: string_field(obj, "name"),
            desc: string_field(obj, "desc"),
            declared_type: string_field(obj, "type"),
            value: obj.get("value").cloned().unwrap_or(Value::Null),
        }
    }

    /// The identifier, if present and non-empty
    pub fn id(&self) -> Option<&str> {
        self.homematic_name.as_deref().filter(|s| !s.is_empty())
    }

    fn is_address(&self) -> bool {
        self.id()
            .is_some_and(|id| id.to_lowercase().contains(ADDRESS_MARKER))
    }
}

/// One parsed datagram
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datagram {
    /// Module type / firmware tag
    pub modultyp: Option<String>,
    pub vars: Vec<Variable>,
}

impl Datagram {
    /// Build a datagram from an extracted JSON object
    ///
    /// A missing or non-array `vars` yields an empty variable list.
    pub fn from_object(payload: &Map<String, Value>) -> Self {
        let vars = payload
            .get("vars")
            .and_then(Value::as_array)
            .map(|vars| vars.iter().map(Variable::from_value).collect())
            .unwrap_or_default();

        Self {
            modultyp: string_field(payload, "modultyp"),
            vars,
        }
    }

    /// Address of the sender: the value of the first variable whose
    /// identifier contains `_ip` (case-insensitive)
    pub fn find_address(&self) -> Option<&str> {
        self.vars
            .iter()
            .find(|var| var.is_address())
            .and_then(|var| var.value.as_str())
            .filter(|ip| !ip.is_empty())
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    fn datagram(value: Value) -> Datagram {
        Datagram::from_object(value.as_object().unwrap())
    }

    #[test]
    fn test_parse_full_datagram() {
        let dg = datagram(json!({
            "modultyp": "WZ",
            "vars": [
                {"homematic_name": "Device_ip", "value": "10.0.0.5"},
                {"homematic_name": "temp1", "name": "Temp", "desc": "Room", "type": "number", "value": 21.5}
            ]
        }));
        assert_eq!(dg.modultyp.as_deref(), Some("WZ"));
        assert_eq!(dg.vars.len(), 2);
        let temp = &dg.vars[1];
        assert_eq!(temp.id(), Some("temp1"));
        assert_eq!(temp.name.as_deref(), Some("Temp"));
        assert_eq!(temp.declared_type.as_deref(), Some("number"));
        assert_eq!(temp.value, json!(21.5));
    }

    #[test]
    fn test_missing_vars() {
        let dg = datagram(json!({"modultyp": "WZ"}));
        assert!(dg.vars.is_empty());
        assert_eq!(dg.find_address(), None);

        let dg = datagram(json!({"modultyp": "WZ", "vars": "nope"}));
        assert!(dg.vars.is_empty());
    }

    #[test]
    fn test_non_object_variable() {
        let dg = datagram(json!({"vars": [42, {"homematic_name": "a", "value": 1}]}));
        assert_eq!(dg.vars[0], Variable::default());
        assert_eq!(dg.vars[0].id(), None);
        assert_eq!(dg.vars[1].id(), Some("a"));
    }

    #[test]
    fn test_find_address_case_insensitive() {
        let dg = datagram(json!({"vars": [
            {"homematic_name": "temp", "value": 20},
            {"homematic_name": "WEATHER_IP", "value": "192.168.1.20"},
            {"homematic_name": "other_ip", "value": "10.0.0.1"}
        ]}));
        assert_eq!(dg.find_address(), Some("192.168.1.20"));
    }

    #[test]
    fn test_find_address_first_match_only() {
        let dg = datagram(json!({"vars": [
            {"homematic_name": "Device_ip", "value": 5},
            {"homematic_name": "other_ip", "value": "10.0.0.1"}
        ]}));
        assert_eq!(dg.find_address(), None);
    }

    #[test]
    fn test_empty_identifier() {
        let var = Variable::from_value(&json!({"homematic_name": "", "value": 1}));
        assert_eq!(var.id(), None);
    }
}
