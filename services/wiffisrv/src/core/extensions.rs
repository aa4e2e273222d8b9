//! Extension rules: metadata overlays for dynamic points
//!
//! Expressions are compiled once, case-insensitive, and evaluated in
//! configured order. Only the first matching rule is applied.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use tracing::warn;
use wiffi_store::PointCommon;

use crate::core::config::ExtensionRuleConfig;
use crate::error::{Result, WiffiSrvError};

/// A compiled extension rule
#[derive(Debug, Clone)]
pub struct ExtensionRule {
    pattern: Regex,
    attributes: Map<String, Value>,
}

impl ExtensionRule {
    pub fn expression(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn is_match(&self, id: &str) -> bool {
        self.pattern.is_match(id)
    }
}

/// Ordered set of compiled rules
#[derive(Debug, Clone, Default)]
pub struct ExtensionRules {
    rules: Vec<ExtensionRule>,
}

impl ExtensionRules {
    /// Compile rules in configured order; any invalid expression fails the set
    pub fn compile(configs: &[ExtensionRuleConfig]) -> Result<Self> {
        let rules = configs
            .iter()
            .map(|config| {
                let pattern = RegexBuilder::new(&config.expression)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        WiffiSrvError::validation(format!(
                            "Invalid extension expression '{}': {}",
                            config.expression, e
                        ))
                    })?;
                Ok(ExtensionRule {
                    pattern,
                    attributes: config.attributes.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose expression matches `id`
    pub fn first_match(&self, id: &str) -> Option<&ExtensionRule> {
        self.rules.iter().find(|rule| rule.is_match(id))
    }

    /// Overlay the first matching rule onto `common`
    ///
    /// Returns whether a rule was applied. Attributes that do not fit the
    /// point model are logged and the point keeps its inferred metadata.
    pub fn apply(&self, id: &str, common: &mut PointCommon) -> bool {
        let Some(rule) = self.first_match(id) else {
            return false;
        };
        let mut extended = common.clone();
        match extended.overlay(&rule.attributes) {
            Ok(()) => {
                *common = extended;
                true
            },
            Err(e) => {
                warn!(
                    "Extension '{}' not applicable to {}: {}",
                    rule.expression(),
                    id,
                    e
                );
                false
            },
        }
    }
}
