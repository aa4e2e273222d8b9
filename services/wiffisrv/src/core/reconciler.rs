//! Schema reconciliation
//!
//! Brings a device's dynamic points in line with the variables of its latest
//! datagram:
//!
//! 1. list the points under the device group (failure aborts the pass)
//! 2. every listed point that is not native is a removal candidate
//! 3. for each variable in order: keep an existing point, or build, extend
//!    and create a new one; a variable without identifier halts the loop
//! 4. delete the candidates the datagram no longer reports
//!
//! Native points are never removed. Store failures on single points are
//! logged and do not affect their siblings.
//!
//! Step 4 is skipped on purpose when the loop halted: the device may still
//! report any candidate after the halt, so a halted pass only creates.

use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wiffi_store::{path, ObjectStore, PointCommon, ValueType};

use crate::core::extensions::ExtensionRules;
use crate::error::Result;
use crate::ids;
use crate::protocol::{Datagram, Variable};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Point ids created in this pass
    pub created: Vec<String>,
    /// Existing point ids the datagram still reports
    pub kept: Vec<String>,
    /// Dynamic point ids deleted in this pass
    pub removed: Vec<String>,
    /// Point ids whose create or delete failed
    pub failed: Vec<String>,
    /// Processing stopped at a variable without identifier
    pub halted: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }
}

/// Reconcile the points of `group` against `datagram`
///
/// Returns an error only when the existing points cannot be listed; in that
/// case nothing was changed.
pub async fn reconcile(
    store: &Arc<dyn ObjectStore>,
    group: &str,
    datagram: &Datagram,
    native_ids: &HashSet<String>,
    rules: &ExtensionRules,
) -> Result<ReconcileReport> {
    let listed = store.list_points(group).await.map_err(|e| {
        error!("Could not list points of {}: {}", group, e);
        e
    })?;

    let mut existing: HashSet<String> = listed.iter().cloned().collect();
    let mut to_remove: BTreeSet<String> = listed
        .iter()
        .filter(|id| !native_ids.contains(path::leaf(id)))
        .cloned()
        .collect();

    let mut report = ReconcileReport::default();

    for var in &datagram.vars {
        let Some(local_id) = var.id() else {
            warn!(
                "Variable without homematic_name in datagram for {}, skipping the remaining variables",
                group
            );
            report.halted = true;
            break;
        };

        let id = ids::point_id(group, local_id);
        if existing.contains(&id) {
            to_remove.remove(&id);
            report.kept.push(id);
            continue;
        }

        let mut common = build_point(var);
        rules.apply(local_id, &mut common);

        match store.create_point(&id, common).await {
            Ok(()) => {
                debug!("Created point {}", id);
                existing.insert(id.clone());
                report.created.push(id);
            },
            Err(e) => {
                error!("Could not create point {}: {}", id, e);
                report.failed.push(id);
            },
        }
    }

    // Variables after a halt were never examined; removing now could delete
    // points the device still reports
    if report.halted {
        if !to_remove.is_empty() {
            debug!(
                "Skipping removal of {} points in {} after halt",
                to_remove.len(),
                group
            );
        }
    } else {
        for id in to_remove {
            match store.delete_point(&id).await {
                Ok(_) => {
                    debug!("Removed point {}", id);
                    report.removed.push(id);
                },
                Err(e) => {
                    error!("Could not remove point {}: {}", id, e);
                    report.failed.push(id);
                },
            }
        }
    }

    if report.changed() {
        info!(
            "Reconciled {}: {} created, {} removed",
            group,
            report.created.len(),
            report.removed.len()
        );
    }
    Ok(report)
}

/// Point metadata inferred from a reported variable
pub fn build_point(var: &Variable) -> PointCommon {
    let value_type = var.declared_type.as_deref().and_then(ValueType::from_declared);
    let default = value_type
        .filter(|t| is_truthy(&var.value) && t.matches(&var.value))
        .map(|_| var.value.clone());

    PointCommon {
        name: var.name.clone().filter(|s| !s.is_empty()),
        desc: var.desc.clone().filter(|s| !s.is_empty()),
        value_type,
        default,
        ..Default::default()
    }
}

/// Truthiness as the firmware's defaults are meant: `0`, `""`, `false` and
/// `null` carry no default
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
