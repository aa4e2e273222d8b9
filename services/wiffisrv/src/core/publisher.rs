//! Value publishing: write every reported variable into its point

use std::sync::Arc;
use tracing::{debug, error};
use wiffi_store::ObjectStore;

use crate::ids;
use crate::protocol::Datagram;

/// Outcome of publishing one datagram
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub written: usize,
    /// Variables without identifier
    pub skipped: usize,
    /// Point ids whose write failed
    pub failed: Vec<String>,
}

/// Write each variable's value to `<group>.<homematic_name>` with ack = true
///
/// A failed write is logged and does not stop the remaining ones.
pub async fn publish(
    store: &Arc<dyn ObjectStore>,
    group: &str,
    datagram: &Datagram,
) -> PublishReport {
    let mut report = PublishReport::default();

    for var in &datagram.vars {
        let Some(local_id) = var.id() else {
            debug!("Skipping variable without homematic_name for {}", group);
            report.skipped += 1;
            continue;
        };

        let id = ids::point_id(group, local_id);
        match store.set_point(&id, var.value.clone(), true).await {
            Ok(()) => report.written += 1,
            Err(e) => {
                error!("Could not write {}: {}", id, e);
                report.failed.push(id);
            },
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tracing_test::traced_test;
    use wiffi_store::{MemoryStore, PointCommon};

    const GROUP: &str = "root.10_0_0_5";

    async fn setup(points: &[&str]) -> (Arc<MemoryStore>, Arc<dyn ObjectStore>) {
        let memory = Arc::new(MemoryStore::new());
        memory.create_device("root", None).await.unwrap();
        memory.create_group(GROUP, None).await.unwrap();
        for point in points {
            memory
                .create_point(&format!("{GROUP}.{point}"), PointCommon::default())
                .await
                .unwrap();
        }
        let store: Arc<dyn ObjectStore> = memory.clone();
        (memory, store)
    }

    fn datagram(value: Value) -> Datagram {
        Datagram::from_object(value.as_object().unwrap())
    }

    #[tokio::test]
    async fn test_publish_writes_ack_values() {
        let (memory, store) = setup(&["Device_ip", "temp1"]).await;
        let dg = datagram(json!({"vars": [
            {"homematic_name": "Device_ip", "value": "10.0.0.5"},
            {"homematic_name": "temp1", "value": 21.5}
        ]}));

        let report = publish(&store, GROUP, &dg).await;
        assert_eq!(report.written, 2);
        assert!(report.failed.is_empty());

        let state = store.get_point("root.10_0_0_5.temp1").await.unwrap().unwrap();
        assert_eq!(state.val, json!(21.5));
        assert!(state.ack);
        assert_eq!(memory.stats().write_count, 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_write_does_not_block_others() {
        let (_memory, store) = setup(&["b"]).await;
        let dg = datagram(json!({"vars": [
            {"homematic_name": "missing", "value": 1},
            {"value": 2},
            {"homematic_name": "b", "value": "nan"}
        ]}));

        let report = publish(&store, GROUP, &dg).await;
        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, vec!["root.10_0_0_5.missing"]);
        assert_eq!(
            store.get_point("root.10_0_0_5.b").await.unwrap().unwrap().val,
            json!("nan")
        );
        assert!(logs_contain("Could not write root.10_0_0_5.missing"));
    }
}
