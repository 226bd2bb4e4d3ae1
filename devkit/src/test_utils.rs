/*!
Harness de test pour le kernel inventory : stub MQTT + topics par défaut
*/

use crate::mqtt_stub::{InventoryMessageBuilder, MockMqttClient};
use anyhow::Result;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Mêmes valeurs par défaut que `TopicsConf` côté kernel
#[derive(Debug, Clone)]
pub struct InventoryTopics {
    pub cpu: String,
    pub memory: String,
    pub property: String,
    pub property_request: String,
}

impl Default for InventoryTopics {
    fn default() -> Self {
        Self {
            cpu: "inventory/systems/cpu-status@v1".into(),
            memory: "inventory/systems/memory-status@v1".into(),
            property: "inventory/systems/property-message@v1".into(),
            property_request: "inventory/systems/property-name@v1".into(),
        }
    }
}

pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
    pub topics: InventoryTopics,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::builder().is_test(true).try_init().ok();
        Self { mqtt_client: MockMqttClient::new(), topics: InventoryTopics::default() }
    }

    fn send_json(&self, topic: &str, value: &Value) -> Result<()> {
        self.mqtt_client.simulate_incoming(topic, serde_json::to_vec(value)?)
    }

    pub fn send_cpu(&self, host_id: &str, cpu_usage: f64) -> Result<()> {
        self.send_json(&self.topics.cpu, &InventoryMessageBuilder::cpu_usage(host_id, cpu_usage))
    }

    pub fn send_memory(&self, host_id: &str, used: i64, max: i64) -> Result<()> {
        self.send_json(&self.topics.memory, &InventoryMessageBuilder::memory_status(host_id, used, max))
    }

    pub fn send_property(&self, host_id: &str, key: &str, value: &str) -> Result<()> {
        self.send_json(&self.topics.property, &InventoryMessageBuilder::property_message(host_id, key, value))
    }

    /// Payload brut, pour les messages invalides
    pub fn send_raw(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.mqtt_client.simulate_incoming(topic, payload)
    }

    /// Dernier payload publié sur `topic`, ou None après `timeout_ms`
    pub async fn wait_for_message(&self, topic: &str, timeout_ms: u64) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(msg) = self.mqtt_client.published_on(topic).pop() {
                return Ok(Some(msg.payload));
            }
            if Instant::now() >= deadline {
                log::warn!("nothing published on {topic} after {timeout_ms}ms");
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn assert_message_sent(&self, topic: &str, expected: &Value) -> Result<()> {
        for msg in self.mqtt_client.published_on(topic) {
            if serde_json::from_slice::<Value>(&msg.payload)? == *expected {
                return Ok(());
            }
        }
        anyhow::bail!("expected message not found on {topic}");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
