/*!
Stub MQTT pour les tests d'ingestion, sans broker

- `try_publish` garde une trace de chaque publication sortante (requêtes de propriété)
- `simulate_incoming` injecte un message entrant dans le receiver, à la place de l'event loop
*/

use anyhow::{bail, Result};
use rumqttc::QoS;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Remplace `rumqttc::AsyncClient` côté tests ; les clones partagent le même état
#[derive(Clone, Default)]
pub struct MockMqttClient {
    outbox: Arc<Mutex<Vec<MockMessage>>>,
    inbox: Arc<Mutex<Option<UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Un seul receiver actif : un nouvel appel remplace le précédent
    pub fn setup_receiver(&self) -> UnboundedReceiver<MockMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inbox.lock().unwrap() = Some(tx);
        rx
    }

    /// Même signature que `AsyncClient::try_publish`
    pub fn try_publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let msg = MockMessage { topic: topic.into(), payload: payload.into(), qos, retain };
        log::debug!("[mock] out {} ({} bytes)", msg.topic, msg.payload.len());
        self.outbox.lock().unwrap().push(msg);
        Ok(())
    }

    pub fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let msg = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };
        let inbox = self.inbox.lock().unwrap();
        let Some(tx) = inbox.as_ref() else {
            bail!("no receiver set up for incoming {}", msg.topic);
        };
        log::debug!("[mock] in {}", msg.topic);
        tx.send(msg).map_err(|e| anyhow::anyhow!("receiver dropped: {}", e.0.topic))
    }

    pub fn published(&self) -> Vec<MockMessage> {
        self.outbox.lock().unwrap().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<MockMessage> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

/// Payloads JSON tels que publiés par inventory-system
pub struct InventoryMessageBuilder;

impl InventoryMessageBuilder {
    pub fn cpu_usage(host_id: &str, cpu_usage: f64) -> Value {
        serde_json::json!({ "hostId": host_id, "cpuUsage": cpu_usage })
    }

    pub fn memory_status(host_id: &str, memory_used: i64, memory_max: i64) -> Value {
        serde_json::json!({ "hostId": host_id, "memoryUsed": memory_used, "memoryMax": memory_max })
    }

    pub fn property_message(host_id: &str, key: &str, value: &str) -> Value {
        serde_json::json!({ "hostId": host_id, "key": key, "value": value })
    }
}
