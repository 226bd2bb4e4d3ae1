use crate::config::KernelConfig;
use crate::health::HealthTracker;
use crate::ingest::{IngestOutcome, Ingestor};
use anyhow::Context;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub fn create_mqtt_client(cfg: &KernelConfig) -> anyhow::Result<(AsyncClient, EventLoop)> {
    if cfg.mqtt.host.is_empty() {
        anyhow::bail!("mqtt.host is empty");
    }
    if cfg.mqtt.client_id.trim().is_empty() {
        anyhow::bail!("mqtt.client_id is empty");
    }
    let mut opts = MqttOptions::new(cfg.mqtt.client_id.clone(), cfg.mqtt.host.clone(), cfg.mqtt.port);
    opts.set_keep_alive(Duration::from_secs(cfg.mqtt.keep_alive_secs.max(5)));
    Ok(AsyncClient::new(opts, 10))
}

/// Boucle MQTT : (ré)abonne les trois flux à chaque ConnAck et pousse les publish dans l'ingestor
pub fn spawn_mqtt_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    ingestor: Ingestor,
    health: HealthTracker,
) -> JoinHandle<()> {
    task::spawn(async move {
        let topics = ingestor.topics().clone();
        let subscriptions = [topics.cpu, topics.memory, topics.property];

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    for topic in &subscriptions {
                        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                            error!("[mqtt] subscribe {topic} failed: {e:?}");
                        }
                    }
                    info!("[mqtt] connected, subscribed to {} topics", subscriptions.len());
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    if let IngestOutcome::Ignored = ingestor.handle_message(&p.topic, &p.payload) {
                        debug!("[mqtt] no effect for message on {}", p.topic);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("[mqtt] connection error: {e:?}");
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

/// Publication synchrone vers le broker
pub trait Publisher: Send + Sync {
    fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()>;
}

impl Publisher for AsyncClient {
    fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.try_publish(topic, QoS::AtLeastOnce, false, payload)
            .with_context(|| format!("publish to {topic}"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("property name must not be empty")]
    EmptyName,
    #[error("MQTT client not configured")]
    NotConnected,
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Demande aux services système de publier une propriété (ex: `os.name`)
#[derive(Clone)]
pub struct PropertyRequester {
    publisher: Option<Arc<dyn Publisher>>,
    topic: String,
}

impl PropertyRequester {
    pub fn new(topic: impl Into<String>) -> Self {
        Self { publisher: None, topic: topic.into() }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn request(&self, property_name: &str) -> Result<(), RequestError> {
        let name = property_name.trim();
        if name.is_empty() {
            return Err(RequestError::EmptyName);
        }
        let publisher = self.publisher.as_ref().ok_or(RequestError::NotConnected)?;
        publisher
            .publish_bytes(&self.topic, name.as_bytes().to_vec())
            .map_err(|e| RequestError::Publish(format!("{e:#}")))?;
        info!("[mqtt] requested property {name} on {}", self.topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_devkit::{MockMqttClient, TestHarness};

    struct MockPublisher(MockMqttClient);

    impl Publisher for MockPublisher {
        fn publish_bytes(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
            self.0.try_publish(topic, QoS::AtLeastOnce, false, payload)
        }
    }

    #[tokio::test]
    async fn property_request_is_published_as_plain_name() {
        let harness = TestHarness::new();
        let topic = harness.topics.property_request.clone();
        let requester = PropertyRequester::new(topic.clone())
            .with_publisher(Arc::new(MockPublisher(harness.mqtt_client.clone())));

        assert!(matches!(requester.request("   "), Err(RequestError::EmptyName)));
        requester.request("  os.name ").unwrap();

        let payload = harness.wait_for_message(&topic, 200).await.unwrap().unwrap();
        assert_eq!(payload, b"os.name");
        // la requête vide n'a rien publié
        assert_eq!(harness.mqtt_client.published().len(), 1);
    }

    #[test]
    fn property_request_validates_and_needs_client() {
        let requester = PropertyRequester::new("t");
        assert!(matches!(requester.request(""), Err(RequestError::EmptyName)));
        assert!(matches!(requester.request("os.name"), Err(RequestError::NotConnected)));
    }

    #[tokio::test]
    async fn client_requires_a_broker_host() {
        let mut cfg = KernelConfig::default();
        assert!(create_mqtt_client(&cfg).is_ok());
        cfg.mqtt.host.clear();
        assert!(create_mqtt_client(&cfg).is_err());
    }
}
