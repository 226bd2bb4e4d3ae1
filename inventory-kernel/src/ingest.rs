//! Ingestion des flux CPU / mémoire / propriétés vers l'inventaire.
//!
//! Politique : un événement pour un host inconnu l'enregistre (register_*),
//! un événement pour un host connu rafraîchit le champ (update_*).

use crate::config::TopicsConf;
use crate::events::{EventError, InventoryEvent, MetricKind};
use crate::health::HealthTracker;
use crate::inventory::InventoryStore;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum IngestOutcome {
    Registered(MetricKind),
    Updated(MetricKind),
    /// Topic hors flux de métriques, ou host supprimé par un reset avant l'update
    Ignored,
    Rejected(EventError),
}

#[derive(Clone)]
pub struct Ingestor {
    store: InventoryStore,
    health: HealthTracker,
    topics: TopicsConf,
}

impl Ingestor {
    pub fn new(store: InventoryStore, health: HealthTracker, topics: TopicsConf) -> Self {
        Self { store, health, topics }
    }

    pub fn topics(&self) -> &TopicsConf {
        &self.topics
    }

    pub fn kind_for_topic(&self, topic: &str) -> Option<MetricKind> {
        if topic == self.topics.cpu {
            Some(MetricKind::Cpu)
        } else if topic == self.topics.memory {
            Some(MetricKind::Memory)
        } else if topic == self.topics.property {
            Some(MetricKind::Property)
        } else {
            None
        }
    }

    /// Traite un message MQTT brut
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        let Some(kind) = self.kind_for_topic(topic) else {
            debug!("[ingest] ignoring message on {topic}");
            return IngestOutcome::Ignored;
        };

        match InventoryEvent::decode(kind, payload) {
            Ok(event) => self.apply(&event),
            Err(e) => {
                warn!("[ingest] rejected {kind} event on {topic}: {e}");
                self.health.record_rejected();
                IngestOutcome::Rejected(e)
            }
        }
    }

    /// Applique un événement déjà validé
    pub fn apply(&self, event: &InventoryEvent) -> IngestOutcome {
        let registered = match event {
            InventoryEvent::Cpu(c) => first_or_refresh(
                self.store.register_cpu(&c.host_id, c.cpu_usage),
                || self.store.update_cpu(&c.host_id, c.cpu_usage),
            ),
            InventoryEvent::Memory(m) => first_or_refresh(
                self.store.register_memory(&m.host_id, m.memory_used, m.memory_max),
                || self.store.update_memory(&m.host_id, m.memory_used, m.memory_max),
            ),
            InventoryEvent::Property(p) => first_or_refresh(
                self.store.register_property(&p.host_id, &p.key, &p.value),
                || self.store.update_property(&p.host_id, &p.key, &p.value),
            ),
        };

        let kind = event.kind();
        match registered {
            Some(true) => {
                self.health.record_event(kind);
                debug!("[ingest] registered host {} via {kind}", event.host_id());
                IngestOutcome::Registered(kind)
            }
            Some(false) => {
                self.health.record_event(kind);
                IngestOutcome::Updated(kind)
            }
            // reset concurrent entre register et update
            None => {
                debug!("[ingest] host {} vanished before {kind} update", event.host_id());
                IngestOutcome::Ignored
            }
        }
    }
}

/// `Some(true)` si créé, `Some(false)` si rafraîchi, `None` si le host a disparu entre-temps
fn first_or_refresh(registered: bool, update: impl FnOnce() -> bool) -> Option<bool> {
    if registered {
        Some(true)
    } else if update() {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_devkit::TestHarness;

    fn setup() -> (Ingestor, InventoryStore, HealthTracker) {
        let store = InventoryStore::new();
        let health = HealthTracker::new();
        let ingestor = Ingestor::new(store.clone(), health.clone(), TopicsConf::default());
        (ingestor, store, health)
    }

    /// Vide le receiver du stub MQTT dans l'ingestor
    async fn drain(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<inventory_devkit::MockMessage>,
        ingestor: &Ingestor,
        count: usize,
    ) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..count {
            let msg = rx.recv().await.unwrap();
            outcomes.push(ingestor.handle_message(&msg.topic, &msg.payload));
        }
        outcomes
    }

    #[tokio::test]
    async fn first_event_registers_then_updates() {
        let (ingestor, store, _) = setup();
        let harness = TestHarness::new();
        let mut rx = harness.mqtt_client.setup_receiver();

        harness.send_cpu("host1", 55.0).unwrap();
        harness.send_cpu("host1", 70.0).unwrap();
        let outcomes = drain(&mut rx, &ingestor, 2).await;

        assert!(matches!(outcomes[0], IngestOutcome::Registered(MetricKind::Cpu)));
        assert!(matches!(outcomes[1], IngestOutcome::Updated(MetricKind::Cpu)));
        assert_eq!(store.get("host1").unwrap().cpu_usage, Some(70.0));
    }

    #[tokio::test]
    async fn streams_merge_into_one_record() {
        let (ingestor, store, health) = setup();
        let harness = TestHarness::new();
        let mut rx = harness.mqtt_client.setup_receiver();

        harness.send_property("host1", "os.name", "Linux").unwrap();
        harness.send_memory("host1", 256, 1024).unwrap();
        harness.send_cpu("host1", 12.0).unwrap();
        harness.send_property("host1", "os.arch", "x86_64").unwrap();
        drain(&mut rx, &ingestor, 4).await;

        let record = store.get("host1").unwrap();
        assert_eq!(record.cpu_usage, Some(12.0));
        assert_eq!(record.memory_used(), Some(256));
        assert_eq!(record.memory_max(), Some(1024));
        assert_eq!(record.properties.len(), 2);

        let counts = health.event_counts();
        assert_eq!((counts.cpu, counts.memory, counts.property), (1, 1, 2));
    }

    #[tokio::test]
    async fn duplicate_delivery_is_harmless() {
        let (ingestor, store, _) = setup();
        let harness = TestHarness::new();
        let mut rx = harness.mqtt_client.setup_receiver();

        harness.send_memory("host1", 10, 20).unwrap();
        harness.send_memory("host1", 10, 20).unwrap();
        drain(&mut rx, &ingestor, 2).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("host1").unwrap().memory_used(), Some(10));
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected_and_counted() {
        let (ingestor, store, health) = setup();
        let harness = TestHarness::new();
        let mut rx = harness.mqtt_client.setup_receiver();

        let memory_topic = harness.topics.memory.clone();
        harness.send_raw(&memory_topic, br#"{"hostId":"h","memoryUsed":1}"#).unwrap();
        harness.send_cpu("", 10.0).unwrap();
        let outcomes = drain(&mut rx, &ingestor, 2).await;

        assert!(matches!(outcomes[0], IngestOutcome::Rejected(EventError::Malformed { .. })));
        assert!(matches!(outcomes[1], IngestOutcome::Rejected(EventError::EmptyHostId)));
        assert!(store.is_empty());
        assert_eq!(health.event_counts().rejected, 2);
    }

    #[test]
    fn unknown_topics_are_ignored() {
        let (ingestor, store, health) = setup();
        let outcome = ingestor.handle_message("some/other/topic", br#"{"hostId":"h","cpuUsage":1.0}"#);

        assert!(matches!(outcome, IngestOutcome::Ignored));
        assert!(store.is_empty());
        assert_eq!(health.event_counts().rejected, 0);
    }

    #[test]
    fn reset_between_register_and_update_drops_the_event() {
        assert_eq!(first_or_refresh(true, || unreachable!()), Some(true));
        assert_eq!(first_or_refresh(false, || true), Some(false));
        assert_eq!(first_or_refresh(false, || false), None);

        let (ingestor, store, health) = setup();
        let event = InventoryEvent::Cpu(crate::events::CpuUsage { host_id: "host1".into(), cpu_usage: 10.0 });
        assert!(matches!(ingestor.apply(&event), IngestOutcome::Registered(MetricKind::Cpu)));

        // le host disparaît entre register (déjà connu) et update
        let raced = first_or_refresh(
            store.register_cpu("host1", 20.0),
            || {
                store.reset();
                store.update_cpu("host1", 20.0)
            },
        );
        assert_eq!(raced, None);
        assert!(store.get("host1").is_none());

        // l'événement suivant ré-enregistre le host proprement
        let event = InventoryEvent::Cpu(crate::events::CpuUsage { host_id: "host1".into(), cpu_usage: 30.0 });
        assert!(matches!(ingestor.apply(&event), IngestOutcome::Registered(MetricKind::Cpu)));
        let record = store.get("host1").unwrap();
        assert_eq!(record.cpu_usage, Some(30.0));
        assert!(record.memory.is_none());
        assert_eq!(health.event_counts().cpu, 2);
    }
}
