use crate::events::MetricKind;
use crate::inventory::InventoryStore;
use crate::state::{new_state, Shared};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub started_at: String,
    pub hosts_tracked: u64,
    pub mqtt_status: String,
    pub mqtt_reconnects: u64,
    pub events: EventCounts,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventCounts {
    pub cpu: u64,
    pub memory: u64,
    pub property: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    cpu: AtomicU64,
    memory: AtomicU64,
    property: AtomicU64,
    rejected: AtomicU64,
    reconnects: AtomicU64,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    started_at: OffsetDateTime,
    counters: Arc<Counters>,
    mqtt_status: Shared<String>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
            counters: Arc::new(Counters::default()),
            mqtt_status: new_state("connecting".to_string()),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn record_event(&self, kind: MetricKind) {
        let counter = match kind {
            MetricKind::Cpu => &self.counters.cpu,
            MetricKind::Memory => &self.counters.memory,
            MetricKind::Property => &self.counters.property,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_counts(&self) -> EventCounts {
        EventCounts {
            cpu: self.counters.cpu.load(Ordering::Relaxed),
            memory: self.counters.memory.load(Ordering::Relaxed),
            property: self.counters.property.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    pub fn get_health(&self, store: &InventoryStore) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            started_at: self.started_at.format(&Rfc3339).unwrap_or_default(),
            hosts_tracked: store.len() as u64,
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.counters.reconnects.load(Ordering::Relaxed),
            events: self.event_counts(),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
