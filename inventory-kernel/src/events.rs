//! Messages entrants publiés par les services système, et leur validation.
//!
//! Le store suppose des entrées valides : tout ce qui est mal formé est
//! rejeté ici, avant d'atteindre l'inventaire.

use serde::{Deserialize, Serialize};

/// Erreurs de validation d'un événement entrant
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: MetricKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("hostId must not be empty")]
    EmptyHostId,
    #[error("property key must not be empty")]
    EmptyPropertyKey,
    #[error("cpuUsage must be a finite number, got {0}")]
    InvalidCpuUsage(f64),
    #[error("memory figures must be non-negative (used={used}, max={max})")]
    InvalidMemory { used: i64, max: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Cpu,
    Memory,
    Property,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Property => "property",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    pub host_id: String,
    pub cpu_usage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub host_id: String,
    pub memory_used: i64,
    pub memory_max: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMessage {
    pub host_id: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    Cpu(CpuUsage),
    Memory(MemoryStatus),
    Property(PropertyMessage),
}

impl InventoryEvent {
    /// Décode et valide un payload JSON selon le type de flux
    pub fn decode(kind: MetricKind, payload: &[u8]) -> Result<Self, EventError> {
        let malformed = |source| EventError::Malformed { kind, source };
        let event = match kind {
            MetricKind::Cpu => InventoryEvent::Cpu(serde_json::from_slice(payload).map_err(malformed)?),
            MetricKind::Memory => InventoryEvent::Memory(serde_json::from_slice(payload).map_err(malformed)?),
            MetricKind::Property => InventoryEvent::Property(serde_json::from_slice(payload).map_err(malformed)?),
        };
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.host_id().trim().is_empty() {
            return Err(EventError::EmptyHostId);
        }
        match self {
            InventoryEvent::Cpu(c) if !c.cpu_usage.is_finite() => Err(EventError::InvalidCpuUsage(c.cpu_usage)),
            InventoryEvent::Memory(m) if m.memory_used < 0 || m.memory_max < 0 => Err(EventError::InvalidMemory {
                used: m.memory_used,
                max: m.memory_max,
            }),
            InventoryEvent::Property(p) if p.key.is_empty() => Err(EventError::EmptyPropertyKey),
            _ => Ok(()),
        }
    }

    pub fn host_id(&self) -> &str {
        match self {
            InventoryEvent::Cpu(c) => &c.host_id,
            InventoryEvent::Memory(m) => &m.host_id,
            InventoryEvent::Property(p) => &p.host_id,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            InventoryEvent::Cpu(_) => MetricKind::Cpu,
            InventoryEvent::Memory(_) => MetricKind::Memory,
            InventoryEvent::Property(_) => MetricKind::Property,
        }
    }
}
