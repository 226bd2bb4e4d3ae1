use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Memory figures reported together by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: i64,
    pub max: i64,
}

/// Latest known state of one host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    host_id: String,
    pub cpu_usage: Option<f64>,
    pub memory: Option<MemoryUsage>,
    pub properties: HashMap<String, String>,
}

impl HostRecord {
    pub fn new(host_id: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            cpu_usage: None,
            memory: None,
            properties: HashMap::new(),
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn memory_used(&self) -> Option<i64> {
        self.memory.map(|m| m.used)
    }

    pub fn memory_max(&self) -> Option<i64> {
        self.memory.map(|m| m.max)
    }
}

/// Vue JSON d'un host pour l'API (`GET /systems`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub host_id: String,
    pub cpu_usage: Option<f64>,
    pub memory_used: Option<i64>,
    pub memory_max: Option<i64>,
    pub properties: BTreeMap<String, String>,
}

impl From<&HostRecord> for HostView {
    fn from(h: &HostRecord) -> Self {
        HostView {
            host_id: h.host_id.clone(),
            cpu_usage: h.cpu_usage,
            memory_used: h.memory_used(),
            memory_max: h.memory_max(),
            properties: h.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

pub type HostsMap = BTreeMap<String, HostRecord>;
