use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub mqtt: MqttConf,
    pub http: HttpConf,
    pub topics: TopicsConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
    pub api_key: Option<String>,
}

/// Topics MQTT des trois flux de métriques + requêtes de propriété
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TopicsConf {
    pub cpu: String,
    pub memory: String,
    pub property: String,
    pub property_request: String,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "inventory-kernel".into(),
            keep_alive_secs: 15,
        }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into(), api_key: None }
    }
}

impl Default for TopicsConf {
    fn default() -> Self {
        Self {
            cpu: "inventory/systems/cpu-status@v1".into(),
            memory: "inventory/systems/memory-status@v1".into(),
            property: "inventory/systems/property-message@v1".into(),
            property_request: "inventory/systems/property-name@v1".into(),
        }
    }
}

/// Charge `INVENTORY_KERNEL_CONFIG` (défaut `kernel.yaml`) puis applique les overrides d'env
pub async fn load_config() -> KernelConfig {
    let path = std::env::var("INVENTORY_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = load_config_from(&path).await;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    cfg
}

pub async fn load_config_from<P: AsRef<Path>>(path: P) -> KernelConfig {
    let path = path.as_ref();
    if !path.exists() {
        warn!("[config] no {} found, using defaults", path.display());
        return KernelConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!("[config] cannot read {}: {e}, using defaults", path.display());
            return KernelConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        warn!("[config] invalid {}: {e}", path.display());
        KernelConfig::default()
    })
}

fn apply_env_overrides(cfg: &mut KernelConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(key) = var("INVENTORY_API_KEY").filter(|k| !k.is_empty()) {
        cfg.http.api_key = Some(key);
    }
    if let Some(addr) = var("INVENTORY_HTTP_ADDR").filter(|a| !a.is_empty()) {
        cfg.http.bind = addr;
    }
    if let Some(host) = var("INVENTORY_MQTT_HOST").filter(|h| !h.is_empty()) {
        cfg.mqtt.host = host;
    }
    if let Some(port) = var("INVENTORY_MQTT_PORT").and_then(|p| p.parse().ok()) {
        cfg.mqtt.port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let cfg = load_config_from("/definitely/not/here/kernel.yaml").await;
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
        assert_eq!(cfg.topics.cpu, "inventory/systems/cpu-status@v1");
        assert!(cfg.http.api_key.is_none());
    }

    #[tokio::test]
    async fn partial_yaml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mqtt:\n  host: broker.lan\ntopics:\n  cpu: custom/cpu").unwrap();

        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.mqtt.host, "broker.lan");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.topics.cpu, "custom/cpu");
        assert_eq!(cfg.topics.memory, "inventory/systems/memory-status@v1");
    }

    #[tokio::test]
    async fn invalid_yaml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mqtt: [this is: not valid").unwrap();

        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.mqtt.host, "localhost");
    }

    #[tokio::test]
    async fn unreadable_path_falls_back_to_defaults() {
        // existe mais n'est pas un fichier : read_to_string échoue
        let dir = tempfile::tempdir().unwrap();

        let cfg = load_config_from(dir.path()).await;
        assert_eq!(cfg.mqtt.host, "localhost");
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = KernelConfig::default();
        apply_env_overrides(&mut cfg, |key| match key {
            "INVENTORY_API_KEY" => Some("secret".into()),
            "INVENTORY_MQTT_PORT" => Some("1884".into()),
            "INVENTORY_HTTP_ADDR" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.http.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.mqtt.port, 1884);
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");
    }
}
