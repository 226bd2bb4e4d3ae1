use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use gethostname::gethostname;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const CPU_TOPIC: &str = "inventory/systems/cpu-status@v1";
const MEMORY_TOPIC: &str = "inventory/systems/memory-status@v1";
const PROPERTY_TOPIC: &str = "inventory/systems/property-message@v1";
const PROPERTY_REQUEST_TOPIC: &str = "inventory/systems/property-name@v1";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct CpuUsage { host_id: String, cpu_usage: f64 }

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct MemoryStatus { host_id: String, memory_used: i64, memory_max: i64 }

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct PropertyMessage { host_id: String, key: String, value: String }

#[derive(Debug, Clone)]
struct SystemConfig {
    host_id: String,
    mqtt_host: String,
    mqtt_port: u16,
    sample_every: Duration,
}

impl SystemConfig {
    fn from_env(var: impl Fn(&str) -> Option<String>) -> Self {
        let host_id = var("INVENTORY_HOST_ID")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| gethostname().to_string_lossy().to_string());
        Self {
            host_id,
            mqtt_host: var("INVENTORY_MQTT_HOST").unwrap_or_else(|| "localhost".into()),
            mqtt_port: var("INVENTORY_MQTT_PORT").and_then(|p| p.parse().ok()).unwrap_or(1883),
            sample_every: Duration::from_secs(
                var("INVENTORY_SAMPLE_SECS").and_then(|s| s.parse().ok()).unwrap_or(15).max(1),
            ),
        }
    }
}

/// Valeur d'une propriété système demandée par le kernel
fn lookup_property(sys: &System, host_id: &str, name: &str) -> String {
    let value = match name {
        "os.name" => System::name().or_else(|| Some(std::env::consts::OS.to_string())),
        "os.arch" => Some(std::env::consts::ARCH.to_string()),
        "os.family" => Some(std::env::consts::FAMILY.to_string()),
        "os.version" => System::os_version(),
        "kernel.version" => System::kernel_version(),
        "host.name" => Some(host_id.to_string()),
        "user.name" => std::env::var("USER").or_else(|_| std::env::var("USERNAME")).ok(),
        "cpu.count" => Some(sys.cpus().len().to_string()),
        _ => None,
    };
    value.unwrap_or_else(|| "unknown".to_string())
}

fn sample(sys: &mut System, host_id: &str) -> (CpuUsage, MemoryStatus) {
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let cpu = CpuUsage {
        host_id: host_id.to_string(),
        cpu_usage: f64::from(sys.global_cpu_info().cpu_usage()),
    };
    let memory = MemoryStatus {
        host_id: host_id.to_string(),
        memory_used: i64::try_from(sys.used_memory()).unwrap_or(i64::MAX),
        memory_max: i64::try_from(sys.total_memory()).unwrap_or(i64::MAX),
    };
    (cpu, memory)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = SystemConfig::from_env(|key| std::env::var(key).ok());
    info!("[system] reporting as {} to {}:{}", cfg.host_id, cfg.mqtt_host, cfg.mqtt_port);

    let mut opts = MqttOptions::new(format!("inventory-system-{}", cfg.host_id), &cfg.mqtt_host, cfg.mqtt_port);
    opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(opts, 10);

    // Boucle MQTT : répond aux requêtes de propriété
    let reply_client = client.clone();
    let host_id = cfg.host_id.clone();
    tokio::spawn(async move {
        let sys = System::new_all();
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    if let Err(e) = reply_client.try_subscribe(PROPERTY_REQUEST_TOPIC, QoS::AtLeastOnce) {
                        error!("[system] subscribe failed: {e:?}");
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(p))) if p.topic == PROPERTY_REQUEST_TOPIC => {
                    let name = String::from_utf8_lossy(&p.payload).trim().to_string();
                    if name.is_empty() {
                        continue;
                    }
                    let msg = PropertyMessage {
                        host_id: host_id.clone(),
                        value: lookup_property(&sys, &host_id, &name),
                        key: name,
                    };
                    match serde_json::to_vec(&msg) {
                        Ok(payload) => {
                            if let Err(e) = reply_client.try_publish(PROPERTY_TOPIC, QoS::AtLeastOnce, false, payload) {
                                warn!("[system] property reply failed: {e:?}");
                            } else {
                                debug!("[system] answered property {}", msg.key);
                            }
                        }
                        Err(e) => error!("[system] property encode failed: {e}"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("[system] MQTT loop error: {e:?}");
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    // Boucle d'échantillonnage (envoi)
    let mut sys = System::new();
    loop {
        let (cpu, memory) = sample(&mut sys, &cfg.host_id);

        for (topic, payload) in [(CPU_TOPIC, serde_json::to_vec(&cpu)?), (MEMORY_TOPIC, serde_json::to_vec(&memory)?)] {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, false, payload).await {
                warn!("[system] publish {topic} failed: {e:?}");
            }
        }

        sleep(cfg.sample_every).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let cfg = SystemConfig::from_env(|key| match key {
            "INVENTORY_HOST_ID" => Some("node-7".into()),
            "INVENTORY_SAMPLE_SECS" => Some("0".into()),
            _ => None,
        });
        assert_eq!(cfg.host_id, "node-7");
        assert_eq!(cfg.mqtt_host, "localhost");
        assert_eq!(cfg.mqtt_port, 1883);
        assert_eq!(cfg.sample_every, Duration::from_secs(1));

        let fallback = SystemConfig::from_env(|_| None);
        assert!(!fallback.host_id.is_empty());
    }

    #[test]
    fn known_and_unknown_properties() {
        let sys = System::new();
        assert_eq!(lookup_property(&sys, "h", "os.arch"), std::env::consts::ARCH);
        assert_eq!(lookup_property(&sys, "h", "host.name"), "h");
        assert_eq!(lookup_property(&sys, "h", "no.such.property"), "unknown");
    }

    #[test]
    fn sampled_messages_use_wire_format() {
        let mut sys = System::new();
        let (cpu, memory) = sample(&mut sys, "h1");
        assert_eq!(cpu.host_id, "h1");
        assert!(memory.memory_used <= memory.memory_max);

        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(json["hostId"], "h1");
        assert!(json.get("memoryUsed").is_some());
        assert!(json.get("memoryMax").is_some());
    }
}
