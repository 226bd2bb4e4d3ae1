/**
 * INVENTORY KERNEL - Point d'entrée du serveur d'inventaire
 *
 * RÔLE : Bootstrap config, store, ingestion MQTT et API REST.
 *
 * ARCHITECTURE : les services système publient CPU / mémoire / propriétés
 * sur MQTT, le kernel les agrège par host et les expose en HTTP.
 */

use inventory_kernel::config::{load_config, KernelConfig};
use inventory_kernel::health::HealthTracker;
use inventory_kernel::http::{self, AppState};
use inventory_kernel::ingest::Ingestor;
use inventory_kernel::inventory::InventoryStore;
use inventory_kernel::mqtt::{self as kernel_mqtt, PropertyRequester};

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg: KernelConfig = load_config().await;
    let store = InventoryStore::new();
    let health_tracker = HealthTracker::new();

    // MQTT : ingestion des trois flux + publication des requêtes de propriété
    let (mqtt_client, eventloop) = kernel_mqtt::create_mqtt_client(&cfg)
        .context("failed to create MQTT client")?;
    let ingestor = Ingestor::new(store.clone(), health_tracker.clone(), cfg.topics.clone());
    kernel_mqtt::spawn_mqtt_listener(mqtt_client.clone(), eventloop, ingestor, health_tracker.clone());

    let property_requester = PropertyRequester::new(cfg.topics.property_request.clone())
        .with_publisher(Arc::new(mqtt_client));

    let app_state = AppState {
        store,
        health_tracker,
        property_requester,
        api_key: cfg.http.api_key.as_deref().map(Arc::from),
    };
    if app_state.api_key.is_none() {
        info!("[kernel] no API key configured, REST API is open");
    }

    let app = http::build_router(app_state);

    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http.bind))?;
    info!("[kernel] listening on http://{}", cfg.http.bind);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
