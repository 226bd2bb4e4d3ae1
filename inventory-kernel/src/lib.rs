/*!
# Inventory Kernel

Agrège les métriques CPU, mémoire et propriétés publiées par les services
système via MQTT, et expose le dernier état connu de chaque host en REST.

- [`inventory::InventoryStore`] : le registre thread-safe des hosts
- [`ingest::Ingestor`] : validation + politique register/update des événements
- [`mqtt`] : boucle MQTT et requêtes de propriété
- [`http`] : API REST axum
*/

pub mod config;
pub mod events;
pub mod health;
pub mod http;
pub mod ingest;
pub mod inventory;
pub mod models;
pub mod mqtt;
pub mod state;

pub use inventory::InventoryStore;
pub use models::{HostRecord, MemoryUsage};
