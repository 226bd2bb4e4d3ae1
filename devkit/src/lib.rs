/*!
# Inventory DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests du kernel inventory sans broker MQTT:
- Stub MQTT qui enregistre les publications et simule la réception
- Builders des messages CPU / mémoire / propriété
- Harness de test avec les topics par défaut
*/

pub mod mqtt_stub;
pub mod test_utils;

pub use mqtt_stub::{InventoryMessageBuilder, MockMessage, MockMqttClient};
pub use test_utils::{InventoryTopics, TestHarness};
