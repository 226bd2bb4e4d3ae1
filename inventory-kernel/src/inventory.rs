/**
 * INVENTORY STORE - Registre des derniers états connus de chaque host
 *
 * RÔLE : Agrège les événements CPU, mémoire et propriétés reçus de façon
 * asynchrone et garde un snapshot cohérent par host.
 *
 * FONCTIONNEMENT :
 * - register_* : première observation d'un host, crée le record (no-op si connu)
 * - update_*   : rafraîchit un champ d'un host connu (no-op si inconnu)
 * - get / list_all : copies cohérentes, jamais une vue live
 * - reset : vide tout le registre d'un coup
 *
 * CONCURRENCE : un seul RwLock autour d'une BTreeMap. Chaque opération prend
 * le verrou une fois, ne fait aucune I/O, et le relâche avant de rendre la main.
 */

use crate::models::{HostRecord, HostsMap, MemoryUsage};
use crate::state::{new_rw_state, SharedRw};

#[derive(Clone, Default)]
pub struct InventoryStore {
    systems: SharedRw<HostsMap>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self {
            systems: new_rw_state(HostsMap::new()),
        }
    }

    /// Crée le record si `host_id` est inconnu. Retourne `true` si créé.
    fn register_with(&self, host_id: &str, seed: impl FnOnce(&mut HostRecord)) -> bool {
        let mut systems = self.systems.write();
        if systems.contains_key(host_id) {
            return false;
        }
        let mut record = HostRecord::new(host_id);
        seed(&mut record);
        systems.insert(host_id.to_string(), record);
        true
    }

    /// Applique `apply` au record si le host est connu. Retourne `true` si appliqué.
    fn update_with(&self, host_id: &str, apply: impl FnOnce(&mut HostRecord)) -> bool {
        match self.systems.write().get_mut(host_id) {
            Some(record) => {
                apply(record);
                true
            }
            None => false,
        }
    }

    /// Première observation d'un host via le flux CPU
    pub fn register_cpu(&self, host_id: &str, cpu_usage: f64) -> bool {
        self.register_with(host_id, |r| r.cpu_usage = Some(cpu_usage))
    }

    /// Première observation d'un host via le flux mémoire
    pub fn register_memory(&self, host_id: &str, memory_used: i64, memory_max: i64) -> bool {
        self.register_with(host_id, |r| {
            r.memory = Some(MemoryUsage { used: memory_used, max: memory_max })
        })
    }

    /// Première observation d'un host via le flux propriétés
    pub fn register_property(&self, host_id: &str, key: &str, value: &str) -> bool {
        self.register_with(host_id, |r| {
            r.properties.insert(key.to_string(), value.to_string());
        })
    }

    pub fn update_cpu(&self, host_id: &str, cpu_usage: f64) -> bool {
        self.update_with(host_id, |r| r.cpu_usage = Some(cpu_usage))
    }

    /// Les deux valeurs sont posées sous le même verrou d'écriture
    pub fn update_memory(&self, host_id: &str, memory_used: i64, memory_max: i64) -> bool {
        self.update_with(host_id, |r| {
            r.memory = Some(MemoryUsage { used: memory_used, max: memory_max })
        })
    }

    pub fn update_property(&self, host_id: &str, key: &str, value: &str) -> bool {
        self.update_with(host_id, |r| {
            r.properties.insert(key.to_string(), value.to_string());
        })
    }

    pub fn get(&self, host_id: &str) -> Option<HostRecord> {
        self.systems.read().get(host_id).cloned()
    }

    /// Snapshot complet trié par host_id
    pub fn list_all(&self) -> Vec<(String, HostRecord)> {
        self.systems
            .read()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Vide le registre. Retourne le nombre de records supprimés.
    pub fn reset(&self) -> usize {
        let mut systems = self.systems.write();
        let cleared = systems.len();
        systems.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.systems.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.read().is_empty()
    }
}
