//! The set of stats owned by one session

use crate::core::types::sanitize_stat_id;
use crate::persistence::{codec, lenient};
use crate::stats::collection::{AddOutcome, ModifierCollection};
use crate::stats::modifier::StatModifier;
use crate::stats::stat::Stat;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::Entry;

/// Stats keyed by sanitized id
///
/// Lookups are by id; listing follows insertion order so that displays stay
/// stable between turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "ManagerRecord", into = "ManagerRecord")]
pub struct StatManager {
    stats: AHashMap<String, Stat>,
    order: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ManagerRecord {
    #[serde(deserialize_with = "lenient::items")]
    stats: Vec<Stat>,
    #[serde(deserialize_with = "lenient::items")]
    modifiers: Vec<ModifierCollection>,
}

impl From<ManagerRecord> for StatManager {
    fn from(record: ManagerRecord) -> Self {
        let mut manager = StatManager::new();
        for stat in record.stats {
            manager.add(stat);
        }
        for collection in record.modifiers {
            match manager.stats.get_mut(collection.stat_id()) {
                Some(stat) => stat.replace_modifiers(collection),
                None => tracing::warn!(
                    "Dropping modifiers for unknown stat {}",
                    collection.stat_id()
                ),
            }
        }
        manager
    }
}

impl From<StatManager> for ManagerRecord {
    fn from(manager: StatManager) -> Self {
        let modifiers = manager
            .iter()
            .filter(|s| !s.modifiers().is_empty())
            .map(|s| s.modifiers().clone())
            .collect();
        let stats = manager.iter().cloned().collect();
        Self { stats, modifiers }
    }
}

impl StatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stat, replacing any existing stat with the same id
    ///
    /// Accepts a built [`Stat`] or a [`StatConfig`](crate::stats::StatConfig).
    pub fn add(&mut self, stat: impl Into<Stat>) -> &mut Stat {
        let stat = stat.into();
        match self.stats.entry(stat.id().to_string()) {
            Entry::Occupied(mut slot) => {
                tracing::warn!("Replacing existing stat {}", slot.key());
                slot.insert(stat);
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                self.order.push(slot.key().clone());
                slot.insert(stat)
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Stat> {
        let id = sanitize_stat_id(id);
        let removed = self.stats.remove(&id)?;
        self.order.retain(|existing| existing != &id);
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Stat> {
        self.stats.get(&sanitize_stat_id(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Stat> {
        self.stats.get_mut(&sanitize_stat_id(id))
    }

    pub fn has(&self, id: &str) -> bool {
        self.stats.contains_key(&sanitize_stat_id(id))
    }

    /// Stats in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Stat> {
        self.order.iter().filter_map(|id| self.stats.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Stats that should be listed: shown in UI and not hidden
    pub fn get_visible(&self) -> Vec<&Stat> {
        self.iter().filter(|s| s.is_visible()).collect()
    }

    /// Attach a modifier to a stat; `None` if the stat does not exist
    pub fn add_modifier(&mut self, stat_id: &str, modifier: StatModifier) -> Option<AddOutcome> {
        let stat = self.get_mut(stat_id)?;
        let outcome = stat.modifiers_mut().add(modifier);
        tracing::debug!("Modifier on {}: {:?}", stat.id(), outcome);
        Some(outcome)
    }

    pub fn remove_modifier(&mut self, stat_id: &str, modifier_id: &str) -> Option<StatModifier> {
        self.get_mut(stat_id)?.modifiers_mut().remove(modifier_id)
    }

    pub fn clear_modifiers(&mut self) {
        for stat in self.stats.values_mut() {
            stat.modifiers_mut().clear();
        }
    }

    /// Advance every modifier collection one turn
    ///
    /// Returns the ids of all modifiers that expired, in stat order.
    pub fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for id in &self.order {
            if let Some(stat) = self.stats.get_mut(id) {
                expired.extend(stat.modifiers_mut().tick());
            }
        }
        expired
    }

    pub fn reset_all(&mut self) {
        for stat in self.stats.values_mut() {
            stat.reset();
        }
    }

    pub fn clear(&mut self) {
        self.stats.clear();
        self.order.clear();
    }

    pub fn to_json(&self) -> Value {
        codec::encode(self)
    }

    pub fn from_json(value: &Value) -> Self {
        codec::decode_or_else(value, "stat manager", StatManager::default)
    }
}
