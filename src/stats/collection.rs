//! Per-stat modifier storage and layered aggregation
//!
//! Aggregation order is fixed:
//! 1. If any `Override` is active, the most recently created one wins and
//!    nothing else is consulted
//! 2. Otherwise every `Add` is folded into the base
//! 3. Then every `Multiply` is applied in turn

use crate::core::numeric::{to_number, SafeMath};
use crate::core::types::sanitize_stat_id;
use crate::persistence::{codec, lenient};
use crate::stats::modifier::{ModifierType, StatModifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened when a modifier was added to a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new modifier id
    Inserted,
    /// Existing id below its stack cap gained a stack (new count)
    Stacked(u32),
    /// Existing id already at max stacks; only its timer restarted
    Refreshed,
}

/// All modifiers targeting one stat, unique by modifier id
///
/// Insertion order is kept and breaks ties between overrides created in the
/// same millisecond (the later insertion wins).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CollectionRecord")]
pub struct ModifierCollection {
    stat_id: String,
    modifiers: Vec<StatModifier>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CollectionRecord {
    #[serde(deserialize_with = "lenient::string", alias = "stat_id")]
    stat_id: Option<String>,
    #[serde(deserialize_with = "lenient::items")]
    modifiers: Vec<StatModifier>,
}

impl From<CollectionRecord> for ModifierCollection {
    fn from(record: CollectionRecord) -> Self {
        let stat_id = record
            .stat_id
            .or_else(|| record.modifiers.first().map(|m| m.stat_id().to_string()))
            .unwrap_or_default();
        let mut collection = ModifierCollection::new(&stat_id);

        for modifier in record.modifiers {
            if collection.contains(modifier.id()) {
                tracing::warn!(
                    "Duplicate modifier id {} on stat {} ignored while loading",
                    modifier.id(),
                    collection.stat_id
                );
                continue;
            }
            collection.insert_raw(modifier);
        }

        collection
    }
}

impl ModifierCollection {
    pub fn new(stat_id: &str) -> Self {
        Self {
            stat_id: sanitize_stat_id(stat_id),
            modifiers: Vec::new(),
        }
    }

    pub fn stat_id(&self) -> &str {
        &self.stat_id
    }

    fn insert_raw(&mut self, mut modifier: StatModifier) {
        modifier.set_stat_id(&self.stat_id);
        self.modifiers.push(modifier);
    }

    /// Add a modifier, treating a known id as a re-application
    pub fn add(&mut self, modifier: StatModifier) -> AddOutcome {
        if let Some(existing) = self.modifiers.iter_mut().find(|m| m.id() == modifier.id()) {
            if existing.current_stacks() < existing.max_stacks() {
                let stacks = existing.add_stacks(1);
                tracing::debug!("Modifier {} stacked to {}", existing.id(), stacks);
                return AddOutcome::Stacked(stacks);
            }
            existing.refresh();
            tracing::debug!("Modifier {} at max stacks, timer refreshed", existing.id());
            return AddOutcome::Refreshed;
        }

        self.insert_raw(modifier);
        AddOutcome::Inserted
    }

    pub fn remove(&mut self, modifier_id: &str) -> Option<StatModifier> {
        let idx = self.modifiers.iter().position(|m| m.id() == modifier_id)?;
        Some(self.modifiers.remove(idx))
    }

    /// Remove every modifier from `source`, returning their ids
    pub fn remove_by_source(&mut self, source: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.modifiers.retain(|m| {
            if m.source() == source {
                removed.push(m.id().to_string());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn get(&self, modifier_id: &str) -> Option<&StatModifier> {
        self.modifiers.iter().find(|m| m.id() == modifier_id)
    }

    pub fn get_mut(&mut self, modifier_id: &str) -> Option<&mut StatModifier> {
        self.modifiers.iter_mut().find(|m| m.id() == modifier_id)
    }

    pub fn contains(&self, modifier_id: &str) -> bool {
        self.get(modifier_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatModifier> {
        self.modifiers.iter()
    }

    pub fn active(&self) -> impl Iterator<Item = &StatModifier> {
        self.modifiers.iter().filter(|m| m.is_active())
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    pub fn clear(&mut self) {
        self.modifiers.clear();
    }

    /// Resolve every active modifier against `base`
    pub fn apply_all(&self, base: f64) -> f64 {
        let base = to_number(base, 0.0);

        let mut winner: Option<&StatModifier> = None;
        for m in self
            .active()
            .filter(|m| m.modifier_type() == ModifierType::Override)
        {
            // >= keeps the later insertion on equal timestamps
            if winner.map_or(true, |w| m.created_at() >= w.created_at()) {
                winner = Some(m);
            }
        }
        if let Some(w) = winner {
            return w.effective_value();
        }

        let added = self
            .active()
            .filter(|m| m.modifier_type() == ModifierType::Add)
            .fold(base, |acc, m| SafeMath::add(acc, m.effective_value()));

        self.active()
            .filter(|m| m.modifier_type() == ModifierType::Multiply)
            .fold(added, |acc, m| SafeMath::multiply(acc, m.effective_value()))
    }

    /// Advance every modifier one turn and drop the ones that ran out
    ///
    /// Returns the ids of removed modifiers. Modifiers left with zero
    /// stacks are dropped as well.
    pub fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        self.modifiers.retain_mut(|m| {
            let still_active = m.tick() && m.is_active();
            if !still_active {
                expired.push(m.id().to_string());
            }
            still_active
        });

        if !expired.is_empty() {
            tracing::debug!("Stat {} modifiers expired: {:?}", self.stat_id, expired);
        }
        expired
    }

    pub fn to_json(&self) -> Value {
        codec::encode(self)
    }

    pub fn from_json(value: &Value) -> Self {
        codec::decode_or_else(value, "modifier collection", ModifierCollection::default)
    }
}
