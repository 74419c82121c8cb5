//! Named, reusable stat sets

use crate::core::error::{Result, TallyError};
use crate::core::types::{generate_id, now_millis, Timestamp};
use crate::persistence::{codec, lenient};
use crate::stats::{DisplayMode, Stat, StatConfig, StatManager};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A snapshot of stat definitions that can be applied to any session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PresetRecord")]
pub struct StatPreset {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub stats: Vec<StatConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PresetRecord {
    #[serde(deserialize_with = "lenient::string")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    description: Option<String>,
    #[serde(deserialize_with = "lenient::integer", alias = "created_at")]
    created_at: Option<i64>,
    #[serde(deserialize_with = "lenient::integer", alias = "updated_at")]
    updated_at: Option<i64>,
    #[serde(deserialize_with = "lenient::items")]
    stats: Vec<StatConfig>,
}

impl From<PresetRecord> for StatPreset {
    fn from(record: PresetRecord) -> Self {
        let id = record
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| generate_id("preset"));
        let created_at = record.created_at.unwrap_or_else(now_millis);
        Self {
            name: record
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.clone()),
            id,
            description: record.description.unwrap_or_default(),
            created_at,
            updated_at: record.updated_at.unwrap_or(created_at),
            stats: record.stats,
        }
    }
}

impl StatPreset {
    pub fn new(name: &str, description: &str, stats: Vec<StatConfig>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id("preset"),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
            stats,
        }
    }

    /// Capture every stat in `manager`, current values included
    pub fn capture(name: &str, description: &str, manager: &StatManager) -> Self {
        Self::new(name, description, manager.iter().map(Stat::to_config).collect())
    }

    fn matches(&self, id_or_name: &str) -> bool {
        self.id == id_or_name || self.name.eq_ignore_ascii_case(id_or_name.trim())
    }
}

/// Ordered preset library
#[derive(Debug, Clone, Default)]
pub struct PresetManager {
    presets: Vec<StatPreset>,
}

impl PresetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library pre-filled with `rpg_basic` and `survival`
    pub fn with_builtins() -> Self {
        let mut manager = Self::new();
        for preset in builtin_presets() {
            manager.add(preset);
        }
        manager
    }

    /// Add a preset, replacing one with the same id
    pub fn add(&mut self, preset: StatPreset) {
        match self.presets.iter_mut().find(|p| p.id == preset.id) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<StatPreset> {
        let idx = self.presets.iter().position(|p| p.id == id)?;
        Some(self.presets.remove(idx))
    }

    /// Look up by id, then by case-insensitive name
    pub fn get(&self, id_or_name: &str) -> Option<&StatPreset> {
        self.presets
            .iter()
            .find(|p| p.id == id_or_name)
            .or_else(|| self.presets.iter().find(|p| p.matches(id_or_name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatPreset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Save `manager`'s stats under `name`
    ///
    /// A preset with the same name is overwritten in place, keeping its id.
    /// Returns the preset id.
    pub fn save_from(&mut self, name: &str, description: &str, manager: &StatManager) -> String {
        let snapshot = StatPreset::capture(name, description, manager);
        if let Some(existing) = self
            .presets
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
        {
            existing.description = snapshot.description;
            existing.stats = snapshot.stats;
            existing.updated_at = snapshot.updated_at.max(existing.created_at);
            tracing::info!("Updated preset {} ({})", existing.name, existing.id);
            return existing.id.clone();
        }

        let id = snapshot.id.clone();
        tracing::info!("Saved preset {} ({}) with {} stats", name, id, snapshot.stats.len());
        self.presets.push(snapshot);
        id
    }

    /// Replace the contents of `manager` with the preset's stats
    ///
    /// The new stat set is built before anything is cleared, so on error
    /// `manager` is untouched.
    pub fn apply_to(&self, id_or_name: &str, manager: &mut StatManager) -> Result<&StatPreset> {
        let preset = self
            .get(id_or_name)
            .ok_or_else(|| TallyError::PresetNotFound(id_or_name.to_string()))?;

        let stats: Vec<Stat> = preset.stats.iter().cloned().map(Stat::from).collect();
        manager.clear();
        for stat in stats {
            manager.add(stat);
        }

        tracing::info!("Applied preset {} ({} stats)", preset.name, manager.len());
        Ok(preset)
    }

    pub fn to_json(&self) -> Value {
        codec::encode(&self.presets)
    }

    /// Load a preset list; malformed entries are dropped individually
    pub fn from_json(value: &Value) -> Self {
        let presets = match value {
            Value::Array(entries) => entries
                .iter()
                .filter_map(|entry| codec::decode::<StatPreset>(entry).ok())
                .collect(),
            _ => {
                tracing::warn!("Preset data is not a list, starting empty");
                Vec::new()
            }
        };
        let mut manager = Self::new();
        for preset in presets {
            manager.add(preset);
        }
        manager
    }

    pub fn export_json(&self) -> String {
        self.to_json().to_string()
    }

    /// Merge presets from a JSON list, replacing any with matching ids
    ///
    /// Returns the number of presets imported.
    pub fn import_json(&mut self, json: &str) -> usize {
        let value: Value = codec::decode_str_or_else(json, "preset list", || Value::Null);
        let imported = Self::from_json(&value);
        let count = imported.len();
        for preset in imported.presets {
            self.add(preset);
        }
        count
    }
}

fn builtin_presets() -> Vec<StatPreset> {
    let gauge = |id: &str, name: &str, max: f64, color: &str, mode: DisplayMode| {
        StatConfig::new(id)
            .name(name)
            .bounds(0.0, max)
            .base(max)
            .color(color)
            .display(mode)
    };

    vec![
        StatPreset {
            id: "rpg_basic".into(),
            name: "RPG Basic".into(),
            description: "Health, mana and stamina".into(),
            created_at: 0,
            updated_at: 0,
            stats: vec![
                gauge("hp", "HP", 100.0, "#e74c3c", DisplayMode::Fraction).category("vitals"),
                gauge("mp", "MP", 50.0, "#3498db", DisplayMode::Fraction).category("vitals"),
                gauge("stamina", "Stamina", 100.0, "#2ecc71", DisplayMode::Percentage)
                    .category("vitals"),
            ],
        },
        StatPreset {
            id: "survival".into(),
            name: "Survival".into(),
            description: "Health plus hunger, thirst and energy needs".into(),
            created_at: 0,
            updated_at: 0,
            stats: vec![
                gauge("health", "Health", 100.0, "#e74c3c", DisplayMode::Fraction).category("vitals"),
                gauge("hunger", "Hunger", 100.0, "#e67e22", DisplayMode::Percentage).category("needs"),
                gauge("thirst", "Thirst", 100.0, "#3498db", DisplayMode::Percentage).category("needs"),
                gauge("energy", "Energy", 100.0, "#f1c40f", DisplayMode::Percentage).category("needs"),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins() {
        let presets = PresetManager::with_builtins();
        assert_eq!(presets.len(), 2);
        assert_eq!(presets.get("rpg_basic").map(|p| p.stats.len()), Some(3));
        assert_eq!(presets.get("survival").map(|p| p.stats.len()), Some(4));
        assert!(presets.get("RPG basic").is_some());
    }

    #[test]
    fn test_apply_replaces_stat_set() {
        let presets = PresetManager::with_builtins();
        let mut stats = StatManager::new();
        stats.add(Stat::new("luck", "Luck"));

        presets.apply_to("survival", &mut stats).unwrap();
        assert!(!stats.has("luck"));
        assert_eq!(stats.ids().collect::<Vec<_>>(), vec!["health", "hunger", "thirst", "energy"]);
    }

    #[test]
    fn test_apply_unknown_leaves_stats_alone() {
        let presets = PresetManager::with_builtins();
        let mut stats = StatManager::new();
        stats.add(Stat::new("luck", "Luck"));

        let err = presets.apply_to("nope", &mut stats);
        assert!(matches!(err, Err(TallyError::PresetNotFound(_))));
        assert!(stats.has("luck"));
    }

    #[test]
    fn test_save_captures_current_values() {
        let mut presets = PresetManager::new();
        let mut stats = StatManager::new();
        stats.add(Stat::new("hp", "Health")).modify(-40.0);

        let id = presets.save_from("Wounded", "after the ambush", &stats);
        let mut restored = StatManager::new();
        presets.apply_to(&id, &mut restored).unwrap();
        assert_eq!(restored.get("hp").map(|s| s.current_value()), Some(60.0));
    }

    #[test]
    fn test_save_same_name_overwrites() {
        let mut presets = PresetManager::new();
        let mut stats = StatManager::new();
        stats.add(Stat::new("hp", "Health"));
        let first = presets.save_from("Camp", "", &stats);

        stats.add(Stat::new("mp", "Mana"));
        let second = presets.save_from("camp", "", &stats);

        assert_eq!(first, second);
        assert_eq!(presets.len(), 1);
        assert_eq!(presets.get(&first).map(|p| p.stats.len()), Some(2));
    }

    #[test]
    fn test_json_roundtrip_keeps_order() {
        let presets = PresetManager::with_builtins();
        let json = presets.to_json();
        assert_eq!(json[0]["id"], "rpg_basic");
        assert_eq!(json[1]["id"], "survival");
        assert!(json[0]["createdAt"].is_i64());

        let back = PresetManager::from_json(&json);
        let ids: Vec<&str> = back.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["rpg_basic", "survival"]);
        assert_eq!(back.get("rpg_basic"), presets.get("rpg_basic"));
    }

    #[test]
    fn test_import_tolerates_garbage() {
        let mut presets = PresetManager::with_builtins();
        let count = presets.import_json(
            &json!([{ "id": "custom", "name": "Custom", "stats": [{ "id": "luck" }, 5] }, "junk"])
                .to_string(),
        );
        assert_eq!(count, 1);
        assert_eq!(presets.len(), 3);
        assert_eq!(presets.get("custom").map(|p| p.stats.len()), Some(1));

        assert_eq!(presets.import_json("{{{"), 0);
        assert_eq!(PresetManager::from_json(&json!({"a": 1})).len(), 0);
    }
}
