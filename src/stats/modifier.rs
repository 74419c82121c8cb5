//! Timed and stacking numeric effects layered onto a stat

use crate::core::numeric::{to_number, to_positive_int, SafeMath};
use crate::core::types::{generate_id, now_millis, sanitize_stat_id, Timestamp};
use crate::persistence::{codec, lenient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Duration sentinel for modifiers that never expire
pub const PERMANENT: i64 = -1;

/// How a modifier combines with the value beneath it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierType {
    /// Added to the base value
    #[default]
    Add,
    /// Multiplies the value after all additions
    Multiply,
    /// Replaces the value outright; ignores stacks and other modifiers
    Override,
}

/// A buff or debuff on a single stat
///
/// Effective magnitude is `value * current_stacks` for `Add`/`Multiply` and
/// plain `value` for `Override`. A modifier with a negative duration is
/// permanent; otherwise `remaining_duration` counts down once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ModifierConfig")]
pub struct StatModifier {
    id: String,
    name: Option<String>,
    stat_id: String,
    #[serde(rename = "type")]
    modifier_type: ModifierType,
    value: f64,
    duration: i64,
    max_stacks: u32,
    current_stacks: u32,
    source: String,
    created_at: Timestamp,
    remaining_duration: i64,
}

/// Loosely typed modifier description, as found in persisted data
///
/// Every field is optional and malformed fields are treated as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModifierConfig {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string", alias = "stat_id")]
    pub stat_id: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient::parsed")]
    pub modifier_type: Option<ModifierType>,
    #[serde(deserialize_with = "lenient::number")]
    pub value: Option<f64>,
    #[serde(deserialize_with = "lenient::integer")]
    pub duration: Option<i64>,
    #[serde(deserialize_with = "lenient::number", alias = "max_stacks")]
    pub max_stacks: Option<f64>,
    #[serde(deserialize_with = "lenient::number", alias = "current_stacks")]
    pub current_stacks: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient::integer", alias = "created_at")]
    pub created_at: Option<i64>,
    #[serde(deserialize_with = "lenient::integer", alias = "remaining_duration")]
    pub remaining_duration: Option<i64>,
}

impl From<ModifierConfig> for StatModifier {
    fn from(config: ModifierConfig) -> Self {
        let duration = match config.duration {
            Some(d) if d >= 0 => d,
            _ => PERMANENT,
        };
        let max_stacks = to_positive_int(config.max_stacks.unwrap_or(1.0), 1);
        let current_stacks = config
            .current_stacks
            .map(|s| to_number(s, 1.0).floor().clamp(0.0, f64::from(max_stacks)) as u32)
            .unwrap_or(1);
        let remaining_duration = if duration < 0 {
            PERMANENT
        } else {
            config.remaining_duration.unwrap_or(duration).clamp(0, duration)
        };

        Self {
            id: config
                .id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| generate_id("mod")),
            name: config.name.filter(|n| !n.trim().is_empty()),
            stat_id: sanitize_stat_id(config.stat_id.as_deref().unwrap_or_default()),
            modifier_type: config.modifier_type.unwrap_or_default(),
            value: to_number(config.value.unwrap_or(0.0), 0.0),
            duration,
            max_stacks,
            current_stacks,
            source: config.source.unwrap_or_default(),
            created_at: config.created_at.unwrap_or_else(now_millis),
            remaining_duration,
        }
    }
}

impl StatModifier {
    /// Create a permanent single-stack modifier with a generated id
    pub fn new(stat_id: &str, modifier_type: ModifierType, value: f64) -> Self {
        Self {
            id: generate_id("mod"),
            name: None,
            stat_id: sanitize_stat_id(stat_id),
            modifier_type,
            value: to_number(value, 0.0),
            duration: PERMANENT,
            max_stacks: 1,
            current_stacks: 1,
            source: String::new(),
            created_at: now_millis(),
            remaining_duration: PERMANENT,
        }
    }

    pub fn add(stat_id: &str, value: f64) -> Self {
        Self::new(stat_id, ModifierType::Add, value)
    }

    pub fn multiply(stat_id: &str, factor: f64) -> Self {
        Self::new(stat_id, ModifierType::Multiply, factor)
    }

    pub fn override_value(stat_id: &str, value: f64) -> Self {
        Self::new(stat_id, ModifierType::Override, value)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.id = id.trim().to_string();
        }
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the lifetime in turns; a negative duration makes it permanent
    pub fn with_duration(mut self, turns: i64) -> Self {
        self.duration = if turns < 0 { PERMANENT } else { turns };
        self.remaining_duration = self.duration;
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = max_stacks.max(1);
        self.current_stacks = self.current_stacks.min(self.max_stacks);
        self
    }

    pub fn with_stacks(mut self, stacks: u32) -> Self {
        self.current_stacks = stacks.min(self.max_stacks);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name for display, falling back to the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn stat_id(&self) -> &str {
        &self.stat_id
    }

    pub(crate) fn set_stat_id(&mut self, stat_id: &str) {
        self.stat_id = stat_id.to_string();
    }

    pub fn modifier_type(&self) -> ModifierType {
        self.modifier_type
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn remaining_duration(&self) -> i64 {
        self.remaining_duration
    }

    pub fn max_stacks(&self) -> u32 {
        self.max_stacks
    }

    pub fn current_stacks(&self) -> u32 {
        self.current_stacks
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn is_permanent(&self) -> bool {
        self.duration < 0
    }

    /// Whether the modifier currently contributes to its stat
    ///
    /// Zero stacks or an exhausted timer make it inactive.
    pub fn is_active(&self) -> bool {
        self.current_stacks > 0 && (self.is_permanent() || self.remaining_duration > 0)
    }

    /// Magnitude after stacking; overrides never scale with stacks
    pub fn effective_value(&self) -> f64 {
        match self.modifier_type {
            ModifierType::Override => self.value,
            ModifierType::Add | ModifierType::Multiply => {
                SafeMath::multiply(self.value, f64::from(self.current_stacks))
            }
        }
    }

    /// Apply this modifier alone to `base`
    pub fn apply(&self, base: f64) -> f64 {
        match self.modifier_type {
            ModifierType::Add => SafeMath::add(base, self.effective_value()),
            ModifierType::Multiply => SafeMath::multiply(base, self.effective_value()),
            ModifierType::Override => self.effective_value(),
        }
    }

    /// Add stacks (capped at `max_stacks`) and restart a timed modifier's clock
    ///
    /// Returns the new stack count.
    pub fn add_stacks(&mut self, count: u32) -> u32 {
        self.current_stacks = self.current_stacks.saturating_add(count).min(self.max_stacks);
        self.refresh();
        self.current_stacks
    }

    /// Remove stacks, flooring at zero. Returns the new stack count.
    pub fn remove_stacks(&mut self, count: u32) -> u32 {
        self.current_stacks = self.current_stacks.saturating_sub(count);
        self.current_stacks
    }

    /// Restart the countdown of a timed modifier
    pub fn refresh(&mut self) {
        if !self.is_permanent() {
            self.remaining_duration = self.duration;
        }
    }

    /// Advance one turn; returns whether the modifier is still active
    pub fn tick(&mut self) -> bool {
        if self.is_permanent() {
            return true;
        }
        self.remaining_duration = (self.remaining_duration - 1).max(0);
        self.remaining_duration > 0
    }

    pub fn to_json(&self) -> Value {
        codec::encode(self)
    }

    /// Rebuild from persisted data; malformed input yields an inert
    /// zero-valued `Add` modifier
    pub fn from_json(value: &Value) -> Self {
        codec::decode_or_else(value, "modifier", || {
            StatModifier::from(ModifierConfig::default())
        })
    }
}

impl fmt::Display for StatModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.effective_value();
        match self.modifier_type {
            ModifierType::Add if magnitude >= 0.0 => write!(f, "{} +{}", self.label(), magnitude)?,
            ModifierType::Add => write!(f, "{} {}", self.label(), magnitude)?,
            ModifierType::Multiply => write!(f, "{} x{}", self.label(), magnitude)?,
            ModifierType::Override => write!(f, "{} ={}", self.label(), magnitude)?,
        }
        if self.max_stacks > 1 {
            write!(f, " [{}/{} stacks]", self.current_stacks, self.max_stacks)?;
        }
        if self.is_permanent() {
            Ok(())
        } else {
            write!(f, " ({} turns left)", self.remaining_duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_with_non_finite_numbers() {
        let m = StatModifier::from(ModifierConfig {
            stat_id: Some("hp".into()),
            value: Some(f64::NAN),
            current_stacks: Some(f64::INFINITY),
            ..ModifierConfig::default()
        });
        assert_eq!(m.value(), 0.0);
        assert_eq!(m.current_stacks(), 1);
        assert_eq!(m.apply(40.0), 40.0);
    }

    #[test]
    fn test_effective_value_scales_with_stacks() {
        let m = StatModifier::add("hp", 5.0).with_max_stacks(3).with_stacks(3);
        assert_eq!(m.effective_value(), 15.0);
        assert_eq!(m.apply(100.0), 115.0);
    }

    #[test]
    fn test_override_ignores_stacks() {
        let m = StatModifier::override_value("hp", 50.0)
            .with_max_stacks(5)
            .with_stacks(4);
        assert_eq!(m.effective_value(), 50.0);
        assert_eq!(m.apply(999.0), 50.0);
    }

    #[test]
    fn test_multiply_apply() {
        let m = StatModifier::multiply("hp", 1.5);
        assert_eq!(m.apply(110.0), 165.0);
    }

    #[test]
    fn test_timed_modifier_expires_on_third_tick() {
        let mut m = StatModifier::add("hp", 10.0).with_duration(3);
        assert!(m.is_active());
        assert!(m.tick());
        assert!(m.tick());
        assert!(!m.tick());
        assert!(!m.is_active());
        assert_eq!(m.remaining_duration(), 0);
        assert!(!m.tick());
        assert_eq!(m.remaining_duration(), 0);
    }

    #[test]
    fn test_permanent_never_expires() {
        let mut m = StatModifier::add("hp", 10.0).with_duration(-1);
        for _ in 0..1000 {
            assert!(m.tick());
        }
        assert!(m.is_active());
    }

    #[test]
    fn test_add_stacks_caps_and_refreshes() {
        let mut m = StatModifier::add("hp", 2.0)
            .with_duration(5)
            .with_max_stacks(3);
        m.tick();
        m.tick();
        assert_eq!(m.remaining_duration(), 3);

        assert_eq!(m.add_stacks(1), 2);
        assert_eq!(m.remaining_duration(), 5);
        assert_eq!(m.add_stacks(10), 3);
    }

    #[test]
    fn test_zero_stacks_is_inactive() {
        let mut m = StatModifier::add("hp", 2.0).with_max_stacks(2);
        assert_eq!(m.remove_stacks(5), 0);
        assert!(!m.is_active());
    }

    #[test]
    fn test_serialized_shape() {
        let m = StatModifier::multiply("hp", 1.5)
            .with_id("rage")
            .with_name("Rage")
            .with_duration(2)
            .with_source("potion")
            .with_created_at(1000);
        let json = m.to_json();
        assert_eq!(json["id"], "rage");
        assert_eq!(json["statId"], "hp");
        assert_eq!(json["type"], "MULTIPLY");
        assert_eq!(json["maxStacks"], 1);
        assert_eq!(json["currentStacks"], 1);
        assert_eq!(json["remainingDuration"], 2);
        assert_eq!(json["createdAt"], 1000);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let m = StatModifier::from_json(&json!({ "statId": "MP", "value": "3" }));
        assert_eq!(m.stat_id(), "mp");
        assert_eq!(m.value(), 3.0);
        assert_eq!(m.modifier_type(), ModifierType::Add);
        assert!(m.is_permanent());
        assert_eq!(m.current_stacks(), 1);
        assert!(!m.id().is_empty());
    }

    #[test]
    fn test_from_json_clamps_stacks_and_timer() {
        let m = StatModifier::from_json(&json!({
            "statId": "hp",
            "type": "ADD",
            "duration": 3,
            "remainingDuration": 10,
            "maxStacks": 2,
            "currentStacks": 9
        }));
        assert_eq!(m.remaining_duration(), 3);
        assert_eq!(m.current_stacks(), 2);
    }

    #[test]
    fn test_from_json_garbage() {
        let m = StatModifier::from_json(&json!("garbage"));
        assert_eq!(m.value(), 0.0);
        assert_eq!(m.modifier_type(), ModifierType::Add);
    }

    #[test]
    fn test_display() {
        let m = StatModifier::add("hp", 10.0).with_name("Blessing").with_duration(3);
        assert_eq!(m.to_string(), "Blessing +10 (3 turns left)");
    }
}
