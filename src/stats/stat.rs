//! A single bounded, named quantity

use crate::core::numeric::{clamp, to_number, SafeMath};
use crate::core::types::sanitize_stat_id;
use crate::persistence::{codec, lenient};
use crate::stats::collection::ModifierCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MIN: f64 = 0.0;
pub const DEFAULT_MAX: f64 = 100.0;
pub const DEFAULT_COLOR: &str = "#4a90d9";
pub const DEFAULT_CATEGORY: &str = "general";

/// How a stat renders in listings and context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Rounded value, e.g. `80`
    #[default]
    Number,
    /// Rounded value over rounded max, e.g. `80/100`
    Fraction,
    /// Rounded percentage of the range, e.g. `80%`
    Percentage,
    /// Rendered graphically by the host; no text form
    Bar,
    /// Tracked but never listed
    Hidden,
}

/// Outcome of a single mutation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeResult {
    pub old_value: f64,
    pub new_value: f64,
    /// Post-clamp delta, not the requested one
    pub actual_change: f64,
}

/// Loosely typed stat definition used by configs, presets and persisted data
///
/// Missing or malformed fields fall back to defaults when a [`Stat`] is
/// built from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatConfig {
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        deserialize_with = "lenient::number",
        alias = "base_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_value: Option<f64>,
    #[serde(
        deserialize_with = "lenient::number",
        alias = "current_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_value: Option<f64>,
    #[serde(
        deserialize_with = "lenient::number",
        alias = "min_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_value: Option<f64>,
    #[serde(
        deserialize_with = "lenient::number",
        alias = "max_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_value: Option<f64>,
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        deserialize_with = "lenient::parsed",
        alias = "display_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_mode: Option<DisplayMode>,
    #[serde(
        rename = "showInUI",
        deserialize_with = "lenient::boolean",
        alias = "show_in_ui",
        alias = "showInUi",
        skip_serializing_if = "Option::is_none"
    )]
    pub show_in_ui: Option<bool>,
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl StatConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn base(mut self, value: f64) -> Self {
        self.base_value = Some(value);
        self
    }

    pub fn current(mut self, value: f64) -> Self {
        self.current_value = Some(value);
        self
    }

    pub fn display(mut self, mode: DisplayMode) -> Self {
        self.display_mode = Some(mode);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.show_in_ui = Some(visible);
        self
    }
}

/// A bounded numeric quantity such as health or mana
///
/// `current_value` stays inside `[min_value, max_value]` after every
/// mutation. Active modifiers are layered on top by [`Stat::final_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StatConfig")]
pub struct Stat {
    id: String,
    name: String,
    base_value: f64,
    current_value: f64,
    min_value: f64,
    max_value: f64,
    color: String,
    display_mode: DisplayMode,
    #[serde(rename = "showInUI")]
    show_in_ui: bool,
    category: String,
    #[serde(skip)]
    last_change: f64,
    #[serde(skip)]
    modifiers: ModifierCollection,
}

impl From<StatConfig> for Stat {
    fn from(config: StatConfig) -> Self {
        let raw_id = config
            .id
            .as_deref()
            .or(config.name.as_deref())
            .unwrap_or_default();
        let id = sanitize_stat_id(raw_id);

        let (mut min, mut max) = (
            to_number(config.min_value.unwrap_or(DEFAULT_MIN), DEFAULT_MIN),
            to_number(config.max_value.unwrap_or(DEFAULT_MAX), DEFAULT_MAX),
        );
        if min > max {
            tracing::warn!("Stat {}: min {} > max {}, swapping", id, min, max);
            std::mem::swap(&mut min, &mut max);
        }

        let base = clamp(to_number(config.base_value.unwrap_or(max), max), min, max);
        let current = clamp(to_number(config.current_value.unwrap_or(base), base), min, max);

        Self {
            name: config
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.clone()),
            modifiers: ModifierCollection::new(&id),
            id,
            base_value: base,
            current_value: current,
            min_value: min,
            max_value: max,
            color: config
                .color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            display_mode: config.display_mode.unwrap_or_default(),
            show_in_ui: config.show_in_ui.unwrap_or(true),
            category: config
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            last_change: 0.0,
        }
    }
}

impl Default for Stat {
    fn default() -> Self {
        Stat::from(StatConfig::default())
    }
}

impl Stat {
    /// Create a stat with default bounds `[0, 100]`, starting full
    pub fn new(id: &str, name: &str) -> Self {
        Stat::from(StatConfig::new(id).name(name))
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.set_bounds(min, max);
        self
    }

    /// Set both the base and the current value
    pub fn with_value(mut self, value: f64) -> Self {
        self.set_base(value);
        self.set(value);
        self.last_change = 0.0;
        self
    }

    pub fn with_display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    pub fn show_in_ui(&self) -> bool {
        self.show_in_ui
    }

    pub fn set_show_in_ui(&mut self, visible: bool) {
        self.show_in_ui = visible;
    }

    /// Listed to the user and surfaced in context
    pub fn is_visible(&self) -> bool {
        self.show_in_ui && self.display_mode != DisplayMode::Hidden
    }

    /// Signed delta of the most recent mutation
    pub fn last_change(&self) -> f64 {
        self.last_change
    }

    pub fn modifiers(&self) -> &ModifierCollection {
        &self.modifiers
    }

    pub fn modifiers_mut(&mut self) -> &mut ModifierCollection {
        &mut self.modifiers
    }

    pub(crate) fn replace_modifiers(&mut self, modifiers: ModifierCollection) {
        self.modifiers = modifiers;
    }

    /// Externally visible value: current value with modifiers, clamped
    pub fn final_value(&self) -> f64 {
        clamp(
            self.modifiers.apply_all(self.current_value),
            self.min_value,
            self.max_value,
        )
    }

    /// Set the current value, clamped into bounds
    pub fn set(&mut self, value: f64) -> ChangeResult {
        let old_value = self.current_value;
        let target = to_number(value, old_value);
        let new_value = clamp(target, self.min_value, self.max_value);
        let actual_change = SafeMath::subtract(new_value, old_value);

        self.current_value = new_value;
        self.last_change = actual_change;

        ChangeResult {
            old_value,
            new_value,
            actual_change,
        }
    }

    /// Shift the current value by `delta`, clamped into bounds
    pub fn modify(&mut self, delta: f64) -> ChangeResult {
        let delta = to_number(delta, 0.0);
        self.set(SafeMath::add(self.current_value, delta))
    }

    /// Return to the base value
    pub fn reset(&mut self) -> ChangeResult {
        self.set(self.base_value)
    }

    /// Change the reset target (clamped into bounds); current value is untouched
    pub fn set_base(&mut self, value: f64) {
        let value = to_number(value, self.base_value);
        self.base_value = clamp(value, self.min_value, self.max_value);
    }

    /// Replace the bounds, swapping reversed input, and re-clamp
    pub fn set_bounds(&mut self, min: f64, max: f64) {
        let (mut min, mut max) = (
            to_number(min, self.min_value),
            to_number(max, self.max_value),
        );
        if min > max {
            tracing::warn!("Stat {}: min {} > max {}, swapping", self.id, min, max);
            std::mem::swap(&mut min, &mut max);
        }
        self.min_value = min;
        self.max_value = max;
        self.base_value = clamp(self.base_value, min, max);
        self.current_value = clamp(self.current_value, min, max);
    }

    /// Position of the final value within the range, 0..=100
    ///
    /// A degenerate range (`max <= min`) counts as full.
    pub fn percentage(&self) -> f64 {
        let range = self.max_value - self.min_value;
        if range <= 0.0 {
            return 100.0;
        }
        let ratio = SafeMath::divide(self.final_value() - self.min_value, range, 0.0);
        clamp(ratio * 100.0, 0.0, 100.0)
    }

    pub fn is_empty(&self) -> bool {
        self.final_value() <= self.min_value
    }

    pub fn is_full(&self) -> bool {
        self.final_value() >= self.max_value
    }

    /// Text form per display mode; empty for `Bar` and `Hidden`
    pub fn display_string(&self) -> String {
        match self.display_mode {
            DisplayMode::Number => format!("{}", round_display(self.final_value())),
            DisplayMode::Fraction => format!(
                "{}/{}",
                round_display(self.final_value()),
                round_display(self.max_value)
            ),
            DisplayMode::Percentage => format!("{}%", round_display(self.percentage())),
            DisplayMode::Bar | DisplayMode::Hidden => String::new(),
        }
    }

    /// Snapshot of the definition and current value
    pub fn to_config(&self) -> StatConfig {
        StatConfig {
            id: Some(self.id.clone()),
            name: Some(self.name.clone()),
            base_value: Some(self.base_value),
            current_value: Some(self.current_value),
            min_value: Some(self.min_value),
            max_value: Some(self.max_value),
            color: Some(self.color.clone()),
            display_mode: Some(self.display_mode),
            show_in_ui: Some(self.show_in_ui),
            category: Some(self.category.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        codec::encode(self)
    }

    /// Rebuild from persisted data; anything unusable becomes a default stat
    pub fn from_json(value: &Value) -> Self {
        codec::decode_or_else(value, "stat", Stat::default)
    }
}

fn round_display(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::modifier::StatModifier;
    use serde_json::json;

    fn hp() -> Stat {
        Stat::new("hp", "Health")
    }

    #[test]
    fn test_non_finite_config_falls_back_to_defaults() {
        let stat = Stat::from(StatConfig::new("x").bounds(f64::NAN, f64::INFINITY));
        assert_eq!(stat.min_value(), DEFAULT_MIN);
        assert_eq!(stat.max_value(), DEFAULT_MAX);
        assert_eq!(stat.base_value(), DEFAULT_MAX);
        assert_eq!(stat.current_value(), DEFAULT_MAX);
        assert_eq!(stat.final_value(), DEFAULT_MAX);
        assert_eq!(stat.display_string(), "100");

        let stat = Stat::from(
            StatConfig::new("y")
                .bounds(-10.0, 10.0)
                .base(f64::NAN)
                .current(f64::NEG_INFINITY),
        );
        assert_eq!(stat.base_value(), 10.0);
        assert_eq!(stat.current_value(), 10.0);

        let stat = Stat::from(StatConfig::new("z").base(40.0).current(f64::NAN));
        assert_eq!(stat.current_value(), 40.0);
    }

    #[test]
    fn test_defaults() {
        let stat = hp();
        assert_eq!(stat.id(), "hp");
        assert_eq!(stat.min_value(), 0.0);
        assert_eq!(stat.max_value(), 100.0);
        assert_eq!(stat.current_value(), 100.0);
        assert_eq!(stat.base_value(), 100.0);
        assert!(stat.is_visible());
    }

    #[test]
    fn test_modify_clamps_and_reports_actual_change() {
        let mut stat = hp().with_value(95.0);
        let change = stat.modify(10.0);
        assert_eq!(change.old_value, 95.0);
        assert_eq!(change.new_value, 100.0);
        assert_eq!(change.actual_change, 5.0);
        assert_eq!(stat.last_change(), 5.0);

        let change = stat.modify(-250.0);
        assert_eq!(change.new_value, 0.0);
        assert_eq!(change.actual_change, -100.0);
    }

    #[test]
    fn test_set_and_reset() {
        let mut stat = hp().with_value(80.0);
        stat.set(20.0);
        assert_eq!(stat.current_value(), 20.0);
        let change = stat.reset();
        assert_eq!(change.new_value, 80.0);
        assert_eq!(change.actual_change, 60.0);
    }

    #[test]
    fn test_set_ignores_non_finite() {
        let mut stat = hp().with_value(40.0);
        stat.set(f64::NAN);
        assert_eq!(stat.current_value(), 40.0);
        stat.modify(f64::INFINITY);
        assert_eq!(stat.current_value(), 40.0);
    }

    #[test]
    fn test_bounds_swap_and_reclamp() {
        let mut stat = hp().with_value(90.0);
        stat.set_bounds(50.0, 10.0);
        assert_eq!(stat.min_value(), 10.0);
        assert_eq!(stat.max_value(), 50.0);
        assert_eq!(stat.current_value(), 50.0);
    }

    #[test]
    fn test_construction_swaps_bounds() {
        let stat = Stat::from(StatConfig::new("x").bounds(10.0, -10.0).base(0.0));
        assert_eq!(stat.min_value(), -10.0);
        assert_eq!(stat.max_value(), 10.0);
        assert_eq!(stat.current_value(), 0.0);
    }

    #[test]
    fn test_percentage_degenerate_range_is_full() {
        let stat = Stat::from(StatConfig::new("x").bounds(5.0, 5.0));
        assert_eq!(stat.percentage(), 100.0);
    }

    #[test]
    fn test_display_strings() {
        let mut stat = hp().with_value(72.6);
        assert_eq!(stat.display_string(), "73");

        stat.set_display_mode(DisplayMode::Fraction);
        assert_eq!(stat.display_string(), "73/100");

        stat.set_display_mode(DisplayMode::Percentage);
        assert_eq!(stat.display_string(), "73%");

        stat.set_display_mode(DisplayMode::Bar);
        assert_eq!(stat.display_string(), "");

        stat.set_display_mode(DisplayMode::Hidden);
        assert_eq!(stat.display_string(), "");
        assert!(!stat.is_visible());
    }

    #[test]
    fn test_final_value_includes_modifiers() {
        let mut stat = hp().with_value(50.0);
        stat.modifiers_mut().add(StatModifier::add("hp", 20.0));
        assert_eq!(stat.current_value(), 50.0);
        assert_eq!(stat.final_value(), 70.0);

        stat.modifiers_mut().add(StatModifier::multiply("hp", 3.0));
        assert_eq!(stat.final_value(), 100.0);
    }

    #[test]
    fn test_json_shape() {
        let json = hp().to_json();
        assert_eq!(json["id"], "hp");
        assert_eq!(json["name"], "Health");
        assert_eq!(json["baseValue"], 100.0);
        assert_eq!(json["displayMode"], "number");
        assert_eq!(json["showInUI"], true);
        assert!(json.get("modifiers").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut stat = Stat::from(
            StatConfig::new("mp")
                .name("Mana")
                .bounds(0.0, 50.0)
                .display(DisplayMode::Fraction),
        );
        stat.modify(-12.5);

        let back = Stat::from_json(&stat.to_json());
        assert_eq!(back.id(), stat.id());
        assert_eq!(back.name(), stat.name());
        assert_eq!(back.base_value(), stat.base_value());
        assert_eq!(back.current_value(), 37.5);
        assert_eq!(back.min_value(), stat.min_value());
        assert_eq!(back.max_value(), stat.max_value());
        assert_eq!(back.display_mode(), stat.display_mode());
    }

    #[test]
    fn test_from_json_partial_and_malformed() {
        let stat = Stat::from_json(&json!({
            "id": "Stamina",
            "maxValue": "not a number",
            "currentValue": 250,
            "displayMode": "sparkles"
        }));
        assert_eq!(stat.id(), "stamina");
        assert_eq!(stat.max_value(), 100.0);
        assert_eq!(stat.current_value(), 100.0);
        assert_eq!(stat.display_mode(), DisplayMode::Number);

        let fallback = Stat::from_json(&json!("garbage"));
        assert_eq!(fallback.id(), "stat");
    }
}
