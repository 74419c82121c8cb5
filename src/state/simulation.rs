//! One simulated session: its stats, turn counter and metadata

use crate::core::types::{generate_id, now_millis, Timestamp, Turn};
use crate::persistence::{codec, lenient};
use crate::stats::StatManager;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SESSION_NAME: &str = "Session";

/// Outcome of advancing one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Turn number after the tick
    pub turn: Turn,
    /// Ids of modifiers that expired during the tick
    pub expired: Vec<String>,
}

/// The persisted unit of state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SimulationRecord")]
pub struct SimulationState {
    id: String,
    name: String,
    created_at: Timestamp,
    updated_at: Timestamp,
    turn_count: Turn,
    stat_manager: StatManager,
    metadata: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulationRecord {
    #[serde(deserialize_with = "lenient::string")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient::integer", alias = "created_at")]
    created_at: Option<i64>,
    #[serde(deserialize_with = "lenient::integer", alias = "updated_at")]
    updated_at: Option<i64>,
    #[serde(deserialize_with = "lenient::integer", alias = "turn_count")]
    turn_count: Option<i64>,
    #[serde(deserialize_with = "lenient::parsed", alias = "stat_manager")]
    stat_manager: Option<StatManager>,
    #[serde(deserialize_with = "lenient::object")]
    metadata: Map<String, Value>,
}

impl From<SimulationRecord> for SimulationState {
    fn from(record: SimulationRecord) -> Self {
        let created_at = record.created_at.unwrap_or_else(now_millis);
        Self {
            id: record
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| generate_id("sim")),
            name: record
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string()),
            created_at,
            updated_at: record.updated_at.unwrap_or(created_at).max(created_at),
            turn_count: record.turn_count.map_or(0, |t| t.max(0) as Turn),
            stat_manager: record.stat_manager.unwrap_or_default(),
            metadata: record.metadata,
        }
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_NAME)
    }
}

impl SimulationState {
    pub fn new(name: &str) -> Self {
        let now = now_millis();
        let name = if name.trim().is_empty() {
            DEFAULT_SESSION_NAME
        } else {
            name
        };
        Self {
            id: generate_id("sim"),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            turn_count: 0,
            stat_manager: StatManager::new(),
            metadata: Map::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn turn_count(&self) -> Turn {
        self.turn_count
    }

    pub fn stats(&self) -> &StatManager {
        &self.stat_manager
    }

    /// Mutable access to the stats; marks the state as updated
    pub fn stats_mut(&mut self) -> &mut StatManager {
        self.touch();
        &mut self.stat_manager
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }

    /// Advance one turn, expiring timed modifiers
    pub fn tick(&mut self) -> TickReport {
        let expired = self.stat_manager.tick();
        self.turn_count += 1;
        self.touch();
        tracing::debug!(
            "Session {} turn {} ({} modifiers expired)",
            self.id,
            self.turn_count,
            expired.len()
        );
        TickReport {
            turn: self.turn_count,
            expired,
        }
    }

    /// Return every stat to its base value, drop all modifiers and restart
    /// the turn counter
    pub fn reset(&mut self) {
        self.stat_manager.reset_all();
        self.stat_manager.clear_modifiers();
        self.turn_count = 0;
        self.touch();
    }

    pub fn to_json(&self) -> Value {
        codec::encode(self)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Rebuild from persisted data; unusable input yields a fresh session
    pub fn from_json(value: &Value) -> Self {
        codec::decode_or_else(value, "simulation state", SimulationState::default)
    }

    pub fn from_json_str(json: &str) -> Self {
        codec::decode_str_or_else(json, "simulation state", SimulationState::default)
    }
}
