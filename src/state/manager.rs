//! Orchestrates parsing, command application, turns and presets for one
//! session
//!
//! The host owns a `StateManager` and calls into it explicitly: feed message
//! text to [`StateManager::process_message`], advance turns with
//! [`StateManager::tick`], and persist [`StateManager::state`] between calls.

use crate::command::{
    CommandExecutor, CommandOutcome, CommandParser, CommandType, ParsedCommand, StatChange,
};
use crate::core::config::{ParserConfig, TrackerConfig};
use crate::core::error::{Result, TallyError};
use crate::state::events::{ListenerError, ListenerHandle, ObserverRegistry, StateEvent};
use crate::state::preset::PresetManager;
use crate::state::simulation::{SimulationState, TickReport, DEFAULT_SESSION_NAME};
use crate::stats::{Stat, StatManager};
use ahash::AHashMap;
use std::collections::VecDeque;

/// Result of processing one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessResult {
    /// One entry per valid command, in textual order
    pub outcomes: Vec<CommandOutcome>,
    /// The message with command tokens removed
    pub stripped_text: String,
}

impl ProcessResult {
    pub fn changes(&self) -> impl Iterator<Item = &StatChange> {
        self.outcomes.iter().filter_map(|o| o.change.as_ref())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.outcomes.iter().filter(|o| !o.is_applied())
    }

    /// True if no command was found (or the tracker is disabled)
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Session owner: configuration, parser, live state, presets and listeners
#[derive(Debug)]
pub struct StateManager {
    config: TrackerConfig,
    parser: CommandParser,
    state: SimulationState,
    presets: PresetManager,
    history: VecDeque<StatChange>,
    stat_listeners: ObserverRegistry<StatChange>,
    state_listeners: ObserverRegistry<StateEvent>,
    /// Handles are shared between both registries
    next_handle: u64,
}

impl StateManager {
    /// Create a manager with a fresh session built from `config`
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let parser = CommandParser::new(config.parser.clone())?;
        let mut manager = Self {
            config,
            parser,
            state: SimulationState::default(),
            presets: PresetManager::with_builtins(),
            history: VecDeque::new(),
            stat_listeners: ObserverRegistry::new(),
            state_listeners: ObserverRegistry::new(),
            next_handle: 1,
        };
        manager.new_session(DEFAULT_SESSION_NAME);
        Ok(manager)
    }

    /// Replace the active session with a fresh one
    ///
    /// The new session gets the configured default preset if it exists,
    /// otherwise the configured stats.
    pub fn new_session(&mut self, name: &str) {
        let mut state = SimulationState::new(name);

        let seeded = match self.config.default_preset.as_deref() {
            Some(preset) => match self.presets.apply_to(preset, state.stats_mut()) {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("{}, using configured stats", e);
                    false
                }
            },
            None => false,
        };
        if !seeded {
            for stat in &self.config.stats {
                state.stats_mut().add(stat.clone());
            }
        }

        tracing::info!("New session {} with {} stats", state.id(), state.stats().len());
        self.history.clear();
        self.state = state;
        let event = StateEvent::SessionCreated {
            id: self.state.id().to_string(),
        };
        self.emit(event);
    }

    /// Make a previously persisted session the active one
    pub fn load_state(&mut self, state: SimulationState) {
        tracing::info!(
            "Loaded session {} at turn {} ({} stats)",
            state.id(),
            state.turn_count(),
            state.stats().len()
        );
        self.history.clear();
        self.state = state;
        let event = StateEvent::SessionLoaded {
            id: self.state.id().to_string(),
        };
        self.emit(event);
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Replace the configuration, re-validating the grammar
    ///
    /// On error nothing changes.
    pub fn set_config(&mut self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.parser.set_config(config.parser.clone())?;
        self.config = config;
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
        Ok(())
    }

    pub fn set_parser_config(&mut self, parser: ParserConfig) -> Result<()> {
        self.parser.set_config(parser.clone())?;
        self.config.parser = parser;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn stats(&self) -> &StatManager {
        self.state.stats()
    }

    pub fn visible_stats(&self) -> Vec<&Stat> {
        self.state.stats().get_visible()
    }

    pub fn presets(&self) -> &PresetManager {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetManager {
        &mut self.presets
    }

    /// Applied changes, oldest first, capped at `history_limit`
    pub fn recent_changes(&self) -> impl Iterator<Item = &StatChange> {
        self.history.iter()
    }

    /// Parse `text` and apply every valid command in order
    ///
    /// Repeated commands for the same stat are all applied. A disabled
    /// tracker returns an empty result and leaves `text` untouched.
    pub fn process_message(&mut self, text: &str) -> ProcessResult {
        if !self.config.enabled {
            return ProcessResult {
                outcomes: Vec::new(),
                stripped_text: text.to_string(),
            };
        }

        let commands = self.parser.parse_valid(text);
        let stripped_text = self.parser.strip_commands(text);
        if commands.is_empty() {
            return ProcessResult {
                outcomes: Vec::new(),
                stripped_text,
            };
        }

        let outcomes = CommandExecutor::execute(self.state.stats_mut(), &commands);
        for change in outcomes.iter().filter_map(|o| o.change.as_ref()) {
            self.record(change);
            self.stat_listeners.dispatch(change);
        }

        let applied = outcomes.iter().filter(|o| o.is_applied()).count();
        let failed = outcomes.len() - applied;
        tracing::debug!("Message applied {} commands, {} failed", applied, failed);
        self.emit(StateEvent::MessageProcessed { applied, failed });

        ProcessResult {
            outcomes,
            stripped_text,
        }
    }

    /// Shift one stat directly, as a host UI action would
    ///
    /// Recorded and broadcast exactly like a parsed command.
    pub fn modify_stat(&mut self, stat_id: &str, delta: f64) -> Result<StatChange> {
        self.apply_direct(stat_id, delta, CommandType::Modify)
    }

    /// Set one stat directly, as a host UI action would
    pub fn set_stat(&mut self, stat_id: &str, value: f64) -> Result<StatChange> {
        self.apply_direct(stat_id, value, CommandType::Set)
    }

    fn apply_direct(
        &mut self,
        stat_id: &str,
        value: f64,
        command_type: CommandType,
    ) -> Result<StatChange> {
        let command = ParsedCommand {
            raw: self.parser.format_command(stat_id, value, command_type),
            stat_id: stat_id.to_string(),
            value,
            command_type,
            valid: true,
            error: None,
        };
        let change = CommandExecutor::apply(self.state.stats_mut(), &command)
            .change
            .ok_or_else(|| TallyError::StatNotFound(stat_id.to_string()))?;
        self.record(&change);
        self.stat_listeners.dispatch(&change);
        Ok(change)
    }

    /// First valid command per stat, without applying anything
    pub fn get_stat_changes(&self, text: &str) -> AHashMap<String, ParsedCommand> {
        self.parser.get_stat_changes(text)
    }

    /// Advance the session one turn
    pub fn tick(&mut self) -> TickReport {
        let report = self.state.tick();
        self.emit(StateEvent::TurnAdvanced {
            turn: report.turn,
            expired: report.expired.clone(),
        });
        report
    }

    /// Return every stat to base, clear modifiers and restart turns
    pub fn reset(&mut self) {
        self.state.reset();
        self.history.clear();
        tracing::info!("Session {} reset", self.state.id());
        self.emit(StateEvent::Reset);
    }

    /// Replace the session's stats with a preset's
    pub fn apply_preset(&mut self, id_or_name: &str) -> Result<()> {
        let preset_id = self
            .presets
            .apply_to(id_or_name, self.state.stats_mut())?
            .id
            .clone();
        self.emit(StateEvent::PresetApplied { preset_id });
        Ok(())
    }

    /// Save the current stats as a preset, returning its id
    pub fn save_as_preset(&mut self, name: &str, description: &str) -> String {
        let preset_id = self.presets.save_from(name, description, self.state.stats());
        self.emit(StateEvent::PresetSaved {
            preset_id: preset_id.clone(),
        });
        preset_id
    }

    pub fn on_stat_change<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: FnMut(&StatChange) -> std::result::Result<(), ListenerError> + Send + 'static,
    {
        let handle = self.issue_handle();
        self.stat_listeners.attach(handle, listener);
        handle
    }

    pub fn on_state_event<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: FnMut(&StateEvent) -> std::result::Result<(), ListenerError> + Send + 'static,
    {
        let handle = self.issue_handle();
        self.state_listeners.attach(handle, listener);
        handle
    }

    /// Remove a listener registered with either `on_*` method
    pub fn unregister(&mut self, handle: ListenerHandle) -> bool {
        self.stat_listeners.unregister(handle) || self.state_listeners.unregister(handle)
    }

    fn issue_handle(&mut self) -> ListenerHandle {
        let handle = ListenerHandle::new(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn record(&mut self, change: &StatChange) {
        if self.config.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(change.clone());
    }

    fn emit(&mut self, event: StateEvent) {
        self.state_listeners.dispatch(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::preset::StatPreset;
    use crate::stats::StatConfig;
    use std::sync::{Arc, Mutex};

    fn manager() -> StateManager {
        let config = TrackerConfig {
            stats: vec![StatConfig::new("hp").name("Health")],
            ..TrackerConfig::default()
        };
        StateManager::new(config).unwrap()
    }

    #[test]
    fn test_process_applies_every_occurrence() {
        let mut m = manager();
        let result = m.process_message("{{hp:-10}} {{hp:-20}}");
        assert_eq!(result.changes().count(), 2);
        assert_eq!(m.stats().get("hp").map(|s| s.current_value()), Some(70.0));

        let preview = m.get_stat_changes("{{hp:-10}} {{hp:-20}}");
        assert_eq!(preview["hp"].value, -10.0);
    }

    #[test]
    fn test_process_reports_unknown_stat() {
        let mut m = manager();
        let result = m.process_message("The rogue {{luck:+1}} strikes {{hp:-5}}!");
        assert_eq!(result.failures().count(), 1);
        assert_eq!(result.changes().count(), 1);
        assert_eq!(result.stripped_text, "The rogue  strikes !");
    }

    #[test]
    fn test_direct_edits() {
        let mut m = manager();
        let change = m.modify_stat("HP", -15.0).unwrap();
        assert_eq!(change.new_value, 85.0);
        assert_eq!(change.raw, "{{HP:-15}}");

        let change = m.set_stat("hp", 500.0).unwrap();
        assert_eq!(change.new_value, 100.0);
        assert_eq!(m.recent_changes().count(), 2);

        assert!(matches!(
            m.modify_stat("luck", 1.0),
            Err(TallyError::StatNotFound(_))
        ));
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut m = manager();
        m.set_enabled(false);
        let result = m.process_message("{{hp:-10}}");
        assert!(result.is_empty());
        assert_eq!(result.stripped_text, "{{hp:-10}}");
        assert_eq!(m.stats().get("hp").map(|s| s.current_value()), Some(100.0));
    }

    #[test]
    fn test_history_is_capped() {
        let config = TrackerConfig {
            history_limit: 2,
            stats: vec![StatConfig::new("hp")],
            ..TrackerConfig::default()
        };
        let mut m = StateManager::new(config).unwrap();
        m.process_message("{{hp:-1}} {{hp:-2}} {{hp:-3}}");

        let deltas: Vec<f64> = m.recent_changes().map(|c| c.delta).collect();
        assert_eq!(deltas, vec![-2.0, -3.0]);
    }

    #[test]
    fn test_listeners_survive_failures() {
        let mut m = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));

        m.on_stat_change(|_| Err("listener down".into()));
        let sink = Arc::clone(&seen);
        let handle = m.on_stat_change(move |change| {
            sink.lock().unwrap().push(change.new_value);
            Ok(())
        });

        m.process_message("{{hp:-10}}");
        assert_eq!(*seen.lock().unwrap(), vec![90.0]);
        assert_eq!(m.stats().get("hp").map(|s| s.current_value()), Some(90.0));

        assert!(m.unregister(handle));
        m.process_message("{{hp:-10}}");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unregister_targets_one_listener() {
        let mut a = manager();
        let mut b = manager();
        let stat_handle = a.on_stat_change(|_| Ok(()));
        let state_handle = a.on_state_event(|_| Ok(()));
        assert_ne!(stat_handle, state_handle);

        // handles come from each manager, not a shared counter
        assert_eq!(b.on_stat_change(|_| Ok(())), stat_handle);

        assert!(a.unregister(state_handle));
        assert!(!a.unregister(state_handle));
        assert!(a.unregister(stat_handle));
    }

    #[test]
    fn test_state_events() {
        let mut m = manager();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        m.on_state_event(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

        m.tick();
        m.reset();
        m.apply_preset("rpg_basic").unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(events[0], StateEvent::TurnAdvanced { turn: 1, .. }));
        assert_eq!(events[1], StateEvent::Reset);
        assert_eq!(
            events[2],
            StateEvent::PresetApplied {
                preset_id: "rpg_basic".into()
            }
        );
    }

    #[test]
    fn test_default_preset_seeds_session() {
        let config = TrackerConfig {
            default_preset: Some("survival".into()),
            ..TrackerConfig::default()
        };
        let m = StateManager::new(config).unwrap();
        assert!(m.stats().has("hunger"));
        assert_eq!(m.stats().len(), 4);
    }

    #[test]
    fn test_unknown_default_preset_falls_back_to_stats() {
        let config = TrackerConfig {
            default_preset: Some("missing".into()),
            stats: vec![StatConfig::new("hp")],
            ..TrackerConfig::default()
        };
        let m = StateManager::new(config).unwrap();
        assert_eq!(m.stats().ids().collect::<Vec<_>>(), vec!["hp"]);
    }

    #[test]
    fn test_default_preset_from_loaded_library() {
        let config = TrackerConfig {
            default_preset: Some("Dungeon Crawl".into()),
            stats: vec![StatConfig::new("hp")],
            ..TrackerConfig::default()
        };
        let mut m = StateManager::new(config).unwrap();
        assert!(m.stats().has("hp"));

        // presets restored after construction are seen by the next session
        m.presets_mut().add(StatPreset::new(
            "Dungeon Crawl",
            "",
            vec![StatConfig::new("torch").bounds(0.0, 10.0)],
        ));
        m.new_session(DEFAULT_SESSION_NAME);

        assert!(m.stats().has("torch"));
        assert!(!m.stats().has("hp"));
        assert_eq!(m.stats().get("torch").map(|s| s.current_value()), Some(10.0));
    }

    #[test]
    fn test_save_and_apply_preset() {
        let mut m = manager();
        m.process_message("{{hp:=35}}");
        let id = m.save_as_preset("Hurt", "");

        m.apply_preset("rpg_basic").unwrap();
        assert_eq!(m.stats().get("hp").map(|s| s.current_value()), Some(100.0));

        m.apply_preset(&id).unwrap();
        assert_eq!(m.stats().get("hp").map(|s| s.current_value()), Some(35.0));
        assert!(m.apply_preset("nope").is_err());
    }

    #[test]
    fn test_reconfigured_grammar() {
        let mut m = manager();
        m.set_parser_config(ParserConfig {
            open: "<".into(),
            close: ">".into(),
            ..ParserConfig::default()
        })
        .unwrap();
        m.process_message("{{hp:-50}} <hp:-5>");
        assert_eq!(m.stats().get("hp").map(|s| s.current_value()), Some(95.0));
        assert_eq!(m.config().parser.open, "<");
    }
}
