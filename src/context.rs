//! Stat summaries for the text-generation context
//!
//! Builds the block of text a host injects into the generation prompt so the
//! model knows the current stat values and how to change them. Verbosity is
//! controlled by [`TokenMode`].

use crate::command::{CommandParser, CommandType, StatChange};
use crate::core::config::TokenMode;
use crate::core::types::Turn;
use crate::state::StateManager;
use crate::stats::{DisplayMode, Stat};

/// Recent changes kept in a context
const MAX_RECENT_CHANGES: usize = 5;

/// Snapshot of session stats ready for rendering
#[derive(Debug, Clone)]
pub struct StatContext {
    pub mode: TokenMode,
    pub turn: Turn,
    /// Visible stats in listing order
    pub stats: Vec<StatLine>,
    /// Most recent changes, oldest first
    pub recent_changes: Vec<String>,
    /// Example tokens in the live grammar
    pub syntax: Vec<String>,
}

/// One stat as shown to the model
#[derive(Debug, Clone)]
pub struct StatLine {
    pub id: String,
    pub name: String,
    pub value: String,
    /// Active modifiers, rendered
    pub modifiers: Vec<String>,
}

impl StatLine {
    fn from_stat(stat: &Stat) -> Self {
        // bars have no text form of their own
        let value = match stat.display_mode() {
            DisplayMode::Bar => format!(
                "{}/{}",
                stat.final_value().round(),
                stat.max_value().round()
            ),
            _ => stat.display_string(),
        };
        Self {
            id: stat.id().to_string(),
            name: stat.name().to_string(),
            value,
            modifiers: stat.modifiers().active().map(ToString::to_string).collect(),
        }
    }
}

impl StatContext {
    /// Build the context for the manager's active session
    pub fn from_manager(manager: &StateManager) -> Self {
        let stats: Vec<StatLine> = manager
            .visible_stats()
            .into_iter()
            .map(StatLine::from_stat)
            .collect();

        let example_id = stats.first().map_or("hp", |s| s.id.as_str());
        let syntax = syntax_examples(manager.parser(), example_id);

        let mut context = Self {
            mode: manager.config().token_mode,
            turn: manager.state().turn_count(),
            stats,
            recent_changes: Vec::new(),
            syntax,
        };
        for change in manager.recent_changes() {
            context.add_change(change);
        }
        context
    }

    /// Record a change, keeping only the latest few
    pub fn add_change(&mut self, change: &StatChange) {
        self.recent_changes.push(format!(
            "{} {:+} ({} -> {})",
            change.stat_id, change.delta, change.old_value, change.new_value
        ));
        if self.recent_changes.len() > MAX_RECENT_CHANGES {
            self.recent_changes.remove(0);
        }
    }

    /// Render according to the token mode; empty when there is nothing to say
    pub fn summary(&self) -> String {
        if self.stats.is_empty() {
            return String::new();
        }
        match self.mode {
            TokenMode::Off => String::new(),
            TokenMode::Minimal => self.one_line(),
            TokenMode::Compact => {
                format!("{}\nUpdate with {}", self.one_line(), self.syntax.join(" or "))
            }
            TokenMode::Full => self.full(),
        }
    }

    fn one_line(&self) -> String {
        let parts: Vec<String> = self
            .stats
            .iter()
            .map(|s| format!("{} {}", s.name, s.value))
            .collect();
        format!("Stats: {}", parts.join(", "))
    }

    fn full(&self) -> String {
        let mut s = String::new();

        s.push_str(&format!("Turn: {}\n", self.turn));

        s.push_str("Stats:\n");
        for stat in &self.stats {
            s.push_str(&format!("- {}: {}", stat.name, stat.value));
            if !stat.modifiers.is_empty() {
                s.push_str(&format!(" [{}]", stat.modifiers.join("; ")));
            }
            s.push('\n');
        }

        if !self.recent_changes.is_empty() {
            s.push_str("\nRecent Changes:\n");
            for change in &self.recent_changes {
                s.push_str(&format!("- {}\n", change));
            }
        }

        s.push_str(&format!(
            "\nTo change a stat write {} (adjust) or {} (set).\n",
            self.syntax.first().map_or("", String::as_str),
            self.syntax.get(1).map_or("", String::as_str)
        ));

        s
    }
}

fn syntax_examples(parser: &CommandParser, stat_id: &str) -> Vec<String> {
    vec![
        parser.format_command(stat_id, -10.0, CommandType::Modify),
        parser.format_command(stat_id, 50.0, CommandType::Set),
    ]
}
