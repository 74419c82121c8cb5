//! Command execution - applies parsed commands to stats

use crate::command::parser::{CommandType, ParsedCommand};
use crate::core::types::{now_millis, Timestamp};
use crate::stats::StatManager;
use serde::{Deserialize, Serialize};

/// A stat mutation that actually happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatChange {
    pub stat_id: String,
    pub old_value: f64,
    pub new_value: f64,
    /// Post-clamp delta
    pub delta: f64,
    pub command_type: CommandType,
    /// The token that caused the change
    pub raw: String,
    pub timestamp: Timestamp,
}

/// Result of applying one command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub command: ParsedCommand,
    pub change: Option<StatChange>,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        self.change.is_some()
    }

    fn failed(command: &ParsedCommand, error: String) -> Self {
        Self {
            command: command.clone(),
            change: None,
            error: Some(error),
        }
    }
}

/// Applies commands against a [`StatManager`]
pub struct CommandExecutor;

impl CommandExecutor {
    /// Apply every command in order
    ///
    /// A command that cannot be applied yields a failed outcome; the rest of
    /// the batch still runs.
    pub fn execute(stats: &mut StatManager, commands: &[ParsedCommand]) -> Vec<CommandOutcome> {
        commands
            .iter()
            .map(|command| Self::apply(stats, command))
            .collect()
    }

    /// Apply a single command
    pub fn apply(stats: &mut StatManager, command: &ParsedCommand) -> CommandOutcome {
        if !command.valid {
            let reason = command
                .error
                .clone()
                .unwrap_or_else(|| "invalid command".to_string());
            return CommandOutcome::failed(command, reason);
        }

        let Some(stat) = stats.get_mut(&command.stat_id) else {
            tracing::warn!("Command {} targets unknown stat {}", command.raw, command.stat_id);
            return CommandOutcome::failed(command, format!("unknown stat: {}", command.stat_id));
        };

        let result = match command.command_type {
            CommandType::Set => stat.set(command.value),
            CommandType::Modify => stat.modify(command.value),
            CommandType::Invalid => {
                return CommandOutcome::failed(command, "invalid command".to_string());
            }
        };

        tracing::debug!(
            "{} {} {}: {} -> {}",
            command.command_type,
            stat.id(),
            command.value,
            result.old_value,
            result.new_value
        );

        CommandOutcome {
            command: command.clone(),
            change: Some(StatChange {
                stat_id: stat.id().to_string(),
                old_value: result.old_value,
                new_value: result.new_value,
                delta: result.actual_change,
                command_type: command.command_type,
                raw: command.raw.clone(),
                timestamp: now_millis(),
            }),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parser::CommandParser;
    use crate::stats::Stat;

    fn stats() -> StatManager {
        let mut m = StatManager::new();
        m.add(Stat::new("hp", "Health"));
        m
    }

    #[test]
    fn test_execute_applies_in_order() {
        let mut m = stats();
        let commands = CommandParser::default().parse_valid("{{hp:-10}} {{hp:-20}}");
        let outcomes = CommandExecutor::execute(&mut m, &commands);

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(CommandOutcome::is_applied));
        assert_eq!(m.get("hp").map(|s| s.current_value()), Some(70.0));

        let second = outcomes[1].change.as_ref().unwrap();
        assert_eq!(second.old_value, 90.0);
        assert_eq!(second.new_value, 70.0);
        assert_eq!(second.delta, -20.0);
    }

    #[test]
    fn test_unknown_stat_does_not_abort_batch() {
        let mut m = stats();
        let commands = CommandParser::default().parse_valid("{{luck:+1}} {{hp:=40}}");
        let outcomes = CommandExecutor::execute(&mut m, &commands);

        assert!(!outcomes[0].is_applied());
        assert!(outcomes[0].error.as_deref().unwrap().contains("luck"));
        assert!(outcomes[1].is_applied());
        assert_eq!(m.get("hp").map(|s| s.current_value()), Some(40.0));
    }

    #[test]
    fn test_change_reports_clamped_delta() {
        let mut m = stats();
        let commands = CommandParser::default().parse_valid("{{hp:+50}}");
        let outcome = CommandExecutor::apply(&mut m, &commands[0]);
        let change = outcome.change.unwrap();
        assert_eq!(change.delta, 0.0);
        assert_eq!(change.command_type, CommandType::Modify);
        assert_eq!(change.raw, "{{hp:+50}}");
    }

    #[test]
    fn test_invalid_command_is_reported() {
        let mut m = stats();
        let huge = format!("{{{{hp:{}}}}}", "9".repeat(400));
        let commands = CommandParser::default().parse(&huge);
        let outcome = CommandExecutor::apply(&mut m, &commands[0]);
        assert!(!outcome.is_applied());
        assert_eq!(m.get("hp").map(|s| s.current_value()), Some(100.0));
    }
}
