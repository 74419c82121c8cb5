//! Stat Tally - inline stat commands for chat sessions
//!
//! Tracks numeric stats (HP, MP, ...) for a conversation. Message text is
//! scanned for tokens like `{{hp:-10}}`, the commands are applied to the
//! session's stats, timed modifiers decay turn by turn, and the whole state
//! round-trips through JSON.

pub mod command;
pub mod context;
pub mod core;
pub mod persistence;
pub mod state;
pub mod stats;

pub use crate::command::{CommandParser, CommandType, ParsedCommand, StatChange};
pub use crate::context::StatContext;
pub use crate::core::{Result, TallyError, TokenMode, TrackerConfig};
pub use crate::state::{SimulationState, StateManager};
pub use crate::stats::{Stat, StatManager, StatModifier};
