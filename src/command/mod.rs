//! Inline command pipeline
//!
//! Message text -> CommandParser -> Vec<ParsedCommand> -> CommandExecutor -> Vec<StatChange>

pub mod executor;
pub mod parser;

pub use executor::{CommandExecutor, CommandOutcome, StatChange};
pub use parser::{CommandParser, CommandType, ParsedCommand};
