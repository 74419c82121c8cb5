//! Inline stat command parsing
//!
//! Scans free text for delimited tokens such as `{{hp:-10}}` or `{{mp:=50}}`
//! and turns each into a [`ParsedCommand`]. Only text between a matching
//! delimiter pair is inspected; everything else in the message is ignored.
//!
//! Grammar (whitespace allowed at every boundary):
//! `<open> statId <sep> ['='] ['+'|'-'] digits ['.' digits] <close>`

use crate::core::config::ParserConfig;
use crate::core::error::Result;
use crate::core::numeric::to_number;
use ahash::AHashMap;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{char, digit1, multispace0, one_of, satisfy};
use nom::combinator::{opt, recognize};
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// What a command does to its stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    /// Shift the current value by a signed delta
    Modify,
    /// Replace the current value (`=` prefix)
    Set,
    /// Token matched the grammar but its value could not be used
    Invalid,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommandType::Modify => "MODIFY",
            CommandType::Set => "SET",
            CommandType::Invalid => "INVALID",
        };
        f.write_str(label)
    }
}

/// One command token found in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCommand {
    /// The full matched token, delimiters included
    pub raw: String,
    pub stat_id: String,
    pub value: f64,
    pub command_type: CommandType,
    pub valid: bool,
    pub error: Option<String>,
}

impl ParsedCommand {
    fn valid(raw: &str, stat_id: String, value: f64, command_type: CommandType) -> Self {
        Self {
            raw: raw.to_string(),
            stat_id,
            value,
            command_type,
            valid: true,
            error: None,
        }
    }

    fn invalid(raw: &str, stat_id: String, error: String) -> Self {
        Self {
            raw: raw.to_string(),
            stat_id,
            value: 0.0,
            command_type: CommandType::Invalid,
            valid: false,
            error: Some(error),
        }
    }
}

/// A token located in the source text
struct TokenMatch<'t> {
    span: Range<usize>,
    id: &'t str,
    value: &'t str,
}

fn stat_id(input: &str) -> IResult<&str, &str> {
    recognize((
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    ))
    .parse(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize((digit1, opt((char('.'), digit1)))).parse(input)
}

fn value_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(char('=')),
        multispace0,
        opt(one_of("+-")),
        multispace0,
        number_literal,
    ))
    .parse(input)
}

/// Parser for inline stat commands with a configurable grammar
#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    config: ParserConfig,
}

impl CommandParser {
    /// Create a parser, rejecting a grammar that cannot delimit tokens
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Replace the grammar; on error the previous grammar stays in effect
    pub fn set_config(&mut self, config: ParserConfig) -> Result<()> {
        config.validate()?;
        tracing::debug!(
            "Parser grammar now {}id{}value{}",
            config.open,
            config.separator,
            config.close
        );
        self.config = config;
        Ok(())
    }

    /// Every command token in textual order, including invalid ones
    pub fn parse(&self, text: &str) -> Vec<ParsedCommand> {
        self.tokens(text)
            .map(|token| self.interpret(&text[token.span.clone()], token.id, token.value))
            .collect()
    }

    /// Only the commands that can be applied
    pub fn parse_valid(&self, text: &str) -> Vec<ParsedCommand> {
        self.tokens(text)
            .map(|token| self.interpret(&text[token.span.clone()], token.id, token.value))
            .filter(|command| command.valid)
            .collect()
    }

    /// True if `text` contains at least one command token
    pub fn has_commands(&self, text: &str) -> bool {
        self.tokens(text).next().is_some()
    }

    /// Remove every command token and trim the result
    ///
    /// Surrounding spaces are left alone, so `"take {{hp:-1}} damage"`
    /// becomes `"take  damage"`.
    pub fn strip_commands(&self, text: &str) -> String {
        let mut stripped = String::with_capacity(text.len());
        let mut last = 0;
        for token in self.tokens(text) {
            stripped.push_str(&text[last..token.span.start]);
            last = token.span.end;
        }
        stripped.push_str(&text[last..]);
        stripped.trim().to_string()
    }

    /// First valid command per stat id
    ///
    /// Later commands for the same stat in the same text are ignored here.
    /// `StateManager::process_message` applies all of them instead.
    pub fn get_stat_changes(&self, text: &str) -> AHashMap<String, ParsedCommand> {
        let mut changes = AHashMap::new();
        for command in self.parse_valid(text) {
            changes.entry(command.stat_id.clone()).or_insert(command);
        }
        changes
    }

    /// Render a token in the current grammar
    ///
    /// Modify values always carry a sign (`+5`), set values an `=` prefix.
    /// An `Invalid` type renders like a modify.
    pub fn format_command(&self, stat_id: &str, value: f64, command_type: CommandType) -> String {
        let value = match to_number(value, 0.0) {
            v if v == 0.0 => 0.0,
            v => v,
        };
        let rendered = match command_type {
            CommandType::Set => format!("={}", value),
            CommandType::Modify | CommandType::Invalid if value >= 0.0 => format!("+{}", value),
            CommandType::Modify | CommandType::Invalid => format!("{}", value),
        };
        format!(
            "{}{}{}{}{}",
            self.config.open, stat_id, self.config.separator, rendered, self.config.close
        )
    }

    fn tokens<'p, 't>(&'p self, text: &'t str) -> Tokens<'p, 't> {
        Tokens {
            parser: self,
            text,
            cursor: 0,
        }
    }

    fn token<'t>(&self, input: &'t str) -> IResult<&'t str, (&'t str, &'t str)> {
        let (rest, (_, _, id, _, _, _, value, _, _)) = (
            tag(self.config.open.as_str()),
            multispace0,
            stat_id,
            multispace0,
            tag(self.config.separator.as_str()),
            multispace0,
            value_literal,
            multispace0,
            tag(self.config.close.as_str()),
        )
            .parse(input)?;
        Ok((rest, (id, value)))
    }

    fn interpret(&self, raw: &str, id: &str, value: &str) -> ParsedCommand {
        let stat_id = if self.config.case_sensitive {
            id.to_string()
        } else {
            id.to_lowercase()
        };
        if stat_id.is_empty() {
            return ParsedCommand::invalid(raw, stat_id, "empty stat id".into());
        }

        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let (command_type, number) = match compact.strip_prefix('=') {
            Some(rest) => (CommandType::Set, rest),
            None => (CommandType::Modify, compact.as_str()),
        };
        if number.is_empty() {
            return ParsedCommand::invalid(raw, stat_id, "empty value".into());
        }

        match number.parse::<f64>() {
            Ok(n) if n.is_finite() => ParsedCommand::valid(raw, stat_id, n, command_type),
            _ => ParsedCommand::invalid(raw, stat_id, format!("value {:?} is not a finite number", number)),
        }
    }
}

/// Left-to-right, non-overlapping scan for command tokens
struct Tokens<'p, 't> {
    parser: &'p CommandParser,
    text: &'t str,
    cursor: usize,
}

impl<'t> Iterator for Tokens<'_, 't> {
    type Item = TokenMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let open = self.parser.config.open.as_str();
        while let Some(offset) = self.text[self.cursor..].find(open) {
            let text = self.text;
            let start = self.cursor + offset;
            let candidate = &text[start..];
            match self.parser.token(candidate) {
                Ok((rest, (id, value))) => {
                    let end = text.len() - rest.len();
                    self.cursor = end;
                    return Some(TokenMatch {
                        span: start..end,
                        id,
                        value,
                    });
                }
                Err(_) => {
                    let step = candidate.chars().next().map_or(1, char::len_utf8);
                    self.cursor = start + step;
                }
            }
        }
        self.cursor = self.text.len();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::default()
    }

    #[test]
    fn test_parse_modify() {
        let commands = parser().parse("{{hp:-10}}");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].stat_id, "hp");
        assert_eq!(commands[0].value, -10.0);
        assert_eq!(commands[0].command_type, CommandType::Modify);
        assert!(commands[0].valid);
        assert_eq!(commands[0].raw, "{{hp:-10}}");
    }

    #[test]
    fn test_parse_set() {
        let commands = parser().parse("{{hp:=50}}");
        assert_eq!(commands[0].command_type, CommandType::Set);
        assert_eq!(commands[0].value, 50.0);
    }

    #[test]
    fn test_bare_and_signed_values() {
        let commands = parser().parse("{{mp:5}} {{mp:+2.5}} {{mp:=-3}}");
        let values: Vec<f64> = commands.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![5.0, 2.5, -3.0]);
        assert_eq!(commands[2].command_type, CommandType::Set);
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(parser().parse("{{HP:-10}}")[0].stat_id, "hp");

        let sensitive = CommandParser::new(ParserConfig {
            case_sensitive: true,
            ..ParserConfig::default()
        })
        .unwrap();
        assert_eq!(sensitive.parse("{{HP:-10}}")[0].stat_id, "HP");
    }

    #[test]
    fn test_whitespace_tolerated() {
        let commands = parser().parse("{{  hp  :  -  10  }}");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].value, -10.0);

        let commands = parser().parse("{{ hp : = 7 }}");
        assert_eq!(commands[0].command_type, CommandType::Set);
        assert_eq!(commands[0].value, 7.0);
    }

    #[test]
    fn test_malformed_tokens_skipped() {
        let p = parser();
        assert!(p.parse("{{hp-10}}").is_empty());
        assert!(p.parse("{{:5}}").is_empty());
        assert!(p.parse("{{hp:}}").is_empty());
        assert!(p.parse("{{9lives:+1}}").is_empty());
        assert!(p.parse("{{hp:abc}}").is_empty());
        assert!(p.parse("{hp:-10}").is_empty());
    }

    #[test]
    fn test_overflowing_number_is_invalid() {
        let huge = "9".repeat(400);
        let commands = parser().parse(&format!("{{{{hp:{}}}}}", huge));
        assert_eq!(commands.len(), 1);
        assert!(!commands[0].valid);
        assert_eq!(commands[0].command_type, CommandType::Invalid);
        assert!(commands[0].error.is_some());
        assert!(parser().parse_valid(&format!("{{{{hp:{}}}}}", huge)).is_empty());
    }

    #[test]
    fn test_surrounding_markup_ignored() {
        let text = r#"<script>alert("{{")</script> She "drinks" {{mp:+5}} 'potion' {{ nope }}"#;
        let commands = parser().parse(text);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].stat_id, "mp");
    }

    #[test]
    fn test_recovers_after_failed_open() {
        let commands = parser().parse("{{{{hp:-1}} and {{ {{mp:+2}}");
        let ids: Vec<&str> = commands.iter().map(|c| c.stat_id.as_str()).collect();
        assert_eq!(ids, vec!["hp", "mp"]);
    }

    #[test]
    fn test_has_commands() {
        assert!(parser().has_commands("a {{hp:1}} b"));
        assert!(!parser().has_commands("no commands {{here}}"));
    }

    #[test]
    fn test_strip_commands_keeps_inner_spacing() {
        assert_eq!(
            parser().strip_commands("You take {{hp:-10}} damage!"),
            "You take  damage!"
        );
        assert_eq!(parser().strip_commands("  {{hp:-1}} rest  "), "rest");
    }

    #[test]
    fn test_stat_changes_first_match_wins() {
        let changes = parser().get_stat_changes("{{hp:-10}} {{hp:-20}} {{mp:=3}}");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["hp"].value, -10.0);
        assert_eq!(changes["mp"].command_type, CommandType::Set);
    }

    #[test]
    fn test_format_command() {
        let p = parser();
        assert_eq!(p.format_command("hp", 5.0, CommandType::Modify), "{{hp:+5}}");
        assert_eq!(p.format_command("hp", -2.5, CommandType::Modify), "{{hp:-2.5}}");
        assert_eq!(p.format_command("hp", 50.0, CommandType::Set), "{{hp:=50}}");
        assert_eq!(p.format_command("hp", -0.0, CommandType::Modify), "{{hp:+0}}");
    }

    #[test]
    fn test_format_then_parse() {
        let p = parser();
        let token = p.format_command("mp", -4.0, CommandType::Set);
        let parsed = &p.parse(&token)[0];
        assert_eq!(parsed.command_type, CommandType::Set);
        assert_eq!(parsed.value, -4.0);
    }

    #[test]
    fn test_custom_grammar() {
        let mut p = parser();
        p.set_config(ParserConfig {
            open: "[".into(),
            close: "]".into(),
            separator: "=>".into(),
            case_sensitive: false,
        })
        .unwrap();

        assert!(p.parse("{{hp:-10}}").is_empty());
        let commands = p.parse("[hp => -10] [mp=>=4]");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].command_type, CommandType::Set);
        assert_eq!(p.format_command("hp", 1.0, CommandType::Modify), "[hp=>+1]");
    }

    #[test]
    fn test_rejected_grammar_keeps_previous() {
        let mut p = parser();
        let bad = ParserConfig {
            open: String::new(),
            ..ParserConfig::default()
        };
        assert!(p.set_config(bad).is_err());
        assert_eq!(p.config().open, "{{");
        assert_eq!(p.parse("{{hp:1}}").len(), 1);
    }

    #[test]
    fn test_multibyte_text() {
        let commands = parser().parse("héros ❤ {{hp:-3}} ✨ {{ ✨:1}}");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].value, -3.0);
    }
}
