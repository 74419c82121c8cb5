//! Tracker configuration with documented defaults
//!
//! Every `StateManager` owns one `TrackerConfig`. There is no process-global
//! configuration; hosts construct a config (or load one from TOML) and hand
//! it to the manager.

use crate::core::error::{Result, TallyError};
use crate::stats::StatConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Delimiter grammar for inline stat commands
///
/// With the defaults a command looks like `{{hp:-10}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Opening delimiter of a command token
    pub open: String,
    /// Closing delimiter of a command token
    pub close: String,
    /// Separates the stat id from the value
    pub separator: String,
    /// Keep stat ids exactly as written instead of lower-casing them
    pub case_sensitive: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            open: "{{".into(),
            close: "}}".into(),
            separator: ":".into(),
            case_sensitive: false,
        }
    }
}

impl ParserConfig {
    /// Check that the grammar can actually delimit a token
    pub fn validate(&self) -> Result<()> {
        if self.open.is_empty() || self.close.is_empty() {
            return Err(TallyError::InvalidConfig(
                "command delimiters must not be empty".into(),
            ));
        }
        if self.separator.is_empty() {
            return Err(TallyError::InvalidConfig(
                "command separator must not be empty".into(),
            ));
        }
        if self.separator == self.open || self.separator == self.close {
            return Err(TallyError::InvalidConfig(format!(
                "separator {:?} collides with a delimiter",
                self.separator
            )));
        }
        if self
            .separator
            .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(TallyError::InvalidConfig(format!(
                "separator {:?} would be read as part of the stat id",
                self.separator
            )));
        }
        if self.separator.starts_with(char::is_whitespace) {
            return Err(TallyError::InvalidConfig(format!(
                "separator {:?} starts with whitespace, which is skipped around the stat id",
                self.separator
            )));
        }
        Ok(())
    }
}

/// How much stat information is surfaced to the generation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Every visible stat, its active modifiers and the command syntax
    Full,
    /// One summary line plus a short syntax hint
    #[default]
    Compact,
    /// One summary line only
    Minimal,
    /// Nothing is injected
    Off,
}

/// Configuration for a stat tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// When false, `process_message` does nothing
    pub enabled: bool,

    /// Command grammar
    pub parser: ParserConfig,

    /// Context verbosity for the text-generation loop
    pub token_mode: TokenMode,

    /// Number of applied changes kept in the recent-change history
    ///
    /// Zero disables the history.
    pub history_limit: usize,

    /// Preset applied when a fresh session is created
    ///
    /// Takes precedence over `stats` when it names a known preset.
    pub default_preset: Option<String>,

    /// Stats created for a fresh session
    pub stats: Vec<StatConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parser: ParserConfig::default(),
            token_mode: TokenMode::default(),
            history_limit: 50,
            default_preset: None,
            stats: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.parser.validate()?;

        if let Some(preset) = &self.default_preset {
            if preset.trim().is_empty() {
                return Err(TallyError::InvalidConfig(
                    "default_preset must not be blank".into(),
                ));
            }
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded tracker config from {} ({} stats)",
            path.display(),
            config.stats.len()
        );
        Ok(config)
    }
}
