use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Stat not found: {0}")]
    StatNotFound(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TallyError>;
