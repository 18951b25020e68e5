use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed grammar pattern \"{pattern}\": {reason}")]
    MalformedGrammar { pattern: String, reason: String },

    #[error("Invalid typo ratio {0}: must be between 0 and 1")]
    InvalidRatio(f32),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::services::transport::TransportError),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
