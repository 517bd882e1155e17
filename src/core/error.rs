use thiserror::Error;

use crate::core::types::{CityId, CivId, UnitId};

#[derive(Error, Debug)]
pub enum CivError {
    #[error("Civilization not found: {0}")]
    CivNotFound(CivId),

    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("City not found: {0}")]
    CityNotFound(CityId),

    #[error("Unknown {kind} in ruleset: {id}")]
    UnknownRule { kind: &'static str, id: String },

    #[error("Invalid ruleset: {0}")]
    Ruleset(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("World generation failed: {0}")]
    Generation(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("State invariant violated: {0}")]
    Invariant(String),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Turn already in progress for game {0}")]
    TurnInProgress(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CivError>;
