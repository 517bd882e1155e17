//! Game configuration loaded from TOML
//!
//! World generation thresholds, the civilization roster and policy boundary
//! settings live here. The embedded `data/game.toml` is the default; a custom
//! file can be supplied through the CLI.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{CivError, Result};

const DEFAULT_GAME_TOML: &str = include_str!("../../data/game.toml");

/// Top-level game configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub world: WorldGenConfig,
    pub policy: PolicyConfig,
    pub civilizations: Vec<CivDefinition>,
}

/// World generator tuning
///
/// Noise values are normalized to [0, 1]. Elevation below `water_level`
/// becomes water, above `mountain_level` mountains, above `hills_level`
/// hills. Remaining land is classified by moisture.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldGenConfig {
    pub default_grid_size: usize,
    pub default_max_turns: u32,
    /// Base frequency of the first octave (per tile)
    pub noise_scale: f64,
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves
    pub persistence: f64,
    /// How strongly elevation drops toward the border (island shape)
    pub edge_falloff: f64,
    pub water_level: f64,
    pub hills_level: f64,
    pub mountain_level: f64,
    pub desert_moisture: f64,
    pub forest_moisture: f64,
    /// Chance that an eligible tile carries a resource
    pub resource_chance_pct: u32,
    pub wonder_chance_per_mille: u32,
    #[serde(default)]
    pub wonders: Vec<String>,
}

/// Policy boundary settings
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Per-call budget for the external decision provider
    pub timeout_ms: u64,
    /// Extra attempts after a failed LLM call
    pub retries: u32,
    /// Hard cap on actions accepted from a single plan
    pub max_actions_per_turn: usize,
    pub max_messages_per_turn: usize,
    /// Completion length requested from the LLM endpoint
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,
}

fn default_llm_max_tokens() -> u32 {
    2048
}

impl PolicyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Upper bound for one provider call including its retries
    pub fn call_budget(&self) -> Duration {
        self.timeout() * (self.retries + 1)
    }
}

/// A playable civilization and its fixed start position
#[derive(Debug, Clone, Deserialize)]
pub struct CivDefinition {
    pub id: String,
    pub name: String,
    pub leader: String,
    /// Start position as fractions of the grid size
    pub start: [f64; 2],
    #[serde(default)]
    pub city_names: Vec<String>,
}

impl GameConfig {
    /// Parse and validate a configuration document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration shipped with the crate
    pub fn load_default() -> Result<Self> {
        Self::from_toml(DEFAULT_GAME_TOML)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let w = &self.world;
        if !(w.water_level < w.hills_level && w.hills_level < w.mountain_level) {
            return Err(CivError::Config(format!(
                "elevation thresholds must be ordered: water {} < hills {} < mountain {}",
                w.water_level, w.hills_level, w.mountain_level
            )));
        }
        if w.desert_moisture >= w.forest_moisture {
            return Err(CivError::Config(format!(
                "desert_moisture ({}) should be < forest_moisture ({})",
                w.desert_moisture, w.forest_moisture
            )));
        }
        if w.octaves == 0 {
            return Err(CivError::Config("octaves must be positive".into()));
        }
        if self.civilizations.len() < 2 {
            return Err(CivError::Config("at least two civilizations are required".into()));
        }

        let mut seen = std::collections::BTreeSet::new();
        for civ in &self.civilizations {
            if !seen.insert(civ.id.as_str()) {
                return Err(CivError::Config(format!("duplicate civilization id '{}'", civ.id)));
            }
            if civ.id == crate::core::types::BARBARIAN_ID {
                return Err(CivError::Config("'barbarians' is a reserved civilization id".into()));
            }
            if civ.start.iter().any(|f| !(0.0..=1.0).contains(f)) {
                return Err(CivError::Config(format!(
                    "start position of '{}' must be fractions in [0, 1]",
                    civ.id
                )));
            }
        }

        if self.policy.timeout_ms == 0 {
            return Err(CivError::Config("policy timeout must be positive".into()));
        }

        Ok(())
    }
}
