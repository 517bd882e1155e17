//! Ruleset loaded from TOML

mod loader;
pub mod ruleset;

pub use ruleset::{
    BuildTarget, BuildingDef, GeneralRules, GovernmentDef, ImprovementDef, ResourceDef, Ruleset,
    TechDef, TerrainDef, UnitAbility, UnitDef,
};
