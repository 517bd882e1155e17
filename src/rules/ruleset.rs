//! Strongly typed ruleset tables
//!
//! Units, buildings and techs are keyed by string id. Every lookup returns an
//! explicit error for unknown ids instead of a silent default.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::core::error::{CivError, Result};
use crate::core::types::{
    GreatPersonKind, ImprovementKind, Metric, ResourceKind, SpaceshipPart, Terrain, Yields,
};

/// Global tuning constants
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralRules {
    pub starting_gold: i64,
    pub base_happiness: i32,
    pub city_min_distance: u32,
    /// Added to the border radius for city vision
    pub city_vision_bonus: u32,
    pub starting_border_radius: u32,
    pub max_border_radius: u32,
    pub border_growth_base: i32,
    pub border_growth_per_radius: i32,
    pub growth_base: i32,
    pub growth_per_pop: i32,
    pub food_per_pop: i32,
    pub city_base_defense: i32,
    pub city_base_hp: u32,
    pub city_heal: u32,
    pub free_units: usize,
    pub unit_upkeep: i64,
    pub anarchy_turns: u32,
    pub default_government: String,
    pub fortify_bonus_pct: i32,
    pub combat_base_damage: u32,
    pub heal_in_territory: u32,
    pub heal_in_field: u32,
    pub war_weariness_per_war: i32,
    pub war_weariness_per_loss: i32,
    pub war_weariness_decay: i32,
    pub golden_age_base_threshold: i32,
    pub golden_age_threshold_step: i32,
    pub golden_age_duration: u32,
    pub golden_age_yield_pct: i32,
    pub great_person_threshold_growth_pct: u32,
    pub general_points_per_kill: u32,
    pub scientist_research_bonus: u32,
    pub engineer_production_bonus: u32,
    pub merchant_gold: i64,
    pub artist_golden_age_points: i32,
    pub general_combat_bonus_pct: i32,
    pub general_bonus_turns: u32,
    pub trade_route_range: u32,
    pub trade_route_duration: u32,
    pub trade_route_base_gold: i64,
    pub barbarian_first_turn: u32,
    pub barbarian_spawn_interval: u32,
    pub barbarian_max_units: usize,
    pub barbarian_unit: String,
    pub starting_units: Vec<String>,
    pub capital_building: String,
}

impl GeneralRules {
    /// Golden age threshold after `completed` golden ages
    pub fn golden_age_threshold(&self, completed: u32) -> i32 {
        self.golden_age_base_threshold + self.golden_age_threshold_step * completed as i32
    }

    /// Food needed for a city of `population` to grow
    pub fn growth_threshold(&self, population: u32) -> i32 {
        self.growth_base + self.growth_per_pop * population as i32
    }

    /// Culture needed to push borders past `radius`
    pub fn border_threshold(&self, radius: u32) -> i32 {
        self.border_growth_base + self.border_growth_per_radius * radius as i32
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerrainDef {
    pub move_cost: u32,
    pub defense_pct: i32,
    pub passable: bool,
    #[serde(default)]
    pub yields: Yields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    #[serde(default)]
    pub yields: Yields,
    /// Counts as a food source for start-position guarantees
    #[serde(default)]
    pub food: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImprovementDef {
    pub turns: u32,
    #[serde(default)]
    pub yields: Yields,
    pub terrain: Vec<Terrain>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAbility {
    FoundCity,
    BuildImprovements,
    Trade,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitDef {
    #[serde(skip)]
    pub id: String,
    pub cost: u32,
    pub attack: u32,
    pub defense: u32,
    pub hp: u32,
    pub movement: u32,
    #[serde(default)]
    pub range: Option<u32>,
    #[serde(default = "default_vision")]
    pub vision: u32,
    #[serde(default)]
    pub vision_metric: Metric,
    #[serde(default)]
    pub abilities: Vec<UnitAbility>,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default)]
    pub upgrades_to: Option<String>,
    #[serde(default)]
    pub upgrade_cost: i64,
}

fn default_vision() -> u32 {
    2
}

impl UnitDef {
    pub fn has_ability(&self, ability: UnitAbility) -> bool {
        self.abilities.contains(&ability)
    }

    pub fn is_military(&self) -> bool {
        self.attack > 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingDef {
    #[serde(skip)]
    pub id: String,
    pub cost: u32,
    #[serde(default)]
    pub yields: Yields,
    #[serde(default)]
    pub happiness: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub maintenance: i64,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default = "default_true")]
    pub buildable: bool,
    #[serde(default)]
    pub spaceship_part: Option<SpaceshipPart>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechDef {
    #[serde(skip)]
    pub id: String,
    pub cost: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernmentDef {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default)]
    pub gold_pct: i32,
    #[serde(default)]
    pub production_pct: i32,
    #[serde(default)]
    pub science_pct: i32,
    #[serde(default)]
    pub happiness: i32,
    #[serde(default = "default_weariness_pct")]
    pub war_weariness_pct: i32,
}

fn default_weariness_pct() -> i32 {
    100
}

/// A production target resolved against the ruleset
#[derive(Debug, Clone, Copy)]
pub enum BuildTarget<'a> {
    Unit(&'a UnitDef),
    Building(&'a BuildingDef),
}

/// The loaded, validated ruleset
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub general: GeneralRules,
    pub(crate) terrain: BTreeMap<Terrain, TerrainDef>,
    pub(crate) resources: BTreeMap<ResourceKind, ResourceDef>,
    pub(crate) improvements: BTreeMap<ImprovementKind, ImprovementDef>,
    pub(crate) units: BTreeMap<String, UnitDef>,
    pub(crate) buildings: BTreeMap<String, BuildingDef>,
    pub(crate) techs: BTreeMap<String, TechDef>,
    pub(crate) governments: BTreeMap<String, GovernmentDef>,
    pub(crate) great_people: BTreeMap<GreatPersonKind, u32>,
}

impl Ruleset {
    pub fn terrain(&self, terrain: Terrain) -> &TerrainDef {
        // Completeness of the terrain table is checked at load time
        &self.terrain[&terrain]
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceDef> {
        self.resources.get(&kind)
    }

    pub fn improvement(&self, kind: ImprovementKind) -> Result<&ImprovementDef> {
        self.improvements.get(&kind).ok_or_else(|| CivError::UnknownRule {
            kind: "improvement",
            id: format!("{:?}", kind).to_lowercase(),
        })
    }

    pub fn unit(&self, id: &str) -> Result<&UnitDef> {
        self.units.get(id).ok_or_else(|| CivError::UnknownRule {
            kind: "unit",
            id: id.to_string(),
        })
    }

    pub fn building(&self, id: &str) -> Result<&BuildingDef> {
        self.buildings.get(id).ok_or_else(|| CivError::UnknownRule {
            kind: "building",
            id: id.to_string(),
        })
    }

    pub fn tech(&self, id: &str) -> Result<&TechDef> {
        self.techs.get(id).ok_or_else(|| CivError::UnknownRule {
            kind: "tech",
            id: id.to_string(),
        })
    }

    pub fn government(&self, id: &str) -> Result<&GovernmentDef> {
        self.governments.get(id).ok_or_else(|| CivError::UnknownRule {
            kind: "government",
            id: id.to_string(),
        })
    }

    /// Resolve a production target: units first, then buildings
    pub fn build_target(&self, id: &str) -> Result<BuildTarget<'_>> {
        if let Some(unit) = self.units.get(id) {
            return Ok(BuildTarget::Unit(unit));
        }
        if let Some(building) = self.buildings.get(id) {
            return Ok(BuildTarget::Building(building));
        }
        Err(CivError::UnknownRule {
            kind: "build target",
            id: id.to_string(),
        })
    }

    pub fn great_person_threshold(&self, kind: GreatPersonKind) -> u32 {
        self.great_people.get(&kind).copied().unwrap_or(100)
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitDef> {
        self.units.values()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingDef> {
        self.buildings.values()
    }

    pub fn techs(&self) -> impl Iterator<Item = &TechDef> {
        self.techs.values()
    }

    pub fn governments(&self) -> impl Iterator<Item = &GovernmentDef> {
        self.governments.values()
    }

    /// Movement cost of entering a tile, with roads reducing it to one
    pub fn move_cost(&self, terrain: Terrain, has_road: bool) -> u32 {
        if has_road {
            1
        } else {
            self.terrain(terrain).move_cost
        }
    }
}
