//! Load and validate the ruleset from TOML

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::error::{CivError, Result};
use crate::core::types::{parse_key, GreatPersonKind, Terrain};
use crate::rules::ruleset::{
    BuildingDef, GeneralRules, GovernmentDef, ImprovementDef, ResourceDef, Ruleset, TechDef,
    TerrainDef, UnitDef,
};

const DEFAULT_RULESET_TOML: &str = include_str!("../../data/ruleset.toml");

/// Raw document shape; keys are still strings here
#[derive(Debug, Deserialize)]
struct RulesetFile {
    general: GeneralRules,
    terrain: BTreeMap<String, TerrainDef>,
    #[serde(default)]
    resources: BTreeMap<String, ResourceDef>,
    #[serde(default)]
    improvements: BTreeMap<String, ImprovementDef>,
    units: BTreeMap<String, UnitDef>,
    #[serde(default)]
    buildings: BTreeMap<String, BuildingDef>,
    #[serde(default)]
    techs: BTreeMap<String, TechDef>,
    governments: BTreeMap<String, GovernmentDef>,
    #[serde(default)]
    great_people: BTreeMap<String, u32>,
}

impl Ruleset {
    /// Parse a ruleset document and check every cross-reference
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: RulesetFile = toml::from_str(content)?;
        let ruleset = compile(file)?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// The ruleset shipped with the crate
    pub fn load_default() -> Result<Self> {
        Self::from_toml(DEFAULT_RULESET_TOML)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CivError::Ruleset(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        for terrain in Terrain::ALL {
            if !self.terrain.contains_key(&terrain) {
                return Err(CivError::Ruleset(format!("missing terrain entry for {:?}", terrain)));
            }
        }

        let known_tech = |id: &Option<String>, owner: &str| -> Result<()> {
            match id {
                Some(tech) if !self.techs.contains_key(tech) => Err(CivError::Ruleset(format!(
                    "{} requires unknown tech '{}'",
                    owner, tech
                ))),
                _ => Ok(()),
            }
        };

        for tech in self.techs.values() {
            for prereq in &tech.prerequisites {
                if !self.techs.contains_key(prereq) {
                    return Err(CivError::Ruleset(format!(
                        "tech '{}' has unknown prerequisite '{}'",
                        tech.id, prereq
                    )));
                }
            }
        }
        self.check_tech_cycles()?;

        for unit in self.units.values() {
            known_tech(&unit.requires, &format!("unit '{}'", unit.id))?;
            if let Some(target) = &unit.upgrades_to {
                if !self.units.contains_key(target) {
                    return Err(CivError::Ruleset(format!(
                        "unit '{}' upgrades to unknown unit '{}'",
                        unit.id, target
                    )));
                }
            }
            if unit.hp == 0 || unit.movement == 0 {
                return Err(CivError::Ruleset(format!(
                    "unit '{}' needs positive hp and movement",
                    unit.id
                )));
            }
        }

        for building in self.buildings.values() {
            known_tech(&building.requires, &format!("building '{}'", building.id))?;
            if self.units.contains_key(&building.id) {
                return Err(CivError::Ruleset(format!(
                    "id '{}' is both a unit and a building",
                    building.id
                )));
            }
        }

        for government in self.governments.values() {
            known_tech(&government.requires, &format!("government '{}'", government.id))?;
        }

        let g = &self.general;
        if !self.governments.contains_key(&g.default_government) {
            return Err(CivError::Ruleset(format!(
                "default government '{}' is not defined",
                g.default_government
            )));
        }
        if !self.buildings.contains_key(&g.capital_building) {
            return Err(CivError::Ruleset(format!(
                "capital building '{}' is not defined",
                g.capital_building
            )));
        }
        for unit in g.starting_units.iter().chain(std::iter::once(&g.barbarian_unit)) {
            if !self.units.contains_key(unit) {
                return Err(CivError::Ruleset(format!("unknown unit '{}' in general rules", unit)));
            }
        }
        if g.starting_border_radius > g.max_border_radius {
            return Err(CivError::Ruleset(
                "starting_border_radius exceeds max_border_radius".into(),
            ));
        }

        Ok(())
    }

    /// Reject prerequisite loops, which would make techs unreachable
    fn check_tech_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            id: &'a str,
            techs: &'a BTreeMap<String, TechDef>,
            marks: &mut BTreeMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(CivError::Ruleset(format!("tech prerequisite cycle at '{}'", id)))
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(tech) = techs.get(id) {
                for prereq in &tech.prerequisites {
                    visit(prereq, techs, marks)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for id in self.techs.keys() {
            visit(id, &self.techs, &mut marks)?;
        }
        Ok(())
    }
}

fn compile(file: RulesetFile) -> Result<Ruleset> {
    fn keyed<T, V>(table: BTreeMap<String, V>, kind: &str) -> Result<BTreeMap<T, V>>
    where
        T: Ord + for<'de> Deserialize<'de>,
    {
        table
            .into_iter()
            .map(|(key, value)| {
                parse_key::<T>(&key)
                    .map(|k| (k, value))
                    .ok_or_else(|| CivError::Ruleset(format!("unknown {} '{}'", kind, key)))
            })
            .collect()
    }

    let units = file
        .units
        .into_iter()
        .map(|(id, mut def)| {
            def.id = id.clone();
            (id, def)
        })
        .collect();
    let buildings = file
        .buildings
        .into_iter()
        .map(|(id, mut def)| {
            def.id = id.clone();
            (id, def)
        })
        .collect();
    let techs = file
        .techs
        .into_iter()
        .map(|(id, mut def)| {
            def.id = id.clone();
            (id, def)
        })
        .collect();
    let governments = file
        .governments
        .into_iter()
        .map(|(id, mut def)| {
            def.id = id.clone();
            (id, def)
        })
        .collect();

    Ok(Ruleset {
        general: file.general,
        terrain: keyed(file.terrain, "terrain")?,
        resources: keyed(file.resources, "resource")?,
        improvements: keyed(file.improvements, "improvement")?,
        units,
        buildings,
        techs,
        governments,
        great_people: keyed::<GreatPersonKind, _>(file.great_people, "great person")?,
    })
}
