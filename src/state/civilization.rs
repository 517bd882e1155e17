//! Civilizations and their empire-wide state

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::types::{CityId, CivId, Coord, GreatPersonKind, Relationship, SpaceshipPart, UnitId};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    pub researched: BTreeSet<String>,
    pub current: Option<String>,
    pub progress: u32,
    pub cost: u32,
    pub science_per_turn: i32,
    /// Progress kept on techs the civilization switched away from
    pub banked: BTreeMap<String, u32>,
}

impl ResearchState {
    pub fn has(&self, tech: &str) -> bool {
        self.researched.contains(tech)
    }

    /// Switch targets, banking progress on the previous one
    pub fn switch_to(&mut self, tech: &str, cost: u32) {
        if let Some(previous) = self.current.take() {
            if self.progress > 0 {
                self.banked.insert(previous, self.progress);
            }
        }
        self.progress = self.banked.remove(tech).unwrap_or(0).min(cost);
        self.current = Some(tech.to_string());
        self.cost = cost;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenAgeState {
    pub points: i32,
    pub turns_remaining: u32,
    pub completed: u32,
}

impl GoldenAgeState {
    pub fn is_active(&self) -> bool {
        self.turns_remaining > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreatPeopleState {
    pub progress: BTreeMap<GreatPersonKind, u32>,
    pub thresholds: BTreeMap<GreatPersonKind, u32>,
    /// Earned but not yet expended
    pub available: Vec<GreatPersonKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceshipState {
    pub booster: bool,
    pub cockpit: bool,
    pub engine: bool,
}

impl SpaceshipState {
    pub fn has(&self, part: SpaceshipPart) -> bool {
        match part {
            SpaceshipPart::Booster => self.booster,
            SpaceshipPart::Cockpit => self.cockpit,
            SpaceshipPart::Engine => self.engine,
        }
    }

    pub fn set(&mut self, part: SpaceshipPart) {
        match part {
            SpaceshipPart::Booster => self.booster = true,
            SpaceshipPart::Cockpit => self.cockpit = true,
            SpaceshipPart::Engine => self.engine = true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.booster && self.cockpit && self.engine
    }

    pub fn count(&self) -> u32 {
        self.booster as u32 + self.cockpit as u32 + self.engine as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRoute {
    pub id: String,
    pub from_city: CityId,
    pub to_city: CityId,
    pub partner: CivId,
    pub gold_per_turn: i64,
    pub turns_remaining: u32,
}

/// Temporary attack/defense bonus, e.g. from a great general
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatBuff {
    pub percent: i32,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Civilization {
    pub id: CivId,
    pub name: String,
    pub leader: String,
    pub gold: i64,
    pub cities: Vec<CityId>,
    pub units: Vec<UnitId>,
    pub known_tiles: BTreeSet<String>,
    pub relationships: BTreeMap<CivId, Relationship>,
    pub research: ResearchState,
    pub golden_age: GoldenAgeState,
    pub great_people: GreatPeopleState,
    pub government: String,
    pub anarchy_turns: u32,
    pub happiness: i32,
    pub war_weariness: i32,
    pub spaceship: SpaceshipState,
    pub trade_routes: Vec<TradeRoute>,
    pub combat_buff: Option<CombatBuff>,
    pub alive: bool,
    pub score: i64,
    pub start_position: Coord,
    #[serde(default)]
    pub city_names: Vec<String>,
}

impl Civilization {
    pub fn relationship(&self, other: &CivId) -> Relationship {
        self.relationships.get(other).copied().unwrap_or_default()
    }

    pub fn in_anarchy(&self) -> bool {
        self.anarchy_turns > 0
    }

    pub fn is_at_war(&self) -> bool {
        self.relationships.values().any(|r| *r == Relationship::War)
    }

    pub fn wars(&self) -> usize {
        self.relationships
            .values()
            .filter(|r| **r == Relationship::War)
            .count()
    }

    pub fn combat_bonus_pct(&self) -> i32 {
        self.combat_buff.as_ref().map(|b| b.percent).unwrap_or(0)
    }

    pub fn knows(&self, coord: Coord) -> bool {
        self.known_tiles.contains(&coord.key())
    }

    /// Next unused city name, falling back to a numbered name
    /// First roster name not yet in use, then numbered fallbacks
    pub fn next_city_name(&self, taken: impl Fn(&str) -> bool) -> String {
        if let Some(name) = self.city_names.iter().find(|n| !taken(n.as_str())) {
            return name.clone();
        }
        (self.city_names.len() + 1..)
            .map(|n| format!("{} {}", self.name, n))
            .find(|n| !taken(n))
            .unwrap_or_else(|| self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_names_skip_taken() {
        let rules = crate::rules::Ruleset::load_default().unwrap();
        let config = crate::core::config::GameConfig::load_default().unwrap();
        let state = crate::world::create_game(1, 20, 16, &config, &rules).unwrap();
        let mut civ = state.civ(&CivId::new("rome")).unwrap().clone();
        civ.name = "Rome".into();
        civ.city_names = vec!["Roma".into(), "Antium".into()];
        assert_eq!(civ.next_city_name(|_| false), "Roma");
        assert_eq!(civ.next_city_name(|n| n == "Roma"), "Antium");
        assert_eq!(civ.next_city_name(|n| n == "Roma" || n == "Antium"), "Rome 3");
    }

    #[test]
    fn test_research_banking() {
        let mut research = ResearchState::default();
        research.switch_to("writing", 30);
        research.progress = 12;
        research.switch_to("pottery", 25);
        assert_eq!(research.progress, 0);
        assert_eq!(research.banked.get("writing"), Some(&12));

        research.progress = 5;
        research.switch_to("writing", 30);
        assert_eq!(research.progress, 12);
        assert_eq!(research.banked.get("pottery"), Some(&5));
        assert!(!research.banked.contains_key("writing"));
    }

    #[test]
    fn test_spaceship_complete() {
        let mut ship = SpaceshipState::default();
        ship.set(SpaceshipPart::Booster);
        ship.set(SpaceshipPart::Engine);
        assert!(!ship.is_complete());
        ship.set(SpaceshipPart::Cockpit);
        assert!(ship.is_complete());
        assert_eq!(ship.count(), 3);
    }
}
