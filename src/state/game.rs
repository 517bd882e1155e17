//! CivGameState - the root aggregate and single source of truth

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{CivError, Result};
use crate::core::types::{CityId, CivId, Coord, Metric, Relationship, UnitId, VictoryType};
use crate::state::city::City;
use crate::state::civilization::Civilization;
use crate::state::diplomacy::DiplomacyMessage;
use crate::state::events::{CombatRecord, GameNotification, TurnEvent};
use crate::state::tile::Tile;
use crate::state::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Diplomacy,
    Planning,
    Resolution,
    Narration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivGameState {
    pub id: String,
    pub seed: u64,
    pub turn: u32,
    pub max_turns: u32,
    pub phase: TurnPhase,
    pub grid_size: usize,
    /// Row-major: `grid[y][x]`
    pub grid: Vec<Vec<Tile>>,
    /// Fixed iteration order for every per-civilization pass
    pub civ_order: Vec<CivId>,
    pub civilizations: BTreeMap<CivId, Civilization>,
    pub units: BTreeMap<UnitId, Unit>,
    pub cities: BTreeMap<CityId, City>,
    pub diplomacy_log: Vec<DiplomacyMessage>,
    pub combat_log: Vec<CombatRecord>,
    pub notifications: Vec<GameNotification>,
    /// Events of the most recently resolved turn
    pub turn_events: Vec<TurnEvent>,
    pub narration: String,
    pub winner: Option<CivId>,
    pub victory_type: Option<VictoryType>,
    next_id: u64,
}

impl CivGameState {
    pub fn new(id: String, seed: u64, max_turns: u32, grid: Vec<Vec<Tile>>) -> Self {
        let grid_size = grid.len();
        Self {
            id,
            seed,
            turn: 1,
            max_turns,
            phase: TurnPhase::Idle,
            grid_size,
            grid,
            civ_order: Vec::new(),
            civilizations: BTreeMap::new(),
            units: BTreeMap::new(),
            cities: BTreeMap::new(),
            diplomacy_log: Vec::new(),
            combat_log: Vec::new(),
            notifications: Vec::new(),
            turn_events: Vec::new(),
            narration: String::new(),
            winner: None,
            victory_type: None,
            next_id: 1,
        }
    }

    /// Allocate a deterministic id such as `unit-7`
    pub fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_id);
        self.next_id += 1;
        id
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    // === TILES ===

    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        if !coord.in_bounds(self.grid_size) {
            return None;
        }
        self.grid.get(coord.y as usize)?.get(coord.x as usize)
    }

    pub fn tile_mut(&mut self, coord: Coord) -> Option<&mut Tile> {
        if !coord.in_bounds(self.grid_size) {
            return None;
        }
        self.grid.get_mut(coord.y as usize)?.get_mut(coord.x as usize)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.grid.iter().flatten()
    }

    pub fn unit_at(&self, coord: Coord) -> Option<&Unit> {
        let id = self.tile(coord)?.unit_id.as_ref()?;
        self.units.get(id)
    }

    pub fn city_at(&self, coord: Coord) -> Option<&City> {
        let id = self.tile(coord)?.city_id.as_ref()?;
        self.cities.get(id)
    }

    // === CIVILIZATIONS ===

    pub fn civ(&self, id: &CivId) -> Result<&Civilization> {
        self.civilizations
            .get(id)
            .ok_or_else(|| CivError::CivNotFound(id.clone()))
    }

    pub fn civ_mut(&mut self, id: &CivId) -> Result<&mut Civilization> {
        self.civilizations
            .get_mut(id)
            .ok_or_else(|| CivError::CivNotFound(id.clone()))
    }

    /// Living civilizations in fixed turn order
    pub fn living_civs(&self) -> Vec<CivId> {
        self.civ_order
            .iter()
            .filter(|id| self.civilizations.get(*id).map(|c| c.alive).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Standing of `a` toward `b`; barbarians are always at war
    pub fn relationship(&self, a: &CivId, b: &CivId) -> Relationship {
        if a.is_barbarian() || b.is_barbarian() {
            return Relationship::War;
        }
        self.civilizations
            .get(a)
            .map(|c| c.relationship(b))
            .unwrap_or_default()
    }

    /// Set the relationship on both sides at once
    pub fn set_relationship(&mut self, a: &CivId, b: &CivId, relationship: Relationship) {
        if a == b {
            return;
        }
        if let Some(civ) = self.civilizations.get_mut(a) {
            civ.relationships.insert(b.clone(), relationship);
        }
        if let Some(civ) = self.civilizations.get_mut(b) {
            civ.relationships.insert(a.clone(), relationship);
        }
    }

    // === UNITS ===

    pub fn unit(&self, id: &UnitId) -> Result<&Unit> {
        self.units
            .get(id)
            .ok_or_else(|| CivError::UnitNotFound(id.clone()))
    }

    /// Place a unit on its tile and register it with its owner
    pub fn add_unit(&mut self, unit: Unit) {
        if let Some(tile) = self.tile_mut(unit.position) {
            tile.unit_id = Some(unit.id.clone());
        }
        if let Some(civ) = self.civilizations.get_mut(&unit.owner) {
            civ.units.push(unit.id.clone());
        }
        self.units.insert(unit.id.clone(), unit);
    }

    /// Remove a unit from the map, its owner and the unit table
    pub fn remove_unit(&mut self, id: &UnitId) -> Option<Unit> {
        let unit = self.units.remove(id)?;
        if let Some(tile) = self.tile_mut(unit.position) {
            if tile.unit_id.as_ref() == Some(id) {
                tile.unit_id = None;
            }
        }
        if let Some(civ) = self.civilizations.get_mut(&unit.owner) {
            civ.units.retain(|u| u != id);
        }
        Some(unit)
    }

    /// Relocate a unit, keeping tile occupancy consistent
    pub fn relocate_unit(&mut self, id: &UnitId, to: Coord) {
        let Some(from) = self.units.get(id).map(|u| u.position) else {
            return;
        };
        if let Some(tile) = self.tile_mut(from) {
            tile.unit_id = None;
        }
        if let Some(tile) = self.tile_mut(to) {
            tile.unit_id = Some(id.clone());
        }
        if let Some(unit) = self.units.get_mut(id) {
            unit.position = to;
        }
    }

    // === CITIES ===

    pub fn city(&self, id: &CityId) -> Result<&City> {
        self.cities
            .get(id)
            .ok_or_else(|| CivError::CityNotFound(id.clone()))
    }

    pub fn city_mut(&mut self, id: &CityId) -> Result<&mut City> {
        self.cities
            .get_mut(id)
            .ok_or_else(|| CivError::CityNotFound(id.clone()))
    }

    pub fn add_city(&mut self, city: City) {
        if let Some(tile) = self.tile_mut(city.position) {
            tile.city_id = Some(city.id.clone());
            tile.owner = Some(city.owner.clone());
        }
        if let Some(civ) = self.civilizations.get_mut(&city.owner) {
            civ.cities.push(city.id.clone());
        }
        self.cities.insert(city.id.clone(), city);
    }

    /// Claim every unowned tile within `radius` of `center` for `owner`
    pub fn claim_territory(&mut self, center: Coord, radius: u32, owner: &CivId) -> usize {
        let mut claimed = 0;
        for coord in center.within(radius, Metric::Chebyshev, self.grid_size) {
            if let Some(tile) = self.tile_mut(coord) {
                if tile.owner.is_none() {
                    tile.owner = Some(owner.clone());
                    claimed += 1;
                }
            }
        }
        claimed
    }

    // === RECORDS ===

    /// Append events to this turn's list and derive notifications
    pub fn record_events(&mut self, events: &[TurnEvent]) {
        for event in events {
            if let Some(severity) = event.kind.notification_severity() {
                let id = self.next_id("note");
                self.notifications.push(GameNotification {
                    id,
                    turn: event.turn,
                    civ_id: event.civ_id.clone(),
                    severity,
                    message: event.description.clone(),
                });
            }
            self.turn_events.push(event.clone());
        }
    }
}
