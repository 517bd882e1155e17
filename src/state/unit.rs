//! Units on the map

use serde::{Deserialize, Serialize};

use crate::core::types::{CivId, Coord, UnitId};
use crate::rules::UnitDef;

/// Presentation hint for clients; the simulation never reads it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationHint {
    pub kind: String,
    pub from: Coord,
    pub to: Coord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: String,
    pub owner: CivId,
    pub position: Coord,
    pub hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub movement: u32,
    pub movement_left: u32,
    pub range: Option<u32>,
    pub fortified: bool,
    pub acted_this_turn: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationHint>,
}

impl Unit {
    /// Build a fresh unit from its ruleset definition
    pub fn from_def(id: UnitId, def: &UnitDef, owner: CivId, position: Coord) -> Self {
        Self {
            id,
            unit_type: def.id.clone(),
            owner,
            position,
            hp: def.hp,
            max_hp: def.hp,
            attack: def.attack,
            defense: def.defense,
            movement: def.movement,
            movement_left: def.movement,
            range: def.range,
            fortified: false,
            acted_this_turn: false,
            animation: None,
        }
    }

    pub fn can_act(&self) -> bool {
        !self.acted_this_turn && self.movement_left > 0
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage, saturating at zero
    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    pub fn heal(&mut self, amount: u32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }

    /// Reset per-turn flags at the start of a new turn
    pub fn refresh(&mut self) {
        self.movement_left = self.movement;
        self.acted_this_turn = false;
        self.animation = None;
    }

    /// Mark the unit as done for this turn
    pub fn exhaust(&mut self) {
        self.acted_this_turn = true;
        self.movement_left = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Ruleset;

    fn warrior() -> Unit {
        let rules = Ruleset::load_default().unwrap();
        Unit::from_def(
            UnitId::from("unit-1"),
            rules.unit("warrior").unwrap(),
            CivId::new("rome"),
            Coord::new(2, 2),
        )
    }

    #[test]
    fn test_damage_saturates() {
        let mut unit = warrior();
        unit.take_damage(250);
        assert_eq!(unit.hp, 0);
        assert!(!unit.is_alive());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut unit = warrior();
        unit.take_damage(10);
        unit.heal(50);
        assert_eq!(unit.hp, unit.max_hp);
    }

    #[test]
    fn test_refresh_restores_movement() {
        let mut unit = warrior();
        unit.exhaust();
        assert!(!unit.can_act());
        unit.refresh();
        assert!(unit.can_act());
        assert_eq!(unit.movement_left, unit.movement);
    }
}
