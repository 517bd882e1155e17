//! Combat resolution
//!
//! Strength is the base stat scaled by remaining health (half strength at
//! zero hp, full at max) and by percentage modifiers. Damage is
//! `base * att / def * roll%` with a roll in 80..=120, at least 1.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::core::error::{CivError, Result};
use crate::core::types::{CityId, CivId, Coord, GreatPersonKind, Metric, UnitId};
use crate::rules::Ruleset;
use crate::state::events::{CombatRecord, TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;
use crate::state::unit::AnimationHint;

/// What occupies an attacked tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Unit(UnitId),
    City(CityId),
}

/// The unit on the tile, else the city, together with its owner
pub fn target_at(state: &CivGameState, coord: Coord) -> Option<(Target, CivId)> {
    if let Some(unit) = state.unit_at(coord) {
        return Some((Target::Unit(unit.id.clone()), unit.owner.clone()));
    }
    state
        .city_at(coord)
        .map(|city| (Target::City(city.id.clone()), city.owner.clone()))
}

/// Effective strength in hundredths, never below 1
pub fn strength(stat: u32, hp: u32, max_hp: u32, modifier_pct: i32) -> i64 {
    let max_hp = max_hp.max(1) as i64;
    // 50% + 50% * hp / max_hp
    let scaled = stat as i64 * 100 * (max_hp + hp as i64) / (2 * max_hp);
    let modified = scaled * (100 + modifier_pct as i64) / 100;
    modified.max(1)
}

/// Roll damage dealt by `att` against `def`
pub fn roll_damage(base: u32, att: i64, def: i64, rng: &mut ChaCha8Rng) -> u32 {
    let roll: i64 = rng.gen_range(80..=120);
    let damage = base as i64 * att * roll / (def.max(1) * 100);
    damage.clamp(1, u32::MAX as i64) as u32
}

fn civ_bonus(state: &CivGameState, civ: &CivId) -> i32 {
    state
        .civilizations
        .get(civ)
        .map(|c| c.combat_bonus_pct())
        .unwrap_or(0)
}

fn civ_name(state: &CivGameState, civ: &CivId) -> String {
    state
        .civilizations
        .get(civ)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "Barbarian".to_string())
}

/// Resolve a validated attack from `attacker_id` on the tile at `coord`
pub fn resolve_attack(
    state: &mut CivGameState,
    rules: &Ruleset,
    attacker_id: &UnitId,
    coord: Coord,
    ranged: bool,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let attacker = state.unit(attacker_id)?.clone();
    let (target, defender_civ) = target_at(state, coord)
        .ok_or_else(|| CivError::Invariant(format!("attack on empty tile {}", coord)))?;
    let terrain_pct = state
        .tile(coord)
        .map(|t| rules.terrain(t.terrain).defense_pct)
        .unwrap_or(0);
    let base = rules.general.combat_base_damage;
    let att_str = strength(
        attacker.attack,
        attacker.hp,
        attacker.max_hp,
        civ_bonus(state, &attacker.owner),
    );

    let mut events = Vec::new();
    let mut captured = false;
    let defender_label: String;
    let damage_to_defender: u32;
    let damage_to_attacker: u32;
    let defender_destroyed: bool;

    match target {
        Target::Unit(defender_id) => {
            let defender = state.unit(&defender_id)?.clone();
            let fortify = if defender.fortified {
                rules.general.fortify_bonus_pct
            } else {
                0
            };
            let def_str = strength(
                defender.defense,
                defender.hp,
                defender.max_hp,
                terrain_pct + fortify + civ_bonus(state, &defender.owner),
            );
            damage_to_defender = roll_damage(base, att_str, def_str, rng);
            damage_to_attacker = if ranged {
                0
            } else {
                roll_damage(base, def_str, att_str, rng)
            };

            let remaining = defender.hp.saturating_sub(damage_to_defender);
            defender_destroyed = remaining == 0;
            if defender_destroyed {
                state.remove_unit(&defender_id);
                record_kill(state, rules, &attacker.owner, &defender_civ);
                events.push(
                    TurnEvent::new(
                        turn,
                        TurnEventKind::UnitDestroyed,
                        Some(defender_civ.clone()),
                        format!(
                            "{} {} was destroyed by {}",
                            civ_name(state, &defender_civ),
                            defender.unit_type,
                            civ_name(state, &attacker.owner)
                        ),
                    )
                    .at(coord),
                );
            } else if let Some(unit) = state.units.get_mut(&defender_id) {
                unit.take_damage(damage_to_defender);
            }
            defender_label = defender_id.to_string();
        }
        Target::City(city_id) => {
            let city = state.city(&city_id)?.clone();
            let def_str = strength(
                city.defense.max(1) as u32,
                city.hp,
                city.max_hp,
                terrain_pct + civ_bonus(state, &city.owner),
            );
            let rolled = roll_damage(base, att_str, def_str, rng);
            damage_to_attacker = if ranged {
                0
            } else {
                roll_damage(base, def_str, att_str, rng)
            };

            // Only a surviving melee attacker of a real civilization can take a city
            let can_capture = !ranged
                && !attacker.owner.is_barbarian()
                && attacker.hp > damage_to_attacker;
            let floor = if can_capture { 0 } else { 1 };
            let new_hp = city.hp.saturating_sub(rolled).max(floor);
            damage_to_defender = city.hp - new_hp;
            state.city_mut(&city_id)?.hp = new_hp;
            defender_destroyed = new_hp == 0;
            defender_label = city_id.to_string();

            if defender_destroyed {
                // The attacker moves in after its own damage is applied below
                events.extend(capture_city(state, rules, &city_id, &attacker.owner)?);
                captured = true;
            }
        }
    }

    let attacker_destroyed = attacker.hp <= damage_to_attacker;
    if attacker_destroyed {
        state.remove_unit(attacker_id);
        record_kill(state, rules, &defender_civ, &attacker.owner);
        events.push(
            TurnEvent::new(
                turn,
                TurnEventKind::UnitDestroyed,
                Some(attacker.owner.clone()),
                format!(
                    "{} {} died attacking {}",
                    civ_name(state, &attacker.owner),
                    attacker.unit_type,
                    coord
                ),
            )
            .at(attacker.position),
        );
    } else {
        if captured {
            state.relocate_unit(attacker_id, coord);
        }
        if let Some(unit) = state.units.get_mut(attacker_id) {
            unit.take_damage(damage_to_attacker);
            unit.fortified = false;
            unit.exhaust();
            unit.animation = Some(AnimationHint {
                kind: if ranged { "ranged_attack" } else { "attack" }.to_string(),
                from: attacker.position,
                to: coord,
            });
        }
    }

    state.combat_log.push(CombatRecord {
        turn,
        attacker: attacker_id.clone(),
        attacker_civ: attacker.owner.clone(),
        defender: defender_label,
        defender_civ: defender_civ.clone(),
        ranged,
        damage_to_attacker,
        damage_to_defender,
        attacker_destroyed,
        defender_destroyed,
    });

    events.insert(
        0,
        TurnEvent::new(
            turn,
            TurnEventKind::Combat,
            Some(attacker.owner.clone()),
            format!(
                "{} {} {} {} at {}: dealt {}, took {}",
                civ_name(state, &attacker.owner),
                attacker.unit_type,
                if ranged { "bombarded" } else { "attacked" },
                civ_name(state, &defender_civ),
                coord,
                damage_to_defender,
                damage_to_attacker
            ),
        )
        .at(coord),
    );

    Ok(events)
}

/// Great general points for the winner, war weariness for the loser
fn record_kill(state: &mut CivGameState, rules: &Ruleset, winner: &CivId, loser: &CivId) {
    if let Some(civ) = state.civilizations.get_mut(winner) {
        *civ
            .great_people
            .progress
            .entry(GreatPersonKind::General)
            .or_insert(0) += rules.general.general_points_per_kill;
    }
    if let Some(civ) = state.civilizations.get_mut(loser) {
        civ.war_weariness += rules.general.war_weariness_per_loss;
    }
}

/// Transfer a city, its territory and its production to `new_owner`
pub fn capture_city(
    state: &mut CivGameState,
    rules: &Ruleset,
    city_id: &CityId,
    new_owner: &CivId,
) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let city = state.city(city_id)?.clone();
    let old_owner = city.owner.clone();

    {
        let city = state.city_mut(city_id)?;
        city.owner = new_owner.clone();
        city.is_capital = false;
        city.buildings.retain(|b| b != &rules.general.capital_building);
        city.hp = (city.max_hp / 2).max(1);
        city.population = city.population.saturating_sub(1).max(1);
        city.stored_food = 0;
    }

    if let Some(civ) = state.civilizations.get_mut(&old_owner) {
        civ.cities.retain(|c| c != city_id);
        civ.war_weariness += rules.general.war_weariness_per_loss;
    }
    if let Some(civ) = state.civilizations.get_mut(new_owner) {
        civ.cities.push(city_id.clone());
    }
    for civ in state.civilizations.values_mut() {
        civ.trade_routes
            .retain(|r| &r.from_city != city_id && &r.to_city != city_id);
    }

    for coord in city
        .position
        .within(city.border_radius, Metric::Chebyshev, state.grid_size)
    {
        if let Some(tile) = state.tile_mut(coord) {
            if tile.owner.as_ref() == Some(&old_owner) {
                tile.owner = Some(new_owner.clone());
            }
        }
    }

    tracing::info!(city = %city_id, from = %old_owner, to = %new_owner, "city captured");
    Ok(vec![TurnEvent::new(
        turn,
        TurnEventKind::CityCaptured,
        Some(new_owner.clone()),
        format!(
            "{} captured {} from {}",
            civ_name(state, new_owner),
            city.name,
            civ_name(state, &old_owner)
        ),
    )
    .at(city.position)])
}
