//! Action validation
//!
//! Validation is read-only. A rejected action is an expected outcome for an
//! unreliable decision-maker, so rejections are a separate type from
//! `CivError`.

use thiserror::Error;

use crate::actions::action::Action;
use crate::actions::combat::target_at;
use crate::actions::movement::{can_enter, path_cost};
use crate::core::types::{CityId, CivId, Coord, GreatPersonKind, Relationship, UnitId};
use crate::rules::{BuildTarget, Ruleset, UnitAbility};
use crate::state::civilization::Civilization;
use crate::state::game::CivGameState;
use crate::state::unit::Unit;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("civilization {0} is not playing")]
    CivNotPlaying(CivId),
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),
    #[error("unit {0} belongs to another civilization")]
    NotOwner(UnitId),
    #[error("unit {0} has already acted this turn")]
    AlreadyActed(UnitId),
    #[error("{0} is off the map")]
    OutOfBounds(Coord),
    #[error("{0} cannot be entered")]
    Blocked(Coord),
    #[error("no path to {0}")]
    Unreachable(Coord),
    #[error("move needs {needed} movement, {available} left")]
    InsufficientMovement { needed: u32, available: u32 },
    #[error("target {0} is out of range")]
    OutOfRange(Coord),
    #[error("unit cannot perform {0}")]
    MissingAbility(&'static str),
    #[error("nothing to attack at {0}")]
    NoTarget(Coord),
    #[error("not at war with {0}")]
    NotAtWar(CivId),
    #[error("{0}")]
    InvalidSite(String),
    #[error("unknown city {0}")]
    UnknownCity(CityId),
    #[error("city {0} belongs to another civilization")]
    NotCityOwner(CityId),
    #[error("unknown {kind} '{id}'")]
    UnknownRule { kind: &'static str, id: String },
    #[error("requires tech '{0}'")]
    TechRequired(String),
    #[error("{0} cannot be built")]
    NotBuildable(String),
    #[error("{0} is already built")]
    AlreadyBuilt(String),
    #[error("tech '{0}' is already researched")]
    AlreadyResearched(String),
    #[error("already researching '{0}'")]
    AlreadyResearching(String),
    #[error("unit is already fortified")]
    AlreadyFortified,
    #[error("no upgrade path for {0}")]
    NoUpgradePath(String),
    #[error("needs {needed} gold, has {available}")]
    NotEnoughGold { needed: i64, available: i64 },
    #[error("must be inside own territory")]
    OutsideTerritory,
    #[error("invalid trade route: {0}")]
    InvalidTradeRoute(String),
    #[error("already governed by {0}")]
    SameGovernment(String),
    #[error("government change already in progress")]
    InAnarchy,
    #[error("no {0:?} available")]
    NoGreatPerson(GreatPersonKind),
    #[error("{0}")]
    NothingToApply(String),
}

type Check = std::result::Result<(), Rejection>;

/// Check whether `civ` may perform `action` against the current state
pub fn validate(state: &CivGameState, rules: &Ruleset, action: &Action, civ: &CivId) -> Check {
    let Some(civilization) = state.civilizations.get(civ).filter(|c| c.alive) else {
        return Err(Rejection::CivNotPlaying(civ.clone()));
    };

    match action {
        Action::MoveUnit { unit_id, x, y } => {
            let unit = ready_unit(state, unit_id, civ)?;
            let to = Coord::new(*x, *y);
            if !to.in_bounds(state.grid_size) {
                return Err(Rejection::OutOfBounds(to));
            }
            if to == unit.position || !can_enter(state, rules, civ, to) {
                return Err(Rejection::Blocked(to));
            }
            let needed = path_cost(state, rules, civ, unit.position, to)
                .ok_or(Rejection::Unreachable(to))?;
            if needed > unit.movement_left {
                return Err(Rejection::InsufficientMovement {
                    needed,
                    available: unit.movement_left,
                });
            }
            Ok(())
        }

        Action::Attack { unit_id, x, y } | Action::RangedAttack { unit_id, x, y } => {
            let ranged = matches!(action, Action::RangedAttack { .. });
            let unit = ready_unit(state, unit_id, civ)?;
            let to = Coord::new(*x, *y);
            if !to.in_bounds(state.grid_size) {
                return Err(Rejection::OutOfBounds(to));
            }
            if unit.attack == 0 {
                return Err(Rejection::MissingAbility("attack"));
            }
            let distance = unit.position.chebyshev(to);
            if ranged {
                let range = unit.range.ok_or(Rejection::MissingAbility("ranged_attack"))?;
                if distance == 0 || distance > range {
                    return Err(Rejection::OutOfRange(to));
                }
            } else if distance != 1 {
                return Err(Rejection::OutOfRange(to));
            }
            let (_, owner) = target_at(state, to).ok_or(Rejection::NoTarget(to))?;
            if owner == *civ {
                return Err(Rejection::NoTarget(to));
            }
            if !owner.is_barbarian() && state.relationship(civ, &owner) != Relationship::War {
                return Err(Rejection::NotAtWar(owner));
            }
            Ok(())
        }

        Action::FoundCity { unit_id, .. } => {
            let unit = unacted_unit(state, unit_id, civ)?;
            require_ability(rules, unit, UnitAbility::FoundCity, "found_city")?;
            check_city_site(state, rules, civ, unit.position)
        }

        Action::Build { city_id, target } => {
            let city = state
                .cities
                .get(city_id)
                .ok_or_else(|| Rejection::UnknownCity(city_id.clone()))?;
            if &city.owner != civ {
                return Err(Rejection::NotCityOwner(city_id.clone()));
            }
            match rules.build_target(target).map_err(|_| Rejection::UnknownRule {
                kind: "build target",
                id: target.clone(),
            })? {
                BuildTarget::Unit(def) => require_tech(civilization, &def.requires),
                BuildTarget::Building(def) => {
                    if !def.buildable {
                        return Err(Rejection::NotBuildable(def.id.clone()));
                    }
                    require_tech(civilization, &def.requires)?;
                    if city.has_building(&def.id) {
                        return Err(Rejection::AlreadyBuilt(def.id.clone()));
                    }
                    if let Some(part) = def.spaceship_part {
                        if civilization.spaceship.has(part) {
                            return Err(Rejection::AlreadyBuilt(def.id.clone()));
                        }
                    }
                    Ok(())
                }
            }
        }

        Action::BuildImprovement {
            unit_id,
            improvement,
        } => {
            let unit = unacted_unit(state, unit_id, civ)?;
            require_ability(rules, unit, UnitAbility::BuildImprovements, "build_improvement")?;
            let def = rules
                .improvement(*improvement)
                .map_err(|_| Rejection::UnknownRule {
                    kind: "improvement",
                    id: format!("{:?}", improvement).to_lowercase(),
                })?;
            let tile = state
                .tile(unit.position)
                .ok_or(Rejection::OutOfBounds(unit.position))?;
            if !def.terrain.contains(&tile.terrain) {
                return Err(Rejection::InvalidSite(format!(
                    "{:?} cannot be built on {:?}",
                    improvement, tile.terrain
                )));
            }
            if tile.owner.as_ref().map_or(false, |o| o != civ) {
                return Err(Rejection::InvalidSite("tile belongs to another civilization".into()));
            }
            if tile.completed_improvement() == Some(*improvement) {
                return Err(Rejection::AlreadyBuilt(format!("{:?}", improvement).to_lowercase()));
            }
            Ok(())
        }

        Action::SetResearch { tech_id } => {
            let tech = rules.tech(tech_id).map_err(|_| Rejection::UnknownRule {
                kind: "tech",
                id: tech_id.clone(),
            })?;
            let research = &civilization.research;
            if research.has(tech_id) {
                return Err(Rejection::AlreadyResearched(tech_id.clone()));
            }
            if research.current.as_deref() == Some(tech_id.as_str()) {
                return Err(Rejection::AlreadyResearching(tech_id.clone()));
            }
            match tech.prerequisites.iter().find(|p| !research.has(p)) {
                Some(missing) => Err(Rejection::TechRequired(missing.clone())),
                None => Ok(()),
            }
        }

        Action::Fortify { unit_id } => {
            let unit = unacted_unit(state, unit_id, civ)?;
            if unit.fortified {
                return Err(Rejection::AlreadyFortified);
            }
            Ok(())
        }

        Action::UpgradeUnit { unit_id } => {
            let unit = unacted_unit(state, unit_id, civ)?;
            let def = rules.unit(&unit.unit_type).map_err(|_| Rejection::UnknownRule {
                kind: "unit",
                id: unit.unit_type.clone(),
            })?;
            let target = def
                .upgrades_to
                .as_ref()
                .ok_or_else(|| Rejection::NoUpgradePath(unit.unit_type.clone()))?;
            let target_def = rules.unit(target).map_err(|_| Rejection::UnknownRule {
                kind: "unit",
                id: target.clone(),
            })?;
            require_tech(civilization, &target_def.requires)?;
            require_gold(civilization, def.upgrade_cost)?;
            let owner = state.tile(unit.position).and_then(|t| t.owner.as_ref());
            if owner != Some(civ) {
                return Err(Rejection::OutsideTerritory);
            }
            Ok(())
        }

        Action::EstablishTradeRoute {
            unit_id,
            target_city_id,
        } => {
            let unit = unacted_unit(state, unit_id, civ)?;
            require_ability(rules, unit, UnitAbility::Trade, "establish_trade_route")?;
            let target = state
                .cities
                .get(target_city_id)
                .ok_or_else(|| Rejection::UnknownCity(target_city_id.clone()))?;
            let origin_id = trade_origin(state, civ, unit.position)
                .ok_or_else(|| Rejection::InvalidTradeRoute("no home city".into()))?;
            if origin_id == *target_city_id {
                return Err(Rejection::InvalidTradeRoute("target is the origin city".into()));
            }
            if target.owner != *civ && state.relationship(civ, &target.owner) == Relationship::War {
                return Err(Rejection::InvalidTradeRoute(format!("at war with {}", target.owner)));
            }
            let origin = &state.cities[&origin_id];
            if origin.position.chebyshev(target.position) > rules.general.trade_route_range {
                return Err(Rejection::OutOfRange(target.position));
            }
            if civilization
                .trade_routes
                .iter()
                .any(|r| r.from_city == origin_id && &r.to_city == target_city_id)
            {
                return Err(Rejection::InvalidTradeRoute("route already exists".into()));
            }
            Ok(())
        }

        Action::ChangeGovernment { government } => {
            let def = rules.government(government).map_err(|_| Rejection::UnknownRule {
                kind: "government",
                id: government.clone(),
            })?;
            if civilization.government == *government {
                return Err(Rejection::SameGovernment(government.clone()));
            }
            if civilization.in_anarchy() {
                return Err(Rejection::InAnarchy);
            }
            require_tech(civilization, &def.requires)
        }

        Action::ExpendGreatPerson { kind, city_id } => {
            if !civilization.great_people.available.contains(kind) {
                return Err(Rejection::NoGreatPerson(*kind));
            }
            match kind {
                GreatPersonKind::Scientist if civilization.research.current.is_none() => Err(
                    Rejection::NothingToApply("no research in progress".into()),
                ),
                GreatPersonKind::Engineer => {
                    let city_id = city_id
                        .as_ref()
                        .ok_or_else(|| Rejection::NothingToApply("engineer needs a city".into()))?;
                    let city = state
                        .cities
                        .get(city_id)
                        .ok_or_else(|| Rejection::UnknownCity(city_id.clone()))?;
                    if &city.owner != civ {
                        return Err(Rejection::NotCityOwner(city_id.clone()));
                    }
                    if city.current_production.is_none() {
                        return Err(Rejection::NothingToApply("city is not producing".into()));
                    }
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }
}

/// Boolean wrapper around [`validate`]
pub fn is_valid(state: &CivGameState, rules: &Ruleset, action: &Action, civ: &CivId) -> bool {
    validate(state, rules, action, civ).is_ok()
}

/// Whether `position` is a legal site for a new city of `civ`
pub fn check_city_site(state: &CivGameState, rules: &Ruleset, civ: &CivId, position: Coord) -> Check {
    let tile = state
        .tile(position)
        .ok_or(Rejection::OutOfBounds(position))?;
    if !tile.terrain.is_land() || !rules.terrain(tile.terrain).passable {
        return Err(Rejection::InvalidSite("cities must be founded on land".into()));
    }
    if tile.city_id.is_some() {
        return Err(Rejection::InvalidSite("tile already has a city".into()));
    }
    if tile.owner.as_ref().map_or(false, |o| o != civ) {
        return Err(Rejection::InvalidSite("tile belongs to another civilization".into()));
    }
    let min = rules.general.city_min_distance;
    if let Some(near) = state
        .cities
        .values()
        .find(|c| c.position.chebyshev(position) < min)
    {
        return Err(Rejection::InvalidSite(format!(
            "too close to {} (minimum distance {})",
            near.name, min
        )));
    }
    Ok(())
}

/// The civilization's city closest to `position`, used as a route's origin
pub fn trade_origin(state: &CivGameState, civ: &CivId, position: Coord) -> Option<CityId> {
    let civilization = state.civilizations.get(civ)?;
    civilization
        .cities
        .iter()
        .filter_map(|id| state.cities.get(id))
        .min_by_key(|c| (c.position.chebyshev(position), c.id.clone()))
        .map(|c| c.id.clone())
}

fn owned_unit<'a>(state: &'a CivGameState, unit_id: &UnitId, civ: &CivId) -> std::result::Result<&'a Unit, Rejection> {
    let unit = state
        .units
        .get(unit_id)
        .ok_or_else(|| Rejection::UnknownUnit(unit_id.clone()))?;
    if &unit.owner != civ {
        return Err(Rejection::NotOwner(unit_id.clone()));
    }
    Ok(unit)
}

/// Owned and has not acted this turn
fn unacted_unit<'a>(state: &'a CivGameState, unit_id: &UnitId, civ: &CivId) -> std::result::Result<&'a Unit, Rejection> {
    let unit = owned_unit(state, unit_id, civ)?;
    if unit.acted_this_turn {
        return Err(Rejection::AlreadyActed(unit_id.clone()));
    }
    Ok(unit)
}

/// Owned, has not acted and still has movement
fn ready_unit<'a>(state: &'a CivGameState, unit_id: &UnitId, civ: &CivId) -> std::result::Result<&'a Unit, Rejection> {
    let unit = unacted_unit(state, unit_id, civ)?;
    if unit.movement_left == 0 {
        return Err(Rejection::InsufficientMovement {
            needed: 1,
            available: 0,
        });
    }
    Ok(unit)
}

fn require_ability(rules: &Ruleset, unit: &Unit, ability: UnitAbility, name: &'static str) -> Check {
    let has = rules
        .unit(&unit.unit_type)
        .map(|d| d.has_ability(ability))
        .unwrap_or(false);
    if has {
        Ok(())
    } else {
        Err(Rejection::MissingAbility(name))
    }
}

fn require_tech(civ: &Civilization, tech: &Option<String>) -> Check {
    match tech {
        Some(t) if !civ.research.has(t) => Err(Rejection::TechRequired(t.clone())),
        _ => Ok(()),
    }
}

fn require_gold(civ: &Civilization, needed: i64) -> Check {
    if civ.gold < needed {
        Err(Rejection::NotEnoughGold {
            needed,
            available: civ.gold,
        })
    } else {
        Ok(())
    }
}
