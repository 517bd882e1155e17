//! Action execution
//!
//! `execute` validates first; an invalid action is skipped with a debug log
//! and leaves the state untouched. Execution is a pure function of the
//! state, the action and the rng seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::actions::action::Action;
use crate::actions::combat::resolve_attack;
use crate::actions::movement::path_cost;
use crate::actions::validate::{trade_origin, validate};
use crate::core::error::{CivError, Result};
use crate::core::types::{CityId, CivId, Coord, GreatPersonKind, UnitId};
use crate::fog;
use crate::rules::{BuildTarget, Ruleset};
use crate::state::city::{City, ProductionKind, ProductionOrder};
use crate::state::civilization::{CombatBuff, TradeRoute};
use crate::state::events::{TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;
use crate::state::tile::TileImprovement;
use crate::state::unit::{AnimationHint, Unit};
use crate::turn::economy;

/// Validate and apply one action, returning the events it produced
pub fn execute(
    state: &mut CivGameState,
    rules: &Ruleset,
    action: &Action,
    civ: &CivId,
    rng_seed: u64,
) -> Vec<TurnEvent> {
    if let Err(rejection) = validate(state, rules, action, civ) {
        tracing::debug!(civ = %civ, action = action.name(), %rejection, "skipping invalid action");
        return Vec::new();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
    match apply(state, rules, action, civ, &mut rng) {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(civ = %civ, action = action.name(), error = %e, "validated action failed");
            Vec::new()
        }
    }
}

fn apply(
    state: &mut CivGameState,
    rules: &Ruleset,
    action: &Action,
    civ: &CivId,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<TurnEvent>> {
    let turn = state.turn;
    let event = |kind, desc: String| TurnEvent::new(turn, kind, Some(civ.clone()), desc);

    match action {
        Action::MoveUnit { unit_id, x, y } => {
            let to = Coord::new(*x, *y);
            let from = state.unit(unit_id)?.position;
            let cost = path_cost(state, rules, civ, from, to).unwrap_or(0);
            state.relocate_unit(unit_id, to);
            let unit_type = {
                let unit = state
                    .units
                    .get_mut(unit_id)
                    .ok_or_else(|| CivError::UnitNotFound(unit_id.clone()))?;
                unit.movement_left = unit.movement_left.saturating_sub(cost);
                unit.fortified = false;
                unit.animation = Some(AnimationHint {
                    kind: "move".into(),
                    from,
                    to,
                });
                unit.unit_type.clone()
            };
            let def = rules.unit(&unit_type)?;
            let grid_size = state.grid_size;
            fog::reveal(state.civ_mut(civ)?, to, def.vision, def.vision_metric, grid_size);
            Ok(vec![event(
                TurnEventKind::UnitMoved,
                format!("{} moved from {} to {}", unit_type, from, to),
            )
            .at(to)])
        }

        Action::Attack { unit_id, x, y } => {
            resolve_attack(state, rules, unit_id, Coord::new(*x, *y), false, rng)
        }

        Action::RangedAttack { unit_id, x, y } => {
            resolve_attack(state, rules, unit_id, Coord::new(*x, *y), true, rng)
        }

        Action::FoundCity { unit_id, name } => {
            let position = state.unit(unit_id)?.position;
            let name = match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                Some(n) => n.to_string(),
                None => state
                    .civ(civ)?
                    .next_city_name(|n| state.cities.values().any(|c| c.name == n)),
            };
            state.remove_unit(unit_id);
            establish_city(state, rules, civ, position, name.clone())?;
            fog::refresh_vision(state, rules, civ)?;
            Ok(vec![event(
                TurnEventKind::CityFounded,
                format!("{} founded {} at {}", state.civ(civ)?.name, name, position),
            )
            .at(position)])
        }

        Action::Build { city_id, target } => {
            let (kind, cost) = match rules.build_target(target)? {
                BuildTarget::Unit(def) => (ProductionKind::Unit, def.cost),
                BuildTarget::Building(def) => (ProductionKind::Building, def.cost),
            };
            let city = state.city_mut(city_id)?;
            let unchanged = city
                .current_production
                .as_ref()
                .map_or(false, |o| &o.target == target);
            if !unchanged {
                city.current_production = Some(ProductionOrder::new(kind, target.clone(), cost));
            }
            let desc = format!("{} is building {}", city.name, target);
            let position = city.position;
            Ok(vec![event(TurnEventKind::ProductionSet, desc).at(position)])
        }

        Action::BuildImprovement {
            unit_id,
            improvement,
        } => {
            let turns = rules.improvement(*improvement)?.turns;
            let position = state.unit(unit_id)?.position;
            let tile = state
                .tile_mut(position)
                .ok_or_else(|| CivError::Invariant(format!("no tile at {}", position)))?;
            let continuing = matches!(
                &tile.improvement,
                Some(existing) if existing.kind == *improvement && !existing.complete
            );
            if !continuing {
                tile.improvement = Some(TileImprovement {
                    kind: *improvement,
                    progress: 0,
                    turns_required: turns,
                    complete: false,
                });
            }
            let mut completed = false;
            if let Some(work) = tile.improvement.as_mut() {
                work.progress = (work.progress + 1).min(work.turns_required);
                completed = work.progress >= work.turns_required;
                work.complete = completed;
            }
            if let Some(unit) = state.units.get_mut(unit_id) {
                unit.fortified = false;
                unit.exhaust();
            }
            let name = format!("{:?}", improvement).to_lowercase();
            Ok(vec![if completed {
                event(
                    TurnEventKind::ImprovementCompleted,
                    format!("{} completed at {}", name, position),
                )
                .at(position)
            } else {
                event(
                    TurnEventKind::ImprovementStarted,
                    format!("work on {} continues at {}", name, position),
                )
                .at(position)
            }])
        }

        Action::SetResearch { tech_id } => {
            let cost = rules.tech(tech_id)?.cost;
            let civilization = state.civ_mut(civ)?;
            civilization.research.switch_to(tech_id, cost);
            Ok(vec![event(
                TurnEventKind::ResearchSet,
                format!("{} began researching {}", civilization.name, tech_id),
            )])
        }

        Action::Fortify { unit_id } => {
            let unit = state
                .units
                .get_mut(unit_id)
                .ok_or_else(|| CivError::UnitNotFound(unit_id.clone()))?;
            unit.fortified = true;
            unit.exhaust();
            let desc = format!("{} fortified at {}", unit.unit_type, unit.position);
            let position = unit.position;
            Ok(vec![event(TurnEventKind::UnitFortified, desc).at(position)])
        }

        Action::UpgradeUnit { unit_id } => {
            let unit = state.unit(unit_id)?.clone();
            let def = rules.unit(&unit.unit_type)?;
            let cost = def.upgrade_cost;
            let target = rules.unit(def.upgrades_to.as_deref().unwrap_or_default())?;
            state.civ_mut(civ)?.gold -= cost;

            let mut upgraded = Unit::from_def(unit.id.clone(), target, unit.owner.clone(), unit.position);
            upgraded.hp = ((target.hp as u64 * unit.hp as u64) / unit.max_hp.max(1) as u64).max(1) as u32;
            upgraded.exhaust();
            state.units.insert(unit.id.clone(), upgraded);
            Ok(vec![event(
                TurnEventKind::UnitUpgraded,
                format!("{} upgraded to {} for {} gold", unit.unit_type, target.id, cost),
            )
            .at(unit.position)])
        }

        Action::EstablishTradeRoute {
            unit_id,
            target_city_id,
        } => {
            let position = state.unit(unit_id)?.position;
            let origin_id = trade_origin(state, civ, position)
                .ok_or_else(|| CivError::Invariant("trade route without origin".into()))?;
            let origin = state.city(&origin_id)?.clone();
            let target = state.city(target_city_id)?.clone();
            let distance = origin.position.chebyshev(target.position) as i64;
            let foreign = target.owner != *civ;
            let g = &rules.general;
            let gold_per_turn = g.trade_route_base_gold + distance / 3 + i64::from(foreign);

            let id = state.next_id("route");
            state.remove_unit(unit_id);
            state.civ_mut(civ)?.trade_routes.push(TradeRoute {
                id,
                from_city: origin_id,
                to_city: target_city_id.clone(),
                partner: target.owner.clone(),
                gold_per_turn,
                turns_remaining: g.trade_route_duration,
            });
            Ok(vec![event(
                TurnEventKind::TradeRouteEstablished,
                format!(
                    "trade route from {} to {} earns {} gold per turn",
                    origin.name, target.name, gold_per_turn
                ),
            )
            .at(target.position)])
        }

        Action::ChangeGovernment { government } => {
            let anarchy = rules.general.anarchy_turns;
            let civilization = state.civ_mut(civ)?;
            civilization.government = government.clone();
            civilization.anarchy_turns = anarchy;
            Ok(vec![event(
                TurnEventKind::GovernmentChanged,
                format!(
                    "{} adopted {} after {} turns of anarchy",
                    civilization.name, government, anarchy
                ),
            )])
        }

        Action::ExpendGreatPerson { kind, city_id } => {
            let g = &rules.general;
            let civilization = state.civ_mut(civ)?;
            if let Some(i) = civilization.great_people.available.iter().position(|k| k == kind) {
                civilization.great_people.available.remove(i);
            }
            let effect = match kind {
                GreatPersonKind::Scientist => {
                    let research = &mut civilization.research;
                    research.progress = (research.progress + g.scientist_research_bonus).min(research.cost);
                    format!("{} research points", g.scientist_research_bonus)
                }
                GreatPersonKind::Merchant => {
                    civilization.gold += g.merchant_gold;
                    format!("{} gold", g.merchant_gold)
                }
                GreatPersonKind::Artist => {
                    civilization.golden_age.points += g.artist_golden_age_points;
                    format!("{} golden age points", g.artist_golden_age_points)
                }
                GreatPersonKind::General => {
                    civilization.combat_buff = Some(CombatBuff {
                        percent: g.general_combat_bonus_pct,
                        turns_remaining: g.general_bonus_turns,
                    });
                    format!("+{}% combat strength", g.general_combat_bonus_pct)
                }
                GreatPersonKind::Engineer => {
                    let city_id = city_id
                        .as_ref()
                        .ok_or_else(|| CivError::Invariant("engineer without a city".into()))?;
                    let city = state.city_mut(city_id)?;
                    if let Some(order) = city.current_production.as_mut() {
                        order.advance(g.engineer_production_bonus);
                    }
                    format!("{} production in {}", g.engineer_production_bonus, city.name)
                }
            };
            Ok(vec![event(
                TurnEventKind::GreatPersonExpended,
                format!("great {:?} expended: {}", kind, effect).to_lowercase(),
            )])
        }
    }
}

/// Create a city for `owner` at `position` and claim its territory
///
/// The city becomes the capital when its owner has none.
pub fn establish_city(
    state: &mut CivGameState,
    rules: &Ruleset,
    owner: &CivId,
    position: Coord,
    name: String,
) -> Result<CityId> {
    let g = &rules.general;
    state.civ(owner)?;
    let is_capital = !state.cities.values().any(|c| &c.owner == owner && c.is_capital);
    let buildings = if is_capital {
        vec![g.capital_building.clone()]
    } else {
        Vec::new()
    };

    let id = CityId::from(state.next_id("city"));
    let city = City {
        id: id.clone(),
        name,
        owner: owner.clone(),
        position,
        population: 1,
        stored_food: 0,
        yields: Default::default(),
        stored_culture: 0,
        border_radius: g.starting_border_radius,
        defense: economy::city_defense(rules, &buildings),
        buildings,
        current_production: None,
        hp: g.city_base_hp,
        max_hp: g.city_base_hp,
        happiness: 0,
        is_capital,
    };
    state.add_city(city);
    state.claim_territory(position, g.starting_border_radius, owner);
    economy::refresh_city_yields(state, rules, &id)?;
    Ok(id)
}

/// Create a unit of `unit_type` for `owner` at `position`
pub fn spawn_unit(
    state: &mut CivGameState,
    rules: &Ruleset,
    owner: &CivId,
    unit_type: &str,
    position: Coord,
) -> Result<UnitId> {
    let def = rules.unit(unit_type)?;
    let id = UnitId::from(state.next_id("unit"));
    state.add_unit(Unit::from_def(id.clone(), def, owner.clone(), position));
    Ok(id)
}
