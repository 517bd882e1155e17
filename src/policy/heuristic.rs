//! Deterministic rule-based planner
//!
//! Shared by `LocalPolicy` and the synchronous local turn. Every decision is
//! a pure function of the state and a seed, so two runs over the same state
//! plan the same turn. Plans are checked against the current state before
//! being returned; the executor validates them again at resolution.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::actions::combat::target_at;
use crate::actions::movement::reachable;
use crate::actions::validate::{check_city_site, is_valid, trade_origin};
use crate::actions::Action;
use crate::core::types::{CivId, Coord, GreatPersonKind, ImprovementKind, Metric, Relationship, Terrain};
use crate::rules::{Ruleset, UnitAbility, UnitDef};
use crate::state::civilization::Civilization;
use crate::state::diplomacy::{DiplomacyMessage, MessageKind, MessageResponse, MessageTarget, OutgoingMessage};
use crate::state::game::CivGameState;
use crate::state::unit::Unit;
use crate::turn::economy::tile_yields;

/// The planner stops founding cities past this many
const MAX_CITIES: usize = 6;
/// How far a settler looks for a site
const SETTLE_SEARCH: u32 = 6;
/// Units below this share of max hp stop attacking melee
const RETREAT_HP_PCT: u32 = 40;
/// War weariness at which peace looks attractive
const PEACE_WEARINESS: i32 = 8;
/// Earliest turn the planner considers declaring war
const WAR_EARLIEST_TURN: u32 = 25;
/// Enemies farther than this from any own city are not worth a war
const WAR_REACH: u32 = 10;

/// Plan one turn of actions for `civ`
pub fn plan_actions(state: &CivGameState, rules: &Ruleset, civ: &CivId, seed: u64) -> Vec<Action> {
    let Some(civilization) = state.civilizations.get(civ).filter(|c| c.alive) else {
        return Vec::new();
    };
    let mut planner = Planner {
        state,
        rules,
        civ,
        civilization,
        rng: ChaCha8Rng::seed_from_u64(seed),
        reserved: BTreeSet::new(),
        gold: civilization.gold,
        actions: Vec::new(),
    };
    planner.research();
    planner.government();
    planner.great_people();
    planner.production();
    planner.units();
    planner.actions
}

struct Planner<'a> {
    state: &'a CivGameState,
    rules: &'a Ruleset,
    civ: &'a CivId,
    civilization: &'a Civilization,
    rng: ChaCha8Rng,
    /// Destinations already claimed by earlier moves in this plan
    reserved: BTreeSet<Coord>,
    gold: i64,
    actions: Vec<Action>,
}

impl<'a> Planner<'a> {
    fn push(&mut self, action: Action) -> bool {
        if !is_valid(self.state, self.rules, &action, self.civ) {
            return false;
        }
        if let Action::MoveUnit { x, y, .. } = &action {
            self.reserved.insert(Coord::new(*x, *y));
        }
        self.actions.push(action);
        true
    }

    fn has_tech(&self, tech: &Option<String>) -> bool {
        tech.as_ref().map_or(true, |t| self.civilization.research.has(t))
    }

    fn research(&mut self) {
        if self.civilization.research.current.is_some() {
            return;
        }
        let research = &self.civilization.research;
        let next = self
            .rules
            .techs()
            .filter(|t| !research.has(&t.id))
            .filter(|t| t.prerequisites.iter().all(|p| research.has(p)))
            .min_by_key(|t| (t.cost, t.id.clone()));
        if let Some(tech) = next {
            self.push(Action::SetResearch {
                tech_id: tech.id.clone(),
            });
        }
    }

    fn government(&mut self) {
        let civ = self.civilization;
        if civ.in_anarchy() || civ.is_at_war() || civ.government != self.rules.general.default_government {
            return;
        }
        let best = self
            .rules
            .governments()
            .filter(|g| g.id != civ.government && self.has_tech(&g.requires))
            .max_by_key(|g| (g.gold_pct + g.science_pct + g.production_pct + g.happiness * 10, g.id.clone()));
        if let Some(government) = best {
            self.push(Action::ChangeGovernment {
                government: government.id.clone(),
            });
        }
    }

    fn great_people(&mut self) {
        let producing = self
            .civilization
            .cities
            .iter()
            .filter_map(|id| self.state.cities.get(id))
            .find(|c| c.current_production.is_some())
            .map(|c| c.id.clone());
        for kind in self.civilization.great_people.available.clone() {
            let action = match kind {
                GreatPersonKind::Engineer => match &producing {
                    Some(city) => Action::ExpendGreatPerson {
                        kind,
                        city_id: Some(city.clone()),
                    },
                    None => continue,
                },
                GreatPersonKind::General if !self.civilization.is_at_war() => continue,
                _ => Action::ExpendGreatPerson { kind, city_id: None },
            };
            self.push(action);
        }
    }

    fn unit_def(&self, unit: &Unit) -> Option<&'a UnitDef> {
        self.rules.unit(&unit.unit_type).ok()
    }

    fn own_units(&self) -> impl Iterator<Item = &'a Unit> + '_ {
        let state = self.state;
        self.civilization.units.iter().filter_map(move |id| state.units.get(id))
    }

    fn count_units(&self, pred: impl Fn(&UnitDef) -> bool) -> usize {
        let queued = self
            .civilization
            .cities
            .iter()
            .filter_map(|id| self.state.cities.get(id))
            .filter_map(|c| c.current_production.as_ref())
            .filter_map(|o| self.rules.unit(&o.target).ok())
            .filter(|d| pred(d))
            .count();
        self.own_units()
            .filter_map(|u| self.unit_def(u))
            .filter(|d| pred(d))
            .count()
            + queued
    }

    fn best_military(&self) -> Option<&'a UnitDef> {
        self.rules
            .units()
            .filter(|d| is_soldier(d) && self.has_tech(&d.requires))
            .max_by_key(|d| (d.attack + d.defense, d.id.clone()))
    }

    fn production(&mut self) {
        let state = self.state;
        let city_count = self.civilization.cities.len();
        let mut soldiers = self.count_units(is_soldier);
        let mut settlers = self.count_units(|d| d.has_ability(UnitAbility::FoundCity));
        let mut workers = self.count_units(|d| d.has_ability(UnitAbility::BuildImprovements));
        let mut traders = self.count_units(|d| d.has_ability(UnitAbility::Trade));
        let mut claimed_buildings: BTreeSet<String> = BTreeSet::new();

        for city_id in self.civilization.cities.clone() {
            let Some(city) = state.cities.get(&city_id) else {
                continue;
            };
            if city.current_production.is_some() {
                continue;
            }

            let available_building = |only_parts: bool, claimed: &BTreeSet<String>| {
                self.rules
                    .buildings()
                    .filter(|b| b.buildable && self.has_tech(&b.requires))
                    .filter(|b| b.spaceship_part.is_some() == only_parts)
                    .filter(|b| !city.has_building(&b.id))
                    .filter(|b| b.spaceship_part.map_or(true, |p| !self.civilization.spaceship.has(p)))
                    .filter(|b| b.spaceship_part.is_none() || !claimed.contains(&b.id))
                    .min_by_key(|b| (b.cost, b.id.clone()))
                    .map(|b| b.id.clone())
            };

            let target = if let Some(part) = available_building(true, &claimed_buildings) {
                claimed_buildings.insert(part.clone());
                Some(part)
            } else if soldiers < city_count || (self.civilization.is_at_war() && soldiers < city_count * 3) {
                soldiers += 1;
                self.best_military().map(|d| d.id.clone())
            } else if city_count < MAX_CITIES && settlers == 0 && city.population >= 2 {
                settlers += 1;
                Some("settler".to_string())
            } else if workers < city_count {
                workers += 1;
                Some("worker".to_string())
            } else if let Some(building) = available_building(false, &claimed_buildings) {
                Some(building)
            } else if traders < city_count && self.has_tech(&Some("currency".to_string())) {
                traders += 1;
                Some("caravan".to_string())
            } else {
                self.best_military().map(|d| d.id.clone())
            };

            if let Some(target) = target {
                if self.rules.build_target(&target).is_ok() {
                    self.push(Action::Build { city_id, target });
                }
            }
        }
    }

    fn units(&mut self) {
        let units: Vec<Unit> = self.own_units().filter(|u| u.can_act()).cloned().collect();
        for unit in units {
            let Some(def) = self.unit_def(&unit) else {
                continue;
            };
            if self.try_upgrade(&unit, def) {
                continue;
            }
            if def.has_ability(UnitAbility::FoundCity) {
                self.settler(&unit);
            } else if def.has_ability(UnitAbility::BuildImprovements) {
                self.worker(&unit);
            } else if def.has_ability(UnitAbility::Trade) {
                self.caravan(&unit);
            } else if is_explorer(def) && !self.civilization.is_at_war() {
                if !self.attack(&unit) {
                    self.explore(&unit, def);
                }
            } else if def.is_military() {
                self.soldier(&unit);
            }
        }
    }

    fn try_upgrade(&mut self, unit: &Unit, def: &UnitDef) -> bool {
        if def.upgrades_to.is_none() || self.gold < def.upgrade_cost * 2 {
            return false;
        }
        if self.push(Action::UpgradeUnit {
            unit_id: unit.id.clone(),
        }) {
            self.gold -= def.upgrade_cost;
            return true;
        }
        false
    }

    fn move_to(&mut self, unit: &Unit, to: Coord) -> bool {
        if to == unit.position || self.reserved.contains(&to) {
            return false;
        }
        self.push(Action::MoveUnit {
            unit_id: unit.id.clone(),
            x: to.x,
            y: to.y,
        })
    }

    /// Reachable destinations this turn, excluding the origin and reserved tiles
    fn destinations(&self, unit: &Unit) -> Vec<(Coord, u32)> {
        reachable(self.state, self.rules, self.civ, unit.position, unit.movement_left)
            .into_iter()
            .filter(|(c, _)| *c != unit.position && !self.reserved.contains(c))
            .collect()
    }

    /// Step as close to `goal` as this turn's movement allows
    fn approach(&mut self, unit: &Unit, goal: Coord) -> bool {
        let current = unit.position.chebyshev(goal);
        let best = self
            .destinations(unit)
            .into_iter()
            .min_by_key(|(c, cost)| (c.chebyshev(goal), *cost, *c));
        match best {
            Some((dest, _)) if dest.chebyshev(goal) < current => self.move_to(unit, dest),
            _ => false,
        }
    }

    fn site_score(&self, center: Coord) -> i32 {
        center
            .within(1, Metric::Chebyshev, self.state.grid_size)
            .into_iter()
            .filter_map(|c| self.state.tile(c))
            .map(|t| {
                let y = tile_yields(self.state, self.rules, t.coord());
                let food_bonus = t
                    .resource
                    .and_then(|r| self.rules.resource(r))
                    .map_or(0, |r| if r.food { 3 } else { 1 });
                y.food * 2 + y.production + y.gold + food_bonus
            })
            .sum()
    }

    fn settler(&mut self, unit: &Unit) {
        if check_city_site(self.state, self.rules, self.civ, unit.position).is_ok()
            && self.push(Action::FoundCity {
                unit_id: unit.id.clone(),
                name: None,
            })
        {
            return;
        }

        let candidates: Vec<Coord> = unit
            .position
            .within(SETTLE_SEARCH, Metric::Chebyshev, self.state.grid_size)
            .into_iter()
            .filter(|c| self.civilization.knows(*c))
            .filter(|c| check_city_site(self.state, self.rules, self.civ, *c).is_ok())
            .filter(|c| !self.reserved.contains(c))
            .collect();
        let Some(goal) = candidates
            .into_iter()
            .max_by_key(|c| (self.site_score(*c) - unit.position.chebyshev(*c) as i32 * 2, std::cmp::Reverse(*c)))
        else {
            self.explore_any(unit);
            return;
        };

        let reach = reachable(self.state, self.rules, self.civ, unit.position, unit.movement_left);
        if reach.contains_key(&goal) {
            self.move_to(unit, goal);
        } else {
            self.approach(unit, goal);
        }
    }

    fn preferred_improvement(terrain: Terrain) -> Option<ImprovementKind> {
        match terrain {
            Terrain::Plains => Some(ImprovementKind::Farm),
            Terrain::Desert | Terrain::Hills | Terrain::Mountain => Some(ImprovementKind::Mine),
            Terrain::Forest => Some(ImprovementKind::Road),
            Terrain::Water => None,
        }
    }

    fn wants_improvement(&self, coord: Coord) -> Option<ImprovementKind> {
        let tile = self.state.tile(coord)?;
        if tile.owner.as_ref() != Some(self.civ) || tile.city_id.is_some() {
            return None;
        }
        match &tile.improvement {
            Some(imp) if !imp.complete => Some(imp.kind),
            Some(_) => None,
            None => Self::preferred_improvement(tile.terrain),
        }
    }

    fn worker(&mut self, unit: &Unit) {
        if let Some(improvement) = self.wants_improvement(unit.position) {
            if self.push(Action::BuildImprovement {
                unit_id: unit.id.clone(),
                improvement,
            }) {
                return;
            }
        }

        let mut options = self.destinations(unit);
        options.sort_by_key(|(c, cost)| (*cost, *c));
        if let Some((dest, _)) = options
            .into_iter()
            .find(|(c, _)| self.wants_improvement(*c).is_some())
        {
            self.move_to(unit, dest);
            return;
        }

        // Nothing nearby; head home
        let home = self
            .civilization
            .cities
            .iter()
            .filter_map(|id| self.state.cities.get(id))
            .min_by_key(|c| (c.position.chebyshev(unit.position), c.id.clone()))
            .map(|c| c.position);
        if let Some(home) = home {
            if home.chebyshev(unit.position) > 1 {
                self.approach(unit, home);
            }
        }
    }

    fn caravan(&mut self, unit: &Unit) {
        let Some(origin_id) = trade_origin(self.state, self.civ, unit.position) else {
            return;
        };
        let Some(origin) = self.state.cities.get(&origin_id) else {
            return;
        };
        let mut targets: Vec<_> = self
            .state
            .cities
            .values()
            .filter(|c| c.id != origin_id)
            .filter(|c| self.civilization.knows(c.position))
            .map(|c| {
                let foreign = c.owner != *self.civ;
                (foreign, origin.position.chebyshev(c.position), c.id.clone())
            })
            .collect();
        targets.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        for (_, _, target) in targets {
            if self.push(Action::EstablishTradeRoute {
                unit_id: unit.id.clone(),
                target_city_id: target,
            }) {
                return;
            }
        }
    }

    fn is_enemy(&self, owner: &CivId) -> bool {
        owner != self.civ && (owner.is_barbarian() || self.state.relationship(self.civ, owner) == Relationship::War)
    }

    /// Attack the weakest enemy in reach; returns whether an attack was planned
    fn attack(&mut self, unit: &Unit) -> bool {
        if let Some(range) = unit.range {
            let target = unit
                .position
                .within(range, Metric::Chebyshev, self.state.grid_size)
                .into_iter()
                .filter(|c| *c != unit.position)
                .filter(|c| matches!(target_at(self.state, *c), Some((_, owner)) if self.is_enemy(&owner)))
                .min_by_key(|c| (self.target_hp(*c), *c));
            if let Some(coord) = target {
                return self.push(Action::RangedAttack {
                    unit_id: unit.id.clone(),
                    x: coord.x,
                    y: coord.y,
                });
            }
            return false;
        }

        if unit.hp * 100 < unit.max_hp * RETREAT_HP_PCT {
            return false;
        }
        let target = unit
            .position
            .neighbors(self.state.grid_size)
            .into_iter()
            .filter(|c| matches!(target_at(self.state, *c), Some((_, owner)) if self.is_enemy(&owner)))
            .min_by_key(|c| (self.target_hp(*c), *c));
        match target {
            Some(coord) => self.push(Action::Attack {
                unit_id: unit.id.clone(),
                x: coord.x,
                y: coord.y,
            }),
            None => false,
        }
    }

    fn target_hp(&self, coord: Coord) -> u32 {
        self.state
            .unit_at(coord)
            .map(|u| u.hp)
            .or_else(|| self.state.city_at(coord).map(|c| c.hp))
            .unwrap_or(u32::MAX)
    }

    fn soldier(&mut self, unit: &Unit) {
        if self.attack(unit) {
            return;
        }

        if self.civilization.is_at_war() && unit.hp * 100 >= unit.max_hp * RETREAT_HP_PCT {
            let enemy = self
                .state
                .cities
                .values()
                .filter(|c| self.is_enemy(&c.owner) && self.civilization.knows(c.position))
                .map(|c| c.position)
                .chain(
                    self.state
                        .units
                        .values()
                        .filter(|u| self.is_enemy(&u.owner) && self.civilization.knows(u.position))
                        .map(|u| u.position),
                )
                .min_by_key(|c| (c.chebyshev(unit.position), *c));
            if let Some(goal) = enemy {
                if self.approach(unit, goal) {
                    return;
                }
            }
        }

        // Garrison an empty city, else hold position
        let own_cities: Vec<Coord> = self
            .civilization
            .cities
            .iter()
            .filter_map(|id| self.state.cities.get(id))
            .map(|c| c.position)
            .collect();
        if own_cities.contains(&unit.position) {
            if !unit.fortified {
                self.push(Action::Fortify {
                    unit_id: unit.id.clone(),
                });
            }
            return;
        }
        let empty_city = own_cities
            .iter()
            .copied()
            .filter(|c| self.state.unit_at(*c).is_none() && !self.reserved.contains(c))
            .min_by_key(|c| (c.chebyshev(unit.position), *c));
        if let Some(city) = empty_city {
            let reach = reachable(self.state, self.rules, self.civ, unit.position, unit.movement_left);
            if reach.contains_key(&city) {
                if self.move_to(unit, city) {
                    return;
                }
            } else if self.approach(unit, city) {
                return;
            }
        }
        if !unit.fortified {
            self.push(Action::Fortify {
                unit_id: unit.id.clone(),
            });
        }
    }

    /// Move where the most unknown tiles come into view
    fn explore(&mut self, unit: &Unit, def: &UnitDef) {
        let mut options = self.destinations(unit);
        options.shuffle(&mut self.rng);
        let civ = self.civilization;
        let grid_size = self.state.grid_size;
        let best = options
            .iter()
            .map(|(c, _)| {
                let unknown = c
                    .within(def.vision, def.vision_metric, grid_size)
                    .into_iter()
                    .filter(|t| !civ.knows(*t))
                    .count();
                (unknown, *c)
            })
            .max_by_key(|(unknown, _)| *unknown);
        match best {
            Some((unknown, dest)) if unknown > 0 => {
                self.move_to(unit, dest);
            }
            _ => self.explore_any(unit),
        }
    }

    /// Random reachable step
    fn explore_any(&mut self, unit: &Unit) {
        let options = self.destinations(unit);
        if let Some((dest, _)) = options.choose(&mut self.rng).copied() {
            self.move_to(unit, dest);
        }
    }
}

/// A fighting unit: can attack and has no civilian ability
fn is_soldier(def: &UnitDef) -> bool {
    def.is_military() && def.abilities.is_empty() && !is_explorer(def)
}

fn is_explorer(def: &UnitDef) -> bool {
    def.is_military() && def.abilities.is_empty() && def.vision > 2
}

/// Total attack plus defense of a civilization's fighting units
pub fn military_strength(state: &CivGameState, rules: &Ruleset, civ: &CivId) -> u32 {
    state
        .units
        .values()
        .filter(|u| &u.owner == civ)
        .filter(|u| rules.unit(&u.unit_type).map(is_soldier).unwrap_or(false))
        .map(|u| u.attack + u.defense)
        .sum()
}

fn has_pending(state: &CivGameState, from: &CivId, to: &CivId, kind: MessageKind) -> bool {
    state.diplomacy_log.iter().any(|m| {
        &m.from == from && m.to == MessageTarget::Civ(to.clone()) && m.kind == kind && m.is_pending_proposal()
    })
}

/// Diplomatic drafts for `civ`: answers to pending proposals, then at most
/// one initiative of its own
pub fn plan_diplomacy(
    state: &CivGameState,
    rules: &Ruleset,
    civ: &CivId,
    inbox: &[DiplomacyMessage],
) -> Vec<OutgoingMessage> {
    let Some(me) = state.civilizations.get(civ).filter(|c| c.alive) else {
        return Vec::new();
    };
    let my_strength = military_strength(state, rules, civ);
    let mut drafts = Vec::new();

    for proposal in inbox.iter().filter(|m| m.is_pending_proposal() && &m.from != civ) {
        let relation = me.relationship(&proposal.from);
        let accept = match proposal.kind {
            MessageKind::PeaceOffer => {
                me.war_weariness >= PEACE_WEARINESS
                    || my_strength <= military_strength(state, rules, &proposal.from)
            }
            MessageKind::TradeProposal => relation != Relationship::Hostile && relation != Relationship::War,
            MessageKind::AllianceProposal => relation == Relationship::Friendly,
            _ => continue,
        };
        let (response, text) = if accept {
            (MessageResponse::Accepted, "We agree.")
        } else {
            (MessageResponse::Rejected, "We decline.")
        };
        drafts.push(OutgoingMessage::reply(
            proposal.from.clone(),
            &proposal.id,
            proposal.kind,
            response,
            text,
        ));
    }

    let others: Vec<CivId> = state.living_civs().into_iter().filter(|c| c != civ).collect();
    let turn = state.turn;

    // Sue for peace when the war is wearing us down
    if let Some(enemy) = others.iter().find(|o| {
        me.relationship(o) == Relationship::War
            && me.war_weariness >= PEACE_WEARINESS
            && !has_pending(state, civ, o, MessageKind::PeaceOffer)
    }) {
        drafts.push(OutgoingMessage::new(
            MessageTarget::Civ(enemy.clone()),
            MessageKind::PeaceOffer,
            format!("{} seeks an end to this war.", me.name),
        ));
        return drafts;
    }

    if turn >= WAR_EARLIEST_TURN && turn % 5 == 0 && !me.is_at_war() {
        let own_cities: Vec<Coord> = state
            .cities
            .values()
            .filter(|c| &c.owner == civ)
            .map(|c| c.position)
            .collect();
        let victim = others
            .iter()
            .filter(|o| matches!(me.relationship(o), Relationship::Neutral | Relationship::Hostile))
            .filter(|o| {
                state.cities.values().any(|c| {
                    &c.owner == *o
                        && me.knows(c.position)
                        && own_cities.iter().any(|p| p.chebyshev(c.position) <= WAR_REACH)
                })
            })
            .map(|o| (military_strength(state, rules, o), o))
            .filter(|(strength, _)| my_strength >= strength.saturating_mul(2).max(1))
            .min_by_key(|(strength, o)| (*strength, (*o).clone()));
        if let Some((_, victim)) = victim {
            drafts.push(OutgoingMessage::new(
                MessageTarget::Civ(victim.clone()),
                MessageKind::WarDeclaration,
                format!("{} will no longer tolerate {}.", me.name, victim),
            ));
            return drafts;
        }
    }

    if turn % 7 == 0 {
        if let Some(partner) = others.iter().find(|o| {
            me.relationship(o) == Relationship::Neutral && !has_pending(state, civ, o, MessageKind::TradeProposal)
        }) {
            drafts.push(OutgoingMessage::new(
                MessageTarget::Civ(partner.clone()),
                MessageKind::TradeProposal,
                format!("{} proposes an exchange of goods.", me.name),
            ));
            return drafts;
        }
    }

    if turn % 11 == 0 {
        if let Some(friend) = others.iter().find(|o| {
            me.relationship(o) == Relationship::Friendly
                && !has_pending(state, civ, o, MessageKind::AllianceProposal)
        }) {
            drafts.push(OutgoingMessage::new(
                MessageTarget::Civ(friend.clone()),
                MessageKind::AllianceProposal,
                format!("{} offers a lasting alliance.", me.name),
            ));
        }
    }

    drafts
}
