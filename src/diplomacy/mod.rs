//! Diplomacy resolver - the relationship state machine
//!
//! Policy drafts are checked against current relationships, appended to the
//! log and, where they carry weight (declarations, accepted proposals),
//! applied to both sides at once so relationships stay symmetric.

use thiserror::Error;

use crate::core::types::{CivId, Relationship};
use crate::state::diplomacy::{DiplomacyMessage, MessageKind, MessageResponse, MessageTarget, OutgoingMessage};
use crate::state::events::{TurnEvent, TurnEventKind};
use crate::state::game::CivGameState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiplomacyRejection {
    #[error("{0} is not a living civilization")]
    UnknownCiv(CivId),
    #[error("cannot address oneself")]
    SelfAddressed,
    #[error("{0:?} must be addressed to a single civilization")]
    NeedsRecipient(MessageKind),
    #[error("already at war with {0}")]
    AlreadyAtWar(CivId),
    #[error("{0:?} is not possible while at war")]
    AtWar(MessageKind),
    #[error("peace can only be offered during war")]
    NotAtWar,
    #[error("already allied with {0}")]
    AlreadyAllied(CivId),
    #[error("no pending proposal '{0}' for this civilization")]
    NoPendingProposal(String),
    #[error("a reply needs a response")]
    MissingResponse,
}

/// Messages a civilization should consider this turn
///
/// This turn's messages addressed to it (or to everyone), plus any proposal
/// still waiting for its answer.
pub fn inbox(state: &CivGameState, civ: &CivId) -> Vec<DiplomacyMessage> {
    state
        .diplomacy_log
        .iter()
        .filter(|m| &m.from != civ && m.to.includes(civ))
        .filter(|m| m.turn == state.turn || (m.is_pending_proposal() && m.to.civ() == Some(civ)))
        .cloned()
        .collect()
}

/// Validate a draft from `from`, append it and apply its effects
pub fn resolve_message(
    state: &mut CivGameState,
    from: &CivId,
    draft: OutgoingMessage,
) -> Result<Vec<TurnEvent>, DiplomacyRejection> {
    if !is_living(state, from) {
        return Err(DiplomacyRejection::UnknownCiv(from.clone()));
    }
    if let MessageTarget::Civ(to) = &draft.to {
        if to == from {
            return Err(DiplomacyRejection::SelfAddressed);
        }
        if !is_living(state, to) {
            return Err(DiplomacyRejection::UnknownCiv(to.clone()));
        }
    }

    match &draft.reply_to {
        Some(proposal_id) => resolve_reply(state, from, proposal_id.clone(), draft),
        None => resolve_new(state, from, draft),
    }
}

fn resolve_new(
    state: &mut CivGameState,
    from: &CivId,
    draft: OutgoingMessage,
) -> Result<Vec<TurnEvent>, DiplomacyRejection> {
    let to = match (&draft.to, draft.kind) {
        (MessageTarget::All, MessageKind::Message) => None,
        (MessageTarget::All, kind) => return Err(DiplomacyRejection::NeedsRecipient(kind)),
        (MessageTarget::Civ(id), _) => Some(id.clone()),
    };

    if let Some(to) = &to {
        let current = state.relationship(from, to);
        match draft.kind {
            MessageKind::WarDeclaration if current == Relationship::War => {
                return Err(DiplomacyRejection::AlreadyAtWar(to.clone()))
            }
            MessageKind::TradeProposal | MessageKind::AllianceProposal if current == Relationship::War => {
                return Err(DiplomacyRejection::AtWar(draft.kind))
            }
            MessageKind::AllianceProposal if current == Relationship::Allied => {
                return Err(DiplomacyRejection::AlreadyAllied(to.clone()))
            }
            MessageKind::PeaceOffer if current != Relationship::War => {
                return Err(DiplomacyRejection::NotAtWar)
            }
            _ => {}
        }
    }

    let message = append(state, from, &draft, None, None);
    let mut events = vec![message_event(state, &message)];
    if let (MessageKind::WarDeclaration, Some(to)) = (draft.kind, &to) {
        events.extend(declare_war(state, from, to));
    }
    Ok(events)
}

fn resolve_reply(
    state: &mut CivGameState,
    from: &CivId,
    proposal_id: String,
    draft: OutgoingMessage,
) -> Result<Vec<TurnEvent>, DiplomacyRejection> {
    let response = draft.response.ok_or(DiplomacyRejection::MissingResponse)?;
    let index = state
        .diplomacy_log
        .iter()
        .position(|m| {
            m.id == proposal_id && m.is_pending_proposal() && m.to.civ() == Some(from)
        })
        .ok_or_else(|| DiplomacyRejection::NoPendingProposal(proposal_id.clone()))?;
    let proposal = state.diplomacy_log[index].clone();

    // The only mutation of a logged message: recording its answer
    state.diplomacy_log[index].response = Some(response);
    let reply = OutgoingMessage {
        to: MessageTarget::Civ(proposal.from.clone()),
        kind: proposal.kind,
        ..draft
    };
    let message = append(state, from, &reply, Some(proposal_id), Some(response));
    let mut events = vec![message_event(state, &message)];

    if response == MessageResponse::Accepted {
        events.extend(accept(state, &proposal.from, from, proposal.kind));
    }
    Ok(events)
}

/// Apply an accepted proposal between `proposer` and `acceptor`
///
/// Relationships may have changed since the proposal was made; an acceptance
/// that no longer makes sense is recorded but changes nothing.
fn accept(state: &mut CivGameState, proposer: &CivId, acceptor: &CivId, kind: MessageKind) -> Vec<TurnEvent> {
    let current = state.relationship(proposer, acceptor);
    let (next, event_kind, verb) = match kind {
        MessageKind::PeaceOffer if current == Relationship::War => {
            (Relationship::Neutral, TurnEventKind::PeaceMade, "made peace with")
        }
        MessageKind::AllianceProposal if current != Relationship::War => {
            (Relationship::Allied, TurnEventKind::AllianceFormed, "formed an alliance with")
        }
        MessageKind::TradeProposal if current != Relationship::War => {
            let improved = match current {
                Relationship::Hostile => Relationship::Neutral,
                Relationship::Neutral => Relationship::Friendly,
                other => other,
            };
            (improved, TurnEventKind::RelationsImproved, "agreed to trade with")
        }
        _ => return Vec::new(),
    };

    state.set_relationship(proposer, acceptor, next);
    tracing::info!(%proposer, %acceptor, relationship = ?next, "proposal accepted");
    vec![TurnEvent::new(
        state.turn,
        event_kind,
        Some(acceptor.clone()),
        format!("{} {} {}", name(state, acceptor), verb, name(state, proposer)),
    )]
}

/// Put both sides at war, cancel their trade and turn the target's allies hostile
pub fn declare_war(state: &mut CivGameState, aggressor: &CivId, target: &CivId) -> Vec<TurnEvent> {
    state.set_relationship(aggressor, target, Relationship::War);

    for (a, b) in [(aggressor, target), (target, aggressor)] {
        if let Some(civ) = state.civilizations.get_mut(a) {
            civ.trade_routes.retain(|r| &r.partner != b);
        }
    }

    let allies: Vec<CivId> = state
        .civilizations
        .get(target)
        .map(|c| {
            c.relationships
                .iter()
                .filter(|(id, rel)| **rel == Relationship::Allied && *id != aggressor)
                .map(|(id, _)| id.clone())
                .collect()
        })
        .unwrap_or_default();
    for ally in &allies {
        if state.relationship(ally, aggressor) != Relationship::War {
            state.set_relationship(ally, aggressor, Relationship::Hostile);
        }
    }

    tracing::info!(%aggressor, %target, allies = allies.len(), "war declared");
    vec![TurnEvent::new(
        state.turn,
        TurnEventKind::WarDeclared,
        Some(aggressor.clone()),
        format!("{} declared war on {}", name(state, aggressor), name(state, target)),
    )]
}

fn append(
    state: &mut CivGameState,
    from: &CivId,
    draft: &OutgoingMessage,
    reply_to: Option<String>,
    response: Option<MessageResponse>,
) -> DiplomacyMessage {
    let message = DiplomacyMessage {
        id: state.next_id("msg"),
        turn: state.turn,
        from: from.clone(),
        to: draft.to.clone(),
        kind: draft.kind,
        content: draft.content.clone(),
        response,
        reply_to,
    };
    state.diplomacy_log.push(message.clone());
    message
}

fn message_event(state: &CivGameState, message: &DiplomacyMessage) -> TurnEvent {
    let to = match &message.to {
        MessageTarget::All => "everyone".to_string(),
        MessageTarget::Civ(id) => name(state, id),
    };
    TurnEvent::new(
        state.turn,
        TurnEventKind::DiplomacyMessage,
        Some(message.from.clone()),
        format!("{} to {}: {}", name(state, &message.from), to, message.content),
    )
}

fn is_living(state: &CivGameState, civ: &CivId) -> bool {
    state.civilizations.get(civ).map_or(false, |c| c.alive)
}

fn name(state: &CivGameState, civ: &CivId) -> String {
    state
        .civilizations
        .get(civ)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| civ.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameConfig;
    use crate::rules::Ruleset;
    use crate::state::civilization::TradeRoute;
    use crate::world::create_game;

    fn game() -> CivGameState {
        let rules = Ruleset::load_default().unwrap();
        let config = GameConfig::load_default().unwrap();
        create_game(21, 100, 20, &config, &rules).unwrap()
    }

    fn civs() -> (CivId, CivId, CivId) {
        (CivId::new("rome"), CivId::new("egypt"), CivId::new("china"))
    }

    fn to(civ: &CivId, kind: MessageKind) -> OutgoingMessage {
        OutgoingMessage::new(MessageTarget::Civ(civ.clone()), kind, "")
    }

    #[test]
    fn test_war_declaration_is_symmetric() {
        let mut state = game();
        let (rome, egypt, _) = civs();
        resolve_message(&mut state, &rome, to(&egypt, MessageKind::WarDeclaration)).unwrap();
        assert_eq!(state.relationship(&rome, &egypt), Relationship::War);
        assert_eq!(state.relationship(&egypt, &rome), Relationship::War);
        assert_eq!(state.diplomacy_log.len(), 1);
    }

    #[test]
    fn test_war_turns_allies_hostile_and_cancels_trade() {
        let mut state = game();
        let (rome, egypt, china) = civs();
        state.set_relationship(&egypt, &china, Relationship::Allied);
        let route = TradeRoute {
            id: "route-x".into(),
            from_city: state.civilizations[&rome].cities[0].clone(),
            to_city: state.civilizations[&egypt].cities[0].clone(),
            partner: egypt.clone(),
            gold_per_turn: 3,
            turns_remaining: 10,
        };
        state.civ_mut(&rome).unwrap().trade_routes.push(route);

        resolve_message(&mut state, &rome, to(&egypt, MessageKind::WarDeclaration)).unwrap();
        assert_eq!(state.relationship(&china, &rome), Relationship::Hostile);
        assert_eq!(state.relationship(&rome, &china), Relationship::Hostile);
        assert!(state.civilizations[&rome].trade_routes.is_empty());
    }

    #[test]
    fn test_peace_offer_only_during_war() {
        let mut state = game();
        let (rome, egypt, _) = civs();
        assert_eq!(
            resolve_message(&mut state, &rome, to(&egypt, MessageKind::PeaceOffer)),
            Err(DiplomacyRejection::NotAtWar)
        );
        assert!(state.diplomacy_log.is_empty());
    }

    #[test]
    fn test_accepted_peace_restores_neutral() {
        let mut state = game();
        let (rome, egypt, _) = civs();
        resolve_message(&mut state, &rome, to(&egypt, MessageKind::WarDeclaration)).unwrap();
        resolve_message(&mut state, &rome, to(&egypt, MessageKind::PeaceOffer)).unwrap();
        let offer_id = state.diplomacy_log.last().unwrap().id.clone();

        assert!(inbox(&state, &egypt).iter().any(|m| m.id == offer_id));
        let reply = OutgoingMessage::reply(
            rome.clone(),
            &offer_id,
            MessageKind::PeaceOffer,
            MessageResponse::Accepted,
            "Agreed",
        );
        resolve_message(&mut state, &egypt, reply).unwrap();
        assert_eq!(state.relationship(&rome, &egypt), Relationship::Neutral);
        let offer = state.diplomacy_log.iter().find(|m| m.id == offer_id).unwrap();
        assert_eq!(offer.response, Some(MessageResponse::Accepted));
    }

    #[test]
    fn test_only_addressee_may_answer() {
        let mut state = game();
        let (rome, egypt, china) = civs();
        resolve_message(&mut state, &rome, to(&egypt, MessageKind::AllianceProposal)).unwrap();
        let id = state.diplomacy_log[0].id.clone();
        let reply = OutgoingMessage::reply(
            rome.clone(),
            &id,
            MessageKind::AllianceProposal,
            MessageResponse::Accepted,
            "",
        );
        assert!(matches!(
            resolve_message(&mut state, &china, reply),
            Err(DiplomacyRejection::NoPendingProposal(_))
        ));
        assert_eq!(state.relationship(&rome, &egypt), Relationship::Neutral);
    }

    #[test]
    fn test_trade_acceptance_improves_relations_stepwise() {
        let mut state = game();
        let (rome, egypt, _) = civs();
        state.set_relationship(&rome, &egypt, Relationship::Hostile);
        for expected in [Relationship::Neutral, Relationship::Friendly, Relationship::Friendly] {
            resolve_message(&mut state, &rome, to(&egypt, MessageKind::TradeProposal)).unwrap();
            let id = state.diplomacy_log.last().unwrap().id.clone();
            let reply = OutgoingMessage::reply(
                rome.clone(),
                &id,
                MessageKind::TradeProposal,
                MessageResponse::Accepted,
                "",
            );
            resolve_message(&mut state, &egypt, reply).unwrap();
            assert_eq!(state.relationship(&rome, &egypt), expected);
        }
    }

    #[test]
    fn test_trade_proposal_rejected_at_war() {
        let mut state = game();
        let (rome, egypt, _) = civs();
        state.set_relationship(&rome, &egypt, Relationship::War);
        assert!(resolve_message(&mut state, &rome, to(&egypt, MessageKind::TradeProposal)).is_err());
    }

    #[test]
    fn test_broadcast_only_for_plain_messages() {
        let mut state = game();
        let (rome, _, _) = civs();
        let hello = OutgoingMessage::new(MessageTarget::All, MessageKind::Message, "Greetings");
        assert!(resolve_message(&mut state, &rome, hello).is_ok());
        let war = OutgoingMessage::new(MessageTarget::All, MessageKind::WarDeclaration, "");
        assert!(resolve_message(&mut state, &rome, war).is_err());
    }
}
