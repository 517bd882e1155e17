//! Canned responses for tests
//!
//! Each civilization gets its own queue of replies per call type. An empty
//! queue answers with nothing (no messages, no actions) and narration falls
//! back to an error so the caller's default is exercised.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::actions::Action;
use crate::core::error::{CivError, Result};
use crate::core::types::CivId;
use crate::policy::PolicyProvider;
use crate::state::diplomacy::{DiplomacyMessage, OutgoingMessage};
use crate::state::events::TurnEvent;
use crate::state::game::CivGameState;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Reply(T),
    /// Fail the call with a policy error
    Fail(String),
    /// Never answer
    Hang,
}

#[derive(Default)]
struct Queues {
    messages: BTreeMap<CivId, VecDeque<Scripted<Vec<OutgoingMessage>>>>,
    actions: BTreeMap<CivId, VecDeque<Scripted<Vec<Action>>>>,
    narration: VecDeque<Scripted<String>>,
}

#[derive(Default)]
pub struct ScriptedPolicy {
    queues: Mutex<Queues>,
    calls: AtomicUsize,
}

impl ScriptedPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_messages(&self, civ: &CivId, reply: Scripted<Vec<OutgoingMessage>>) -> &Self {
        self.with_queues(|q| q.messages.entry(civ.clone()).or_default().push_back(reply));
        self
    }

    pub fn push_actions(&self, civ: &CivId, reply: Scripted<Vec<Action>>) -> &Self {
        self.with_queues(|q| q.actions.entry(civ.clone()).or_default().push_back(reply));
        self
    }

    pub fn push_narration(&self, reply: Scripted<String>) -> &Self {
        self.with_queues(|q| q.narration.push_back(reply));
        self
    }

    /// Number of provider calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn with_queues<R>(&self, f: impl FnOnce(&mut Queues) -> R) -> R {
        let mut guard = match self.queues.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

async fn answer<T>(reply: Option<Scripted<T>>, empty: impl FnOnce() -> Result<T>) -> Result<T> {
    match reply {
        Some(Scripted::Reply(value)) => Ok(value),
        Some(Scripted::Fail(reason)) => Err(CivError::Policy(reason)),
        Some(Scripted::Hang) => std::future::pending().await,
        None => empty(),
    }
}

#[async_trait]
impl PolicyProvider for ScriptedPolicy {
    async fn diplomacy_messages(
        &self,
        civ: &CivId,
        _state: &CivGameState,
        _inbox: &[DiplomacyMessage],
    ) -> Result<Vec<OutgoingMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.with_queues(|q| q.messages.get_mut(civ).and_then(VecDeque::pop_front));
        answer(reply, || Ok(Vec::new())).await
    }

    async fn planned_actions(
        &self,
        civ: &CivId,
        _state: &CivGameState,
        _transcript: &[DiplomacyMessage],
    ) -> Result<Vec<Action>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.with_queues(|q| q.actions.get_mut(civ).and_then(VecDeque::pop_front));
        answer(reply, || Ok(Vec::new())).await
    }

    async fn narration(&self, _events: &[TurnEvent], _state: &CivGameState) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.with_queues(|q| q.narration.pop_front());
        answer(reply, || Err(CivError::Policy("no narration scripted".into()))).await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UnitId;

    fn empty_state() -> CivGameState {
        CivGameState::new("g".into(), 1, 10, Vec::new())
    }

    #[tokio::test]
    async fn test_replies_in_order_then_empty() {
        let policy = ScriptedPolicy::new();
        let rome = CivId::new("rome");
        let fortify = Action::Fortify {
            unit_id: UnitId::from("unit-1"),
        };
        policy
            .push_actions(&rome, Scripted::Reply(vec![fortify.clone()]))
            .push_actions(&rome, Scripted::Fail("down".into()));

        let state = empty_state();
        assert_eq!(policy.planned_actions(&rome, &state, &[]).await.unwrap(), vec![fortify]);
        assert!(policy.planned_actions(&rome, &state, &[]).await.is_err());
        assert!(policy.planned_actions(&rome, &state, &[]).await.unwrap().is_empty());
        assert_eq!(policy.calls(), 3);
    }

    #[tokio::test]
    async fn test_queues_are_per_civ() {
        let policy = ScriptedPolicy::new();
        policy.push_actions(&CivId::new("rome"), Scripted::Fail("x".into()));
        let state = empty_state();
        assert!(policy
            .planned_actions(&CivId::new("egypt"), &state, &[])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_hang_never_answers() {
        let policy = ScriptedPolicy::new();
        policy.push_narration(Scripted::Hang);
        let state = empty_state();
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            policy.narration(&[], &state),
        )
        .await;
        assert!(result.is_err());
    }
}
