//! LLM-backed policy
//!
//! Each civilization's view is summarized into a prompt; the model answers
//! in JSON which is parsed leniently. A call that times out or fails is
//! retried up to `retries` times before the error goes back to the
//! orchestrator, which degrades that civilization for the turn.

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::Action;
use crate::core::config::PolicyConfig;
use crate::core::error::{CivError, Result};
use crate::core::types::CivId;
use crate::llm::context::{transcript, CivContext};
use crate::llm::parser::{parse_actions, parse_messages, parse_narration};
use crate::llm::LlmClient;
use crate::policy::PolicyProvider;
use crate::rules::Ruleset;
use crate::state::diplomacy::{DiplomacyMessage, OutgoingMessage};
use crate::state::events::TurnEvent;
use crate::state::game::CivGameState;

const DIPLOMACY_PROMPT: &str = r#"You are the leader of a civilization in a turn-based strategy game.
Decide which diplomatic messages to send this turn.

Respond with JSON only:
{"messages": [{"to": "<civ id or all>", "type": "<kind>", "content": "<text>"}]}

Kinds:
- message: free text, may be sent to "all"
- trade_proposal, alliance_proposal: to one civilization, not while at war
- peace_offer: to a civilization you are at war with
- war_declaration: to one civilization

To answer a pending proposal, send the same kind with "replyTo": "<proposal id>"
and "response": "accepted" or "rejected".

Send an empty list if you have nothing to say."#;

const PLANNING_PROMPT: &str = r#"You are the leader of a civilization in a turn-based strategy game.
Plan your actions for this turn.

Respond with JSON only:
{"actions": [ ... ]}

Action formats:
- {"type": "move_unit", "unitId": "...", "x": 0, "y": 0}
- {"type": "attack", "unitId": "...", "x": 0, "y": 0}
- {"type": "ranged_attack", "unitId": "...", "x": 0, "y": 0}
- {"type": "found_city", "unitId": "...", "name": "optional"}
- {"type": "build", "cityId": "...", "target": "<unit or building id>"}
- {"type": "build_improvement", "unitId": "...", "improvement": "farm|mine|road"}
- {"type": "set_research", "techId": "..."}
- {"type": "fortify", "unitId": "..."}
- {"type": "upgrade_unit", "unitId": "..."}
- {"type": "establish_trade_route", "unitId": "...", "targetCityId": "..."}
- {"type": "change_government", "government": "..."}
- {"type": "expend_great_person", "kind": "scientist|engineer|merchant|artist|general", "cityId": "optional"}

Invalid actions are ignored. Each unit acts at most once."#;

const NARRATION_PROMPT: &str = r#"You are the chronicler of a world history.
Summarize this turn in two to four vivid sentences of plain prose.
Mention the civilizations by name. Do not invent events."#;

pub struct LlmPolicy {
    client: LlmClient,
    rules: Arc<Ruleset>,
    config: PolicyConfig,
}

impl LlmPolicy {
    pub fn new(client: LlmClient, rules: Arc<Ruleset>, config: PolicyConfig) -> Self {
        Self { client, rules, config }
    }

    /// One completion with a per-attempt timeout and retries
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let mut last_error = CivError::LlmError("no attempt made".into());
        for attempt in 0..=self.config.retries {
            match tokio::time::timeout(self.config.timeout(), self.client.complete(system, user)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "LLM call failed");
                    last_error = e;
                }
                Err(_) => {
                    tracing::warn!(attempt, timeout_ms = self.config.timeout_ms, "LLM call timed out");
                    last_error = CivError::LlmError(format!("timed out after {}ms", self.config.timeout_ms));
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl PolicyProvider for LlmPolicy {
    async fn diplomacy_messages(
        &self,
        civ: &CivId,
        state: &CivGameState,
        inbox: &[DiplomacyMessage],
    ) -> Result<Vec<OutgoingMessage>> {
        let context = CivContext::build(state, &self.rules, civ)?;
        let user = format!("{}\nInbox:\n{}", context.summary(), transcript(inbox));
        let response = self.complete(DIPLOMACY_PROMPT, &user).await?;
        parse_messages(&response)
    }

    async fn planned_actions(
        &self,
        civ: &CivId,
        state: &CivGameState,
        messages: &[DiplomacyMessage],
    ) -> Result<Vec<Action>> {
        let context = CivContext::build(state, &self.rules, civ)?;
        let user = format!(
            "{}\nDiplomacy this turn:\n{}",
            context.summary(),
            transcript(messages)
        );
        let response = self.complete(PLANNING_PROMPT, &user).await?;
        parse_actions(&response)
    }

    async fn narration(&self, events: &[TurnEvent], state: &CivGameState) -> Result<String> {
        let mut user = format!("Turn {}.\n", state.turn);
        for civ in state.living_civs() {
            if let Some(c) = state.civilizations.get(&civ) {
                user.push_str(&format!("- {} ({}): {} cities, score {}\n", c.name, c.id, c.cities.len(), c.score));
            }
        }
        user.push_str("\nEvents:\n");
        for event in events {
            user.push_str(&format!("- {}\n", event.description));
        }
        let response = self.complete(NARRATION_PROMPT, &user).await?;
        parse_narration(&response)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
