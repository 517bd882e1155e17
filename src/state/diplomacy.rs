//! Diplomacy messages and the append-only log entries

use serde::{Deserialize, Serialize};

use crate::core::types::CivId;

/// Addressee of a diplomacy message: one civilization or everyone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageTarget {
    All,
    Civ(CivId),
}

impl MessageTarget {
    pub fn includes(&self, civ: &CivId) -> bool {
        match self {
            MessageTarget::All => true,
            MessageTarget::Civ(id) => id == civ,
        }
    }

    pub fn civ(&self) -> Option<&CivId> {
        match self {
            MessageTarget::All => None,
            MessageTarget::Civ(id) => Some(id),
        }
    }
}

impl From<String> for MessageTarget {
    fn from(s: String) -> Self {
        if s == "all" {
            MessageTarget::All
        } else {
            MessageTarget::Civ(CivId(s))
        }
    }
}

impl From<MessageTarget> for String {
    fn from(t: MessageTarget) -> Self {
        match t {
            MessageTarget::All => "all".to_string(),
            MessageTarget::Civ(id) => id.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    TradeProposal,
    AllianceProposal,
    WarDeclaration,
    PeaceOffer,
}

impl MessageKind {
    /// Kinds that wait for an accepted/rejected answer
    pub fn is_proposal(&self) -> bool {
        matches!(
            self,
            MessageKind::TradeProposal | MessageKind::AllianceProposal | MessageKind::PeaceOffer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageResponse {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiplomacyMessage {
    pub id: String,
    pub turn: u32,
    pub from: CivId,
    pub to: MessageTarget,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub response: Option<MessageResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl DiplomacyMessage {
    pub fn is_pending_proposal(&self) -> bool {
        self.kind.is_proposal() && self.response.is_none()
    }
}

/// A message as proposed by a policy provider, before the core assigns
/// its id, turn and sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub to: MessageTarget,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub response: Option<MessageResponse>,
}

impl OutgoingMessage {
    pub fn new(to: MessageTarget, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            to,
            kind,
            content: content.into(),
            reply_to: None,
            response: None,
        }
    }

    /// An answer to a pending proposal
    pub fn reply(to: CivId, proposal_id: &str, kind: MessageKind, response: MessageResponse, content: impl Into<String>) -> Self {
        Self {
            to: MessageTarget::Civ(to),
            kind,
            content: content.into(),
            reply_to: Some(proposal_id.to_string()),
            response: Some(response),
        }
    }
}
