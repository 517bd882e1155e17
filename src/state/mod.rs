//! Canonical game state types
//!
//! Everything the engine simulates lives in [`CivGameState`]. The whole tree
//! is plain data: it serializes to JSON without cycles and round-trips exactly.

pub mod city;
pub mod civilization;
pub mod diplomacy;
pub mod events;
pub mod game;
pub mod invariants;
pub mod tile;
pub mod unit;

pub use city::{City, ProductionKind, ProductionOrder};
pub use civilization::{
    Civilization, CombatBuff, GoldenAgeState, GreatPeopleState, ResearchState, SpaceshipState,
    TradeRoute,
};
pub use diplomacy::{DiplomacyMessage, MessageKind, MessageResponse, MessageTarget, OutgoingMessage};
pub use events::{CombatRecord, GameNotification, Severity, TurnEvent, TurnEventKind};
pub use game::{CivGameState, TurnPhase};
pub use invariants::{check_invariants, enforce_invariants, InvariantViolation};
pub use tile::{Tile, TileImprovement};
pub use unit::{AnimationHint, Unit};
