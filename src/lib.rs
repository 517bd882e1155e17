//! Civ Council - turn-based multi-civilization strategy engine
//!
//! Civilizations led by pluggable policies (an LLM or a local heuristic)
//! negotiate, plan and fight on a generated tile map. The engine owns the
//! rules: every decision is validated against the state before it applies,
//! and all randomness derives from the game seed.

pub mod actions;
pub mod core;
pub mod diplomacy;
pub mod fog;
pub mod llm;
pub mod policy;
pub mod rules;
pub mod state;
pub mod store;
pub mod turn;
pub mod world;
