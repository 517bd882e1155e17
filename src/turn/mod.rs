//! Turn pipeline
//!
//! A turn runs `diplomacy → planning → resolution → narration`. The async
//! [`TurnOrchestrator`] drives it against a [`PolicyProvider`]; the
//! synchronous [`advance_turn_local`] runs the same pipeline with the
//! built-in heuristic planner and no I/O.
//!
//! [`PolicyProvider`]: crate::policy::PolicyProvider

pub mod barbarians;
pub mod economy;
pub mod end_of_turn;
pub mod local;
pub mod narration;
pub mod orchestrator;
pub mod phase;
pub mod victory;

pub use end_of_turn::run_end_of_turn;
pub use local::advance_turn_local;
pub use narration::default_narration;
pub use orchestrator::TurnOrchestrator;
pub use phase::{PhaseEvent, PhaseUpdate};

/// Stream tag for heuristic planning seeds
pub const PLAN_STREAM: u64 = 0x504C_414E;

/// Mix a game seed with turn, stream and index into an independent seed
///
/// splitmix64 finalizer over the combined inputs. Stable across platforms
/// and releases, so replays of a saved game draw the same numbers.
pub fn derive_seed(seed: u64, turn: u32, stream: u64, index: u64) -> u64 {
    let mut z = seed
        ^ (turn as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ stream.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ index.wrapping_mul(0x1656_67B1_9E37_79F9);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
