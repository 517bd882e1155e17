//! Action validation and execution

pub mod action;
pub mod combat;
pub mod execute;
pub mod movement;
pub mod validate;

pub use action::Action;
pub use execute::execute;
pub use validate::{is_valid, validate, Rejection};
