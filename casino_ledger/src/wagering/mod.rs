//! Wagering engine: bonus lock and unlock requirement.

pub mod engine;
pub mod models;

pub use engine::{WageringEngine, requirement_for};
pub use models::{WagerProgress, WageringInfo};
