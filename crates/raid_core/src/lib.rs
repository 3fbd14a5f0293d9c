//! # Raid Core
//!
//! Deterministic simulation core for a small base-building and raiding
//! game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness or wall-clock time
//! - No floating-point math (uses fixed-point)
//!
//! A host (renderer, input layer, test harness) owns a
//! [`GameSession`](simulation::GameSession), forwards player intents to it
//! and advances it with a simulated delta each frame, reacting to the
//! returned [`TickEvents`](simulation::TickEvents).
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Session state, commands and the tick loop
//! - [`grid`] - Placement grid and footprint checks
//! - [`economy`] - Resources, income and trained-troop inventory
//! - [`production`] - Barracks training pipelines
//! - [`buildings`] - Building entities and tower targeting
//! - [`troops`] - Troop AI: targeting, coordination, attacks
//! - [`projectile`] - Projectile flight and hit detection
//! - [`battle`] - Raid termination and scoring
//! - [`data`] - RON-loadable configuration
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod battle;
pub mod buildings;
pub mod components;
pub mod data;
pub mod economy;
pub mod error;
pub mod grid;
pub mod math;
pub mod production;
pub mod projectile;
pub mod rng;
pub mod simulation;
pub mod troops;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{BattleEndReason, BattleResults};
    pub use crate::buildings::Building;
    pub use crate::components::*;
    pub use crate::data::GameConfig;
    pub use crate::economy::{IncomeEvent, ResourceSnapshot};
    pub use crate::error::{GameError, Resource, Result};
    pub use crate::grid::PlacementPreview;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::production::TrainingProgress;
    pub use crate::simulation::{GameSession, ReturnSummary, TickEvents};
    pub use crate::troops::Troop;
}
