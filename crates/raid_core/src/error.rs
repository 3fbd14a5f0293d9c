//! Error types for the raid simulation.
//!
//! Every rejected player intent surfaces as a [`GameError`]; nothing in the
//! simulation panics on bad input.

use thiserror::Error;

use crate::components::{BuildingKind, GameMode, TroopKind};
use crate::math::Fixed;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Resource kinds that can run short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Gold, spent on buildings.
    Gold,
    /// Elixir, spent on troops.
    Elixir,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gold => write!(f, "gold"),
            Self::Elixir => write!(f, "elixir"),
        }
    }
}

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Footprint out of bounds or overlapping another building.
    #[error("Cannot place {kind:?} at ({x}, {z})")]
    InvalidPlacement {
        /// Building that was being placed.
        kind: BuildingKind,
        /// Cell column.
        x: i32,
        /// Cell row.
        z: i32,
    },

    /// The building type cannot be built by the player.
    #[error("{0:?} cannot be built")]
    NotBuildable(BuildingKind),

    /// Insufficient resources.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource type.
        resource: Resource,
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// Training was requested without a player barracks.
    #[error("No barracks available to train troops")]
    NoBarracks,

    /// Deploy was requested with an empty inventory for that troop.
    #[error("No trained {0:?} available")]
    NoTrainedTroops(TroopKind),

    /// Command issued in the wrong game mode.
    #[error("Command requires {expected:?} mode, session is in {actual:?}")]
    WrongMode {
        /// Mode the command needs.
        expected: GameMode,
        /// Mode the session is in.
        actual: GameMode,
    },

    /// Deploy point lies outside the battlefield.
    #[error("Cannot deploy outside the battlefield at ({x}, {z})")]
    OutOfBounds {
        /// World x coordinate.
        x: Fixed,
        /// World z coordinate.
        z: Fixed,
    },

    /// Return home was requested before the battle ended.
    #[error("Battle has not ended yet")]
    BattleNotEnded,

    /// Battle command issued after the battle ended.
    #[error("Battle is already over")]
    BattleOver,

    /// Enemy layout index outside the catalog.
    #[error("Enemy layout {index} does not exist (catalog has {available})")]
    UnknownLayout {
        /// Requested index.
        index: usize,
        /// Number of layouts in the catalog.
        available: usize,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Data file parsing error.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// Configuration parsed but is not usable.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Session snapshot could not be encoded or decoded.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(String),
}
