//! Shared component and identifier types.
//!
//! These are plain data types used by every entity category. Behavior
//! lives in [`crate::buildings`], [`crate::troops`] and
//! [`crate::projectile`].

use serde::{Deserialize, Serialize};

/// Unique identifier for entities.
///
/// Ids are handed out in increasing order by the owning registry, so
/// sorting by id reproduces spawn order.
pub type EntityId = u64;

/// Top-level mode of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameMode {
    /// Building and training at the player's base.
    #[default]
    Home,
    /// Raiding an enemy base.
    Attack,
}

/// Building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Base centerpiece; destroying the enemy one ends the raid.
    TownHall,
    /// Produces gold on the income tick.
    Mine,
    /// Trains troops and produces elixir on the income tick.
    Barracks,
    /// Defensive tower firing arrows at troops.
    ArcherTower,
}

impl BuildingKind {
    /// All building kinds in declaration order.
    pub const ALL: [Self; 4] = [Self::TownHall, Self::Mine, Self::Barracks, Self::ArcherTower];
}

/// Troop types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TroopKind {
    /// Tough melee frontliner.
    Bear,
    /// Fast medium-range unit that keeps behind bears.
    Rabbit,
    /// Long-range archer that supports injured bears.
    Penguin,
}

impl TroopKind {
    /// Fixed iteration order used by barracks training and inventories.
    pub const ALL: [Self; 3] = [Self::Bear, Self::Rabbit, Self::Penguin];

    /// Index into per-type arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Bear => 0,
            Self::Rabbit => 1,
            Self::Penguin => 2,
        }
    }

    /// Projectile visual thrown by this troop.
    #[must_use]
    pub const fn projectile_kind(self) -> ProjectileKind {
        match self {
            Self::Bear | Self::Rabbit => ProjectileKind::Stone,
            Self::Penguin => ProjectileKind::Arrow,
        }
    }
}

/// Cosmetic projectile type; travel and hit behavior are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Thrown by bears and rabbits.
    Stone,
    /// Shot by penguins and archer towers.
    Arrow,
}

/// Reference to a damageable entity, resolved through its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRef {
    /// A building id.
    Building(EntityId),
    /// A troop id.
    Troop(EntityId),
}

/// One building record of a base layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutEntry {
    /// Building type.
    pub kind: BuildingKind,
    /// Cell column of the footprint origin.
    pub x: i32,
    /// Cell row of the footprint origin.
    pub z: i32,
}

impl LayoutEntry {
    /// Create a layout entry.
    #[must_use]
    pub const fn new(kind: BuildingKind, x: i32, z: i32) -> Self {
        Self { kind, x, z }
    }
}

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if entity is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Check if entity is still standing.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Apply damage, returning actual damage dealt.
    /// Uses saturating subtraction so health never underflows.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current = self.current.saturating_sub(actual);
        actual
    }

    /// Alive and strictly below `percent` of max health.
    #[must_use]
    pub fn is_below_percent(&self, percent: u32) -> bool {
        self.is_alive() && u64::from(self.current) * 100 < u64::from(self.max) * u64::from(percent)
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            (self.current * 100) / self.max
        }
    }
}
