//! Troop data structures for data-driven troop definitions.

use serde::{Deserialize, Serialize};

use crate::components::TroopKind;
use crate::math::{milli_serde, ratio, Fixed};

/// Data-driven troop definition.
///
/// Speed is in world units per simulation tick, range in world units;
/// both are written as thousandths in RON files.
///
/// # Example RON
///
/// ```ron
/// TroopData(
///     label: "Bear",
///     cost: 30,
///     health: 100,
///     damage: 20,
///     speed: 50,
///     range: 1500,
///     train_time_ms: 3000,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopData {
    /// Display name.
    pub label: String,

    /// Elixir cost to train.
    pub cost: u32,

    /// Maximum health points.
    pub health: u32,

    /// Damage carried by each projectile.
    pub damage: u32,

    /// Movement per tick.
    #[serde(with = "milli_serde")]
    pub speed: Fixed,

    /// Attack range.
    #[serde(with = "milli_serde")]
    pub range: Fixed,

    /// Training time in milliseconds.
    pub train_time_ms: u32,
}

/// One [`TroopData`] per [`TroopKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopCatalog {
    /// Bear definition.
    pub bear: TroopData,
    /// Rabbit definition.
    pub rabbit: TroopData,
    /// Penguin archer definition.
    pub penguin: TroopData,
}

impl TroopCatalog {
    /// Look up the definition for a troop kind.
    #[must_use]
    pub const fn get(&self, kind: TroopKind) -> &TroopData {
        match kind {
            TroopKind::Bear => &self.bear,
            TroopKind::Rabbit => &self.rabbit,
            TroopKind::Penguin => &self.penguin,
        }
    }
}

impl Default for TroopCatalog {
    fn default() -> Self {
        Self {
            bear: TroopData {
                label: "Bear".to_owned(),
                cost: 30,
                health: 100,
                damage: 20,
                speed: ratio(5, 100),
                range: ratio(15, 10),
                train_time_ms: 3000,
            },
            rabbit: TroopData {
                label: "Rabbit".to_owned(),
                cost: 15,
                health: 40,
                damage: 10,
                speed: ratio(12, 100),
                range: Fixed::from_num(5),
                train_time_ms: 5000,
            },
            penguin: TroopData {
                label: "Penguin Archer".to_owned(),
                cost: 50,
                health: 60,
                damage: 25,
                speed: ratio(8, 100),
                range: Fixed::from_num(10),
                train_time_ms: 7000,
            },
        }
    }
}
