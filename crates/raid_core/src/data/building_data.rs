//! Building data structures for data-driven building definitions.

use serde::{Deserialize, Serialize};

use crate::components::BuildingKind;
use crate::math::{milli_serde, Fixed};

/// Attack stats for defensive buildings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerStats {
    /// Damage carried by each arrow.
    pub damage: u32,

    /// Targeting range in world units (thousandths in data files).
    #[serde(with = "milli_serde")]
    pub range: Fixed,

    /// Minimum milliseconds between shots.
    pub attack_interval_ms: u64,
}

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     label: "Archer Tower",
///     cost: 150,
///     size: 1,
///     health: 500,
///     tower: Some(TowerStats(damage: 3, range: 8000, attack_interval_ms: 1000)),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Display name.
    pub label: String,

    /// Gold cost to place this building.
    pub cost: u32,

    /// Footprint edge length in cells.
    pub size: u32,

    /// Maximum health points.
    pub health: u32,

    /// Gold added per income tick.
    #[serde(default)]
    pub gold_rate: u32,

    /// Elixir added per income tick.
    #[serde(default)]
    pub elixir_rate: u32,

    /// Attack behavior, for towers.
    #[serde(default)]
    pub tower: Option<TowerStats>,

    /// Whether this building runs troop training queues.
    #[serde(default)]
    pub trains_troops: bool,
}

impl BuildingData {
    fn basic(label: &str, cost: u32, size: u32, health: u32) -> Self {
        Self {
            label: label.to_owned(),
            cost,
            size,
            health,
            gold_rate: 0,
            elixir_rate: 0,
            tower: None,
            trains_troops: false,
        }
    }
}

/// One [`BuildingData`] per [`BuildingKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingCatalog {
    /// Town hall definition.
    pub town_hall: BuildingData,
    /// Gold mine definition.
    pub mine: BuildingData,
    /// Barracks definition.
    pub barracks: BuildingData,
    /// Archer tower definition.
    pub archer_tower: BuildingData,
}

impl BuildingCatalog {
    /// Look up the definition for a building kind.
    #[must_use]
    pub const fn get(&self, kind: BuildingKind) -> &BuildingData {
        match kind {
            BuildingKind::TownHall => &self.town_hall,
            BuildingKind::Mine => &self.mine,
            BuildingKind::Barracks => &self.barracks,
            BuildingKind::ArcherTower => &self.archer_tower,
        }
    }
}

impl Default for BuildingCatalog {
    fn default() -> Self {
        Self {
            town_hall: BuildingData::basic("Town Hall", 0, 2, 1000),
            mine: BuildingData {
                gold_rate: 10,
                ..BuildingData::basic("Gold Mine", 100, 1, 300)
            },
            barracks: BuildingData {
                elixir_rate: 6,
                trains_troops: true,
                ..BuildingData::basic("Barracks", 200, 1, 400)
            },
            archer_tower: BuildingData {
                tower: Some(TowerStats {
                    damage: 3,
                    range: Fixed::from_num(8),
                    attack_interval_ms: 1000,
                }),
                ..BuildingData::basic("Archer Tower", 150, 1, 500)
            },
        }
    }
}
