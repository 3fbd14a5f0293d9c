//! Data-driven game configuration.
//!
//! Pure data structures describing buildings, troops, base layouts and AI
//! tuning. Everything deserializes from RON; [`GameConfig::default`]
//! reproduces the stock game balance.
//!
//! **Note:** This module contains no IO - callers hand it the RON text.

mod building_data;
mod troop_data;

pub use building_data::{BuildingCatalog, BuildingData, TowerStats};
pub use troop_data::{TroopCatalog, TroopData};

use serde::{Deserialize, Serialize};

use crate::components::{BuildingKind, LayoutEntry};
use crate::error::{GameError, Result};
use crate::grid::GridIndex;
use crate::math::{milli_serde, ratio, Fixed};

/// Troop AI tuning constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Radius within which a rabbit looks for bears to hide behind.
    #[serde(with = "milli_serde")]
    pub rabbit_cover_radius: Fixed,
    /// How far behind the frontline bear a rabbit stays.
    #[serde(with = "milli_serde")]
    pub rabbit_safety_margin: Fixed,
    /// Fraction of normal speed used while a rabbit backs off.
    #[serde(with = "milli_serde")]
    pub rabbit_retreat_factor: Fixed,
    /// Bears strictly below this health percentage count as injured.
    pub injured_bear_percent: u32,
    /// Troops with range above this hold back instead of closing in.
    #[serde(with = "milli_serde")]
    pub long_range_cutoff: Fixed,
    /// Fraction of range long-range troops hold at.
    #[serde(with = "milli_serde")]
    pub hold_back_factor: Fixed,
    /// Minimum milliseconds between troop attacks.
    pub troop_attack_interval_ms: u64,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            rabbit_cover_radius: Fixed::from_num(8),
            rabbit_safety_margin: Fixed::from_num(2),
            rabbit_retreat_factor: ratio(3, 10),
            injured_bear_percent: 50,
            long_range_cutoff: Fixed::from_num(5),
            hold_back_factor: ratio(7, 10),
            troop_attack_interval_ms: 1000,
        }
    }
}

/// Projectile flight constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    /// Travel speed in world units per second.
    #[serde(with = "milli_serde")]
    pub speed: Fixed,
    /// Distance below which a projectile counts as a hit.
    #[serde(with = "milli_serde")]
    pub hit_radius: Fixed,
    /// Height above the ground projectiles launch from.
    #[serde(with = "milli_serde")]
    pub launch_height: Fixed,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: Fixed::from_num(15),
            hit_radius: ratio(1, 2),
            launch_height: Fixed::from_num(1),
        }
    }
}

/// Complete game configuration.
///
/// # Example RON
///
/// ```ron
/// GameConfig(
///     battle_time_ms: 90000,
///     starting_gold: 1000,
///     seed: 7,
/// )
/// ```
///
/// Omitted fields keep their default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Grid edge length in cells.
    pub grid_size: u32,
    /// Cell edge length in world units.
    #[serde(with = "milli_serde")]
    pub cell_size: Fixed,
    /// Raid duration in milliseconds.
    pub battle_time_ms: u64,
    /// Gold at session start.
    pub starting_gold: u32,
    /// Elixir at session start.
    pub starting_elixir: u32,
    /// Milliseconds between income ticks.
    pub income_interval_ms: u64,
    /// Gold step that triggers a milestone notification.
    pub milestone_step: u32,
    /// Stop the income timer while a raid is in progress.
    pub pause_income_during_battle: bool,
    /// Seed for enemy layout selection.
    pub seed: u64,
    /// Building definitions.
    pub buildings: BuildingCatalog,
    /// Troop definitions.
    pub troops: TroopCatalog,
    /// Troop AI tuning.
    pub ai: AiTuning,
    /// Projectile flight tuning.
    pub projectiles: ProjectileTuning,
    /// Player base at session start.
    pub home_base: Vec<LayoutEntry>,
    /// Hand-authored enemy bases, one picked per raid.
    pub enemy_bases: Vec<Vec<LayoutEntry>>,
}

impl Default for GameConfig {
    fn default() -> Self {
        use BuildingKind::{ArcherTower, Barracks, Mine, TownHall};
        let entry = LayoutEntry::new;

        Self {
            grid_size: 20,
            cell_size: Fixed::from_num(2),
            battle_time_ms: 120_000,
            starting_gold: 500,
            starting_elixir: 200,
            income_interval_ms: 2000,
            milestone_step: 100,
            pause_income_during_battle: true,
            seed: 0x5EED_CAFE,
            buildings: BuildingCatalog::default(),
            troops: TroopCatalog::default(),
            ai: AiTuning::default(),
            projectiles: ProjectileTuning::default(),
            home_base: vec![entry(TownHall, 9, 9)],
            enemy_bases: vec![
                // Square fortress
                vec![
                    entry(TownHall, 9, 9),
                    entry(ArcherTower, 6, 6),
                    entry(ArcherTower, 13, 6),
                    entry(ArcherTower, 6, 13),
                    entry(ArcherTower, 13, 13),
                    entry(Mine, 5, 10),
                    entry(Mine, 14, 10),
                    entry(Barracks, 10, 5),
                    entry(Barracks, 10, 14),
                ],
                // Diagonal defense
                vec![
                    entry(TownHall, 10, 10),
                    entry(ArcherTower, 7, 7),
                    entry(ArcherTower, 13, 13),
                    entry(Mine, 5, 5),
                    entry(Mine, 15, 15),
                    entry(Barracks, 7, 13),
                    entry(Barracks, 13, 7),
                    entry(Mine, 10, 5),
                ],
                // Ring formation
                vec![
                    entry(TownHall, 10, 10),
                    entry(ArcherTower, 10, 6),
                    entry(ArcherTower, 10, 14),
                    entry(ArcherTower, 6, 10),
                    entry(ArcherTower, 14, 10),
                    entry(Mine, 8, 8),
                    entry(Mine, 12, 12),
                    entry(Barracks, 8, 12),
                    entry(Barracks, 12, 8),
                ],
            ],
        }
    }
}

impl GameConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::ConfigParse(e.to_string()))
    }

    /// Render the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::ConfigParse(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// Checks that:
    /// - the grid and every footprint have a positive size
    /// - there is at least one enemy base
    /// - every layout fits on the grid without overlaps
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.grid_size == 0 {
            errors.push("grid_size must be positive".to_owned());
        }
        if self.cell_size <= Fixed::ZERO {
            errors.push("cell_size must be positive".to_owned());
        }
        if self.income_interval_ms == 0 {
            errors.push("income_interval_ms must be positive".to_owned());
        }

        for kind in BuildingKind::ALL {
            let data = self.buildings.get(kind);
            if data.size == 0 || data.size > self.grid_size {
                errors.push(format!("{kind:?} footprint {} does not fit the grid", data.size));
            }
        }

        if self.enemy_bases.is_empty() {
            errors.push("enemy_bases must contain at least one layout".to_owned());
        }

        self.check_layout("home_base", &self.home_base, &mut errors);
        for (i, layout) in self.enemy_bases.iter().enumerate() {
            if layout.is_empty() {
                errors.push(format!("enemy_bases[{i}] is empty"));
            }
            self.check_layout(&format!("enemy_bases[{i}]"), layout, &mut errors);
        }

        errors
    }

    /// Validate and return the configuration, or the first problems found.
    pub fn validated(self) -> Result<Self> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(GameError::InvalidConfig(errors.join("; ")))
        }
    }

    fn check_layout(&self, name: &str, layout: &[LayoutEntry], errors: &mut Vec<String>) {
        let mut grid = GridIndex::new(self.grid_size, self.cell_size);
        for (id, entry) in (1..).zip(layout) {
            let size = self.buildings.get(entry.kind).size;
            if grid.place(id, entry.x, entry.z, size).is_none() {
                errors.push(format!(
                    "{name}: {:?} at ({}, {}) is out of bounds or overlaps",
                    entry.kind, entry.x, entry.z
                ));
            }
        }
    }
}
