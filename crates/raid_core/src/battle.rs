//! Raid lifecycle: termination rules and scoring.
//!
//! A raid ends exactly once. Several end conditions can hold on the same
//! tick; they are checked in a fixed priority and the `ended` latch keeps
//! any later check from scoring the raid a second time.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::economy::ResourceSnapshot;

/// Gold looted per destroyed building.
pub const GOLD_PER_BUILDING: i64 = 30;

/// Elixir looted per destroyed building.
pub const ELIXIR_PER_BUILDING: i64 = 20;

/// Why a raid ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleEndReason {
    /// The enemy town hall was destroyed.
    TownHall,
    /// The raid timer ran out.
    Timeout,
    /// Every deployed troop died.
    Defeat,
    /// Every enemy building was destroyed.
    Complete,
    /// The player ended the raid.
    Manual,
}

impl fmt::Display for BattleEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TownHall => "townhall",
            Self::Timeout => "timeout",
            Self::Defeat => "defeat",
            Self::Complete => "complete",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Final score of a raid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResults {
    /// Why the raid ended.
    pub reason: BattleEndReason,
    /// Enemy buildings at raid start.
    pub initial_buildings: u32,
    /// Enemy buildings destroyed.
    pub destroyed: u32,
    /// `floor(100 * destroyed / initial)`, zero for an empty base.
    pub destruction_percent: u32,
    /// 0 to 3 stars.
    pub stars: u8,
    /// Gold won; never negative.
    pub gold_loot: i64,
    /// Elixir won, or the negative troop cost on defeat.
    pub elixir_loot: i64,
    /// Non-defeat with at least one star.
    pub is_victory: bool,
}

/// Stars for a destruction percentage.
#[must_use]
pub const fn stars_for(percent: u32) -> u8 {
    match percent {
        100.. => 3,
        75..=99 => 2,
        50..=74 => 1,
        _ => 0,
    }
}

/// Score a raid.
#[must_use]
pub fn score(reason: BattleEndReason, initial: u32, remaining: u32, deployed_cost: u32) -> BattleResults {
    let destroyed = initial.saturating_sub(remaining);
    let destruction_percent = if initial == 0 {
        0
    } else {
        u32::try_from(u64::from(destroyed) * 100 / u64::from(initial)).unwrap_or(100)
    };
    let stars = stars_for(destruction_percent);

    let (gold_loot, elixir_loot) = if reason == BattleEndReason::Defeat {
        (0, -i64::from(deployed_cost))
    } else {
        (
            i64::from(destroyed) * GOLD_PER_BUILDING,
            i64::from(destroyed) * ELIXIR_PER_BUILDING,
        )
    };

    BattleResults {
        reason,
        initial_buildings: initial,
        destroyed,
        destruction_percent,
        stars,
        gold_loot,
        elixir_loot,
        is_victory: reason != BattleEndReason::Defeat && stars >= 1,
    }
}

/// World facts the termination check looks at after cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleSignals {
    /// An enemy town hall was destroyed this tick.
    pub town_hall_destroyed: bool,
    /// Troops still alive.
    pub troops_alive: usize,
    /// Enemy buildings still standing.
    pub enemy_remaining: u32,
}

/// State of one raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleState {
    layout_index: usize,
    time_remaining_ms: u64,
    baseline: ResourceSnapshot,
    deployed_cost: u32,
    initial_enemy_buildings: u32,
    ended: bool,
    results: Option<BattleResults>,
}

impl BattleState {
    /// Start a raid against `layout_index` with `initial` enemy buildings.
    #[must_use]
    pub const fn new(layout_index: usize, time_ms: u64, baseline: ResourceSnapshot, initial: u32) -> Self {
        Self {
            layout_index,
            time_remaining_ms: time_ms,
            baseline,
            deployed_cost: 0,
            initial_enemy_buildings: initial,
            ended: false,
            results: None,
        }
    }

    /// Enemy layout being raided.
    #[must_use]
    pub const fn layout_index(&self) -> usize {
        self.layout_index
    }

    /// Milliseconds left on the raid timer.
    #[must_use]
    pub const fn time_remaining_ms(&self) -> u64 {
        self.time_remaining_ms
    }

    /// Resources at raid start.
    #[must_use]
    pub const fn baseline(&self) -> ResourceSnapshot {
        self.baseline
    }

    /// Total elixir cost of troops deployed so far.
    #[must_use]
    pub const fn deployed_cost(&self) -> u32 {
        self.deployed_cost
    }

    /// Enemy buildings at raid start.
    #[must_use]
    pub const fn initial_enemy_buildings(&self) -> u32 {
        self.initial_enemy_buildings
    }

    /// Whether the raid has ended.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended
    }

    /// Results, once ended.
    #[must_use]
    pub const fn results(&self) -> Option<&BattleResults> {
        self.results.as_ref()
    }

    /// Count down the raid timer.
    pub fn tick_timer(&mut self, delta_ms: u64) {
        self.time_remaining_ms = self.time_remaining_ms.saturating_sub(delta_ms);
    }

    /// Add a deployed troop's cost.
    pub fn record_deployment(&mut self, cost: u32) {
        self.deployed_cost = self.deployed_cost.saturating_add(cost);
    }

    /// First end condition that holds, in priority order.
    #[must_use]
    pub const fn evaluate(&self, signals: BattleSignals) -> Option<BattleEndReason> {
        if self.ended {
            return None;
        }
        if signals.town_hall_destroyed {
            Some(BattleEndReason::TownHall)
        } else if self.time_remaining_ms == 0 {
            Some(BattleEndReason::Timeout)
        } else if signals.troops_alive == 0 && self.deployed_cost > 0 {
            Some(BattleEndReason::Defeat)
        } else if signals.enemy_remaining == 0 && self.initial_enemy_buildings > 0 {
            Some(BattleEndReason::Complete)
        } else {
            None
        }
    }

    /// End the raid and score it.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub fn end(&mut self, reason: BattleEndReason, enemy_remaining: u32) -> Option<BattleResults> {
        if self.ended {
            return None;
        }
        self.ended = true;

        let results = score(reason, self.initial_enemy_buildings, enemy_remaining, self.deployed_cost);
        info!(
            %reason,
            destroyed = results.destroyed,
            percent = results.destruction_percent,
            stars = results.stars,
            gold_loot = results.gold_loot,
            elixir_loot = results.elixir_loot,
            "Battle ended"
        );
        self.results = Some(results);
        Some(results)
    }
}
