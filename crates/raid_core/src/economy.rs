//! Resources, trained-troop inventory and the income timer.
//!
//! Gold and elixir are non-negative counters. Income arrives on a fixed
//! interval from the player's mines and barracks; crossing a multiple of
//! the milestone step raises a one-off notification.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildings::Building;
use crate::components::TroopKind;
use crate::error::{GameError, Resource, Result};

/// Gold and elixir at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Gold amount.
    pub gold: u32,
    /// Elixir amount.
    pub elixir: u32,
}

/// Resources added by one income tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeEvent {
    /// Gold added.
    pub gold: u32,
    /// Elixir added.
    pub elixir: u32,
}

/// Sum the per-tick income of every standing building given.
pub fn base_income<'a, I>(buildings: I) -> IncomeEvent
where
    I: IntoIterator<Item = &'a Building>,
{
    buildings
        .into_iter()
        .filter(|b| !b.is_destroyed())
        .fold(IncomeEvent { gold: 0, elixir: 0 }, |acc, b| IncomeEvent {
            gold: acc.gold.saturating_add(b.gold_rate),
            elixir: acc.elixir.saturating_add(b.elixir_rate),
        })
}

/// Player economy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Economy {
    gold: u32,
    elixir: u32,
    trained: [u32; 3],
    milestone_step: u32,
    last_milestone: u32,
}

impl Economy {
    /// Create an economy with starting resources and no troops.
    #[must_use]
    pub fn new(gold: u32, elixir: u32, milestone_step: u32) -> Self {
        let step = milestone_step.max(1);
        Self {
            gold,
            elixir,
            trained: [0; 3],
            milestone_step: step,
            last_milestone: gold / step * step,
        }
    }

    /// Current gold.
    #[must_use]
    pub const fn gold(&self) -> u32 {
        self.gold
    }

    /// Current elixir.
    #[must_use]
    pub const fn elixir(&self) -> u32 {
        self.elixir
    }

    /// Current gold and elixir.
    #[must_use]
    pub const fn snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            gold: self.gold,
            elixir: self.elixir,
        }
    }

    /// Highest milestone reached so far.
    #[must_use]
    pub const fn last_milestone(&self) -> u32 {
        self.last_milestone
    }

    /// Trained troops of a kind waiting to be deployed.
    #[must_use]
    pub const fn trained(&self, kind: TroopKind) -> u32 {
        self.trained[kind.index()]
    }

    /// Whether `amount` of `resource` is available.
    #[must_use]
    pub const fn can_afford(&self, resource: Resource, amount: u32) -> bool {
        match resource {
            Resource::Gold => self.gold >= amount,
            Resource::Elixir => self.elixir >= amount,
        }
    }

    /// Spend resources, or fail without changing anything.
    pub fn spend(&mut self, resource: Resource, amount: u32) -> Result<()> {
        let available = match resource {
            Resource::Gold => &mut self.gold,
            Resource::Elixir => &mut self.elixir,
        };
        if *available < amount {
            return Err(GameError::InsufficientResources {
                resource,
                required: amount,
                available: *available,
            });
        }
        *available -= amount;
        Ok(())
    }

    /// Add income; returns the milestone crossed, if any.
    pub fn add_income(&mut self, income: IncomeEvent) -> Option<u32> {
        let old = self.gold;
        self.gold = self.gold.saturating_add(income.gold);
        self.elixir = self.elixir.saturating_add(income.elixir);
        debug!(gold = self.gold, elixir = self.elixir, "Income applied");
        self.check_milestone(old)
    }

    /// Replace resources with `baseline + loot`, floored at zero.
    ///
    /// Returns the milestone crossed between the live gold and the new
    /// gold, if any.
    pub fn settle_loot(&mut self, baseline: ResourceSnapshot, gold_loot: i64, elixir_loot: i64) -> Option<u32> {
        let old = self.gold;
        self.gold = clamp_resource(i64::from(baseline.gold) + gold_loot);
        self.elixir = clamp_resource(i64::from(baseline.elixir) + elixir_loot);
        self.check_milestone(old)
    }

    /// Record a finished troop.
    pub fn add_trained(&mut self, kind: TroopKind) {
        self.trained[kind.index()] += 1;
    }

    /// Take a troop out of the inventory for deployment.
    pub fn take_trained(&mut self, kind: TroopKind) -> Result<()> {
        let count = &mut self.trained[kind.index()];
        if *count == 0 {
            return Err(GameError::NoTrainedTroops(kind));
        }
        *count -= 1;
        Ok(())
    }

    fn check_milestone(&mut self, old_gold: u32) -> Option<u32> {
        let step = self.milestone_step;
        if old_gold / step >= self.gold / step {
            return None;
        }
        let reached = self.gold / step * step;
        self.last_milestone = self.last_milestone.max(reached);
        debug!(milestone = reached, "Gold milestone crossed");
        Some(reached)
    }
}

fn clamp_resource(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Fixed-interval timer driving income.
///
/// Owned by the session, so it lives and dies with it. While paused,
/// elapsed time is neither counted nor lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeTimer {
    interval_ms: u64,
    elapsed_ms: u64,
    paused: bool,
}

impl IncomeTimer {
    /// Create a running timer.
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            elapsed_ms: 0,
            paused: false,
        }
    }

    /// Whether the timer is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause or resume the timer.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance and return how many intervals elapsed.
    pub fn advance(&mut self, delta_ms: u64) -> u64 {
        if self.paused {
            return 0;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms);
        let fired = self.elapsed_ms / self.interval_ms;
        self.elapsed_ms %= self.interval_ms;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::BuildingKind;
    use crate::data::BuildingCatalog;
    use crate::math::Vec2Fixed;

    fn building(kind: BuildingKind, is_enemy: bool) -> Building {
        let catalog = BuildingCatalog::default();
        Building::from_data(1, kind, catalog.get(kind), is_enemy, (0, 0), Vec2Fixed::ZERO)
    }

    #[test]
    fn test_spend_checks_balance() {
        let mut economy = Economy::new(500, 200, 100);
        economy.spend(Resource::Gold, 100).unwrap();
        assert_eq!(economy.gold(), 400);

        let err = economy.spend(Resource::Elixir, 201).unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientResources { resource: Resource::Elixir, required: 201, available: 200 }
        ));
        assert_eq!(economy.elixir(), 200);
    }

    #[test]
    fn test_income_counts_mines_and_barracks() {
        let mut ruined = building(BuildingKind::Mine, false);
        ruined.take_damage(300);
        let buildings = [
            building(BuildingKind::Mine, false),
            building(BuildingKind::Mine, true),
            building(BuildingKind::Barracks, false),
            building(BuildingKind::TownHall, false),
            ruined,
        ];
        assert_eq!(base_income(&buildings), IncomeEvent { gold: 20, elixir: 6 });
    }

    #[test]
    fn test_milestone_on_crossing_only() {
        let mut economy = Economy::new(400, 0, 100);
        assert_eq!(economy.last_milestone(), 400);
        assert_eq!(economy.add_income(IncomeEvent { gold: 90, elixir: 0 }), None);
        assert_eq!(economy.add_income(IncomeEvent { gold: 10, elixir: 0 }), Some(500));
        assert_eq!(economy.last_milestone(), 500);
        assert_eq!(economy.add_income(IncomeEvent { gold: 10, elixir: 6 }), None);
    }

    #[test]
    fn test_settle_loot_floors_at_zero() {
        let mut economy = Economy::new(500, 50, 100);
        let baseline = economy.snapshot();
        economy.spend(Resource::Elixir, 50).unwrap();

        economy.settle_loot(baseline, 0, -80);
        assert_eq!(economy.gold(), 500);
        assert_eq!(economy.elixir(), 0);
    }

    #[test]
    fn test_settle_loot_uses_baseline_and_reports_milestone() {
        let mut economy = Economy::new(480, 200, 100);
        let baseline = economy.snapshot();
        economy.add_income(IncomeEvent { gold: 10, elixir: 0 });

        assert_eq!(economy.settle_loot(baseline, 150, 100), Some(600));
        assert_eq!(economy.gold(), 630);
        assert_eq!(economy.elixir(), 300);
    }

    #[test]
    fn test_trained_inventory() {
        let mut economy = Economy::new(0, 0, 100);
        assert!(matches!(
            economy.take_trained(TroopKind::Bear),
            Err(GameError::NoTrainedTroops(TroopKind::Bear))
        ));
        economy.add_trained(TroopKind::Bear);
        assert_eq!(economy.trained(TroopKind::Bear), 1);
        economy.take_trained(TroopKind::Bear).unwrap();
        assert_eq!(economy.trained(TroopKind::Bear), 0);
    }

    #[test]
    fn test_income_timer_intervals() {
        let mut timer = IncomeTimer::new(2000);
        assert_eq!(timer.advance(1999), 0);
        assert_eq!(timer.advance(1), 1);
        assert_eq!(timer.advance(4500), 2);
        assert_eq!(timer.advance(1500), 1);
    }

    #[test]
    fn test_paused_timer_keeps_progress() {
        let mut timer = IncomeTimer::new(2000);
        timer.advance(1500);
        timer.set_paused(true);
        assert_eq!(timer.advance(10_000), 0);
        timer.set_paused(false);
        assert_eq!(timer.advance(500), 1);
    }
}
