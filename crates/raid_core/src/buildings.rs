//! Placed structures and their per-tick behavior.
//!
//! A building carries only the state its role needs: towers hold attack
//! stats and a target, barracks hold training pipelines, everything else
//! is a plain block of hit points.
//!
//! All calculations use fixed-point math for deterministic simulation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{BuildingKind, EntityId, Health, ProjectileKind, TargetRef};
use crate::data::{BuildingData, TowerStats};
use crate::math::Vec2Fixed;
use crate::production::TrainingQueues;
use crate::projectile::SpawnRequest;

/// Attack state of a defensive tower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerState {
    /// Damage, range and cooldown.
    pub stats: TowerStats,
    /// Troop currently aimed at.
    pub target: Option<EntityId>,
    /// Simulation time of the last shot; `None` until the first.
    pub last_attack_ms: Option<u64>,
}

impl TowerState {
    /// Create an idle tower.
    #[must_use]
    pub const fn new(stats: TowerStats) -> Self {
        Self {
            stats,
            target: None,
            last_attack_ms: None,
        }
    }

    fn cooldown_ready(&self, now_ms: u64) -> bool {
        self.last_attack_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.stats.attack_interval_ms)
    }
}

/// Role-specific behavior of a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingRole {
    /// No active behavior.
    Passive,
    /// Shoots at troops.
    Tower(TowerState),
    /// Trains troops.
    Barracks(TrainingQueues),
}

/// A placed building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Entity id in the building registry.
    pub id: EntityId,
    /// Building type.
    pub kind: BuildingKind,
    /// Whether this belongs to the raided base.
    pub is_enemy: bool,
    /// Hit points.
    pub health: Health,
    /// Footprint edge length in cells.
    pub size: u32,
    /// Footprint origin cell column.
    pub cell_x: i32,
    /// Footprint origin cell row.
    pub cell_z: i32,
    /// World position at the footprint center.
    pub position: Vec2Fixed,
    /// Gold per income tick.
    pub gold_rate: u32,
    /// Elixir per income tick.
    pub elixir_rate: u32,
    /// Role-specific state.
    pub role: BuildingRole,
}

impl Building {
    /// Build a fresh entity from its definition.
    #[must_use]
    pub fn from_data(
        id: EntityId,
        kind: BuildingKind,
        data: &BuildingData,
        is_enemy: bool,
        cell: (i32, i32),
        position: Vec2Fixed,
    ) -> Self {
        let role = match (&data.tower, data.trains_troops) {
            (Some(stats), _) if stats.damage > 0 => BuildingRole::Tower(TowerState::new(stats.clone())),
            (_, true) => BuildingRole::Barracks(TrainingQueues::new()),
            _ => BuildingRole::Passive,
        };

        Self {
            id,
            kind,
            is_enemy,
            health: Health::new(data.health),
            size: data.size,
            cell_x: cell.0,
            cell_z: cell.1,
            position,
            gold_rate: data.gold_rate,
            elixir_rate: data.elixir_rate,
            role,
        }
    }

    /// Whether the building has been destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.health.is_dead()
    }

    /// Apply damage; returns `true` once the building is destroyed.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        self.health.apply_damage(amount);
        self.is_destroyed()
    }

    /// Tower state, if this building attacks.
    #[must_use]
    pub const fn tower(&self) -> Option<&TowerState> {
        match &self.role {
            BuildingRole::Tower(tower) => Some(tower),
            _ => None,
        }
    }

    /// Training pipelines, if this is a barracks.
    #[must_use]
    pub const fn training(&self) -> Option<&TrainingQueues> {
        match &self.role {
            BuildingRole::Barracks(queues) => Some(queues),
            _ => None,
        }
    }

    /// Mutable training pipelines, if this is a barracks.
    pub fn training_mut(&mut self) -> Option<&mut TrainingQueues> {
        match &mut self.role {
            BuildingRole::Barracks(queues) => Some(queues),
            _ => None,
        }
    }

    /// Run one tower tick against the live troops.
    ///
    /// `troops` yields `(id, position)` of living troops in id order. The
    /// tower always retargets to the nearest troop within range (first
    /// seen wins ties), so a target that walks out of range is dropped on
    /// the same tick. It then fires if its cooldown has elapsed.
    pub fn update_tower<I>(&mut self, troops: I, now_ms: u64) -> Option<SpawnRequest>
    where
        I: IntoIterator<Item = (EntityId, Vec2Fixed)>,
    {
        let id = self.id;
        let position = self.position;
        let BuildingRole::Tower(tower) = &mut self.role else {
            return None;
        };

        let range_sq = tower.stats.range * tower.stats.range;
        let mut nearest: Option<EntityId> = None;
        let mut best = range_sq;
        for (troop_id, troop_pos) in troops {
            let dist_sq = position.distance_squared(troop_pos);
            if dist_sq <= range_sq && (nearest.is_none() || dist_sq < best) {
                best = dist_sq;
                nearest = Some(troop_id);
            }
        }

        if tower.target != nearest {
            debug!(tower = id, target = ?nearest, "Tower retargeted");
        }
        tower.target = nearest;

        let target = nearest?;
        if !tower.cooldown_ready(now_ms) {
            return None;
        }

        tower.last_attack_ms = Some(now_ms);
        Some(SpawnRequest {
            source: TargetRef::Building(id),
            target: TargetRef::Troop(target),
            damage: tower.stats.damage,
            kind: ProjectileKind::Arrow,
            origin: position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BuildingCatalog;
    use crate::math::Fixed;

    fn tower_at_origin() -> Building {
        let catalog = BuildingCatalog::default();
        Building::from_data(
            1,
            BuildingKind::ArcherTower,
            catalog.get(BuildingKind::ArcherTower),
            true,
            (10, 10),
            Vec2Fixed::ZERO,
        )
    }

    fn at(x: i32, z: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, z)
    }

    #[test]
    fn test_roles_follow_data() {
        let catalog = BuildingCatalog::default();
        let mk = |kind| Building::from_data(1, kind, catalog.get(kind), false, (0, 0), Vec2Fixed::ZERO);

        assert!(matches!(mk(BuildingKind::ArcherTower).role, BuildingRole::Tower(_)));
        assert!(matches!(mk(BuildingKind::Barracks).role, BuildingRole::Barracks(_)));
        assert!(matches!(mk(BuildingKind::Mine).role, BuildingRole::Passive));
        assert!(matches!(mk(BuildingKind::TownHall).role, BuildingRole::Passive));
        assert_eq!(mk(BuildingKind::Mine).gold_rate, 10);
        assert_eq!(mk(BuildingKind::TownHall).health.max, 1000);
    }

    #[test]
    fn test_take_damage_reports_destruction() {
        let mut tower = tower_at_origin();
        assert!(!tower.take_damage(499));
        assert!(tower.take_damage(5));
        assert_eq!(tower.health.current, 0);
    }

    #[test]
    fn test_tower_picks_nearest_in_range() {
        let mut tower = tower_at_origin();
        let shot = tower.update_tower([(5, at(5, 0)), (6, at(0, 3))], 0).unwrap();

        assert_eq!(tower.tower().unwrap().target, Some(6));
        assert_eq!(shot.target, TargetRef::Troop(6));
        assert_eq!(shot.damage, 3);
        assert_eq!(shot.kind, ProjectileKind::Arrow);
    }

    #[test]
    fn test_tower_ignores_out_of_range() {
        let mut tower = tower_at_origin();
        assert!(tower.update_tower([(5, at(9, 0))], 0).is_none());
        assert_eq!(tower.tower().unwrap().target, None);

        // Exactly on the range boundary counts as in range
        assert!(tower.update_tower([(5, at(8, 0))], 0).is_some());
    }

    #[test]
    fn test_tower_drops_target_leaving_range() {
        let mut tower = tower_at_origin();
        assert!(tower.update_tower([(5, at(7, 0))], 0).is_some());
        assert_eq!(tower.tower().unwrap().target, Some(5));

        assert!(tower.update_tower([(5, at(9, 0))], 2000).is_none());
        assert_eq!(tower.tower().unwrap().target, None);
    }

    #[test]
    fn test_tower_tie_goes_to_first() {
        let mut tower = tower_at_origin();
        tower.update_tower([(3, at(4, 0)), (4, at(-4, 0))], 0);
        assert_eq!(tower.tower().unwrap().target, Some(3));
    }

    #[test]
    fn test_tower_cooldown() {
        let mut tower = tower_at_origin();
        let troops = [(2, at(2, 2))];
        assert!(tower.update_tower(troops, 0).is_some());
        assert!(tower.update_tower(troops, 999).is_none());
        assert!(tower.update_tower(troops, 1000).is_some());
    }

    #[test]
    fn test_tower_preempted_by_closer_troop() {
        let mut tower = tower_at_origin();
        tower.update_tower([(2, at(6, 0))], 0);
        tower.update_tower([(2, at(6, 0)), (3, at(1, 0))], 16);
        assert_eq!(tower.tower().unwrap().target, Some(3));
    }

    #[test]
    fn test_non_tower_never_fires() {
        let catalog = BuildingCatalog::default();
        let mut mine = Building::from_data(1, BuildingKind::Mine, catalog.get(BuildingKind::Mine), true, (0, 0), Vec2Fixed::ZERO);
        assert!(mine.update_tower([(2, Vec2Fixed::new(Fixed::ONE, Fixed::ZERO))], 0).is_none());
    }
}
