//! Projectile flight and hit detection.
//!
//! Projectiles are fire-and-forget: the heading is fixed at spawn, they
//! never re-aim or retarget, and they only ever damage the entity they
//! were fired at.

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, ProjectileKind, TargetRef};
use crate::data::ProjectileTuning;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Request emitted by an attacker whose cooldown expired with a target in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Attacking entity.
    pub source: TargetRef,
    /// Entity the projectile is fired at.
    pub target: TargetRef,
    /// Damage applied on hit.
    pub damage: u32,
    /// Visual type.
    pub kind: ProjectileKind,
    /// Ground position the projectile launches from.
    pub origin: Vec2Fixed,
}

/// Live view of a projectile's target, resolved each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetState {
    /// Current ground position.
    pub position: Vec2Fixed,
    /// Whether the target still has hit points left.
    pub alive: bool,
}

/// Result of advancing a projectile by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightOutcome {
    /// Still travelling.
    InFlight,
    /// Reached the target; damage should be applied.
    Hit,
    /// Target died or vanished before impact; no damage.
    Fizzled,
}

/// A single in-flight projectile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSim {
    /// Entity id in the projectile registry.
    pub id: EntityId,
    /// Who fired it.
    pub source: TargetRef,
    /// Who it is flying at.
    pub target: TargetRef,
    /// Damage applied on hit.
    pub damage: u32,
    /// Visual type.
    pub kind: ProjectileKind,
    /// Current ground position.
    pub position: Vec2Fixed,
    /// Height above ground. Constant during flight; hits compare at this height.
    #[serde(with = "fixed_serde")]
    pub height: Fixed,
    /// Unit heading, fixed at spawn.
    pub direction: Vec2Fixed,
    /// World units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    #[serde(with = "fixed_serde")]
    hit_radius: Fixed,
    active: bool,
}

impl ProjectileSim {
    /// Launch a projectile towards the target's position at spawn time.
    #[must_use]
    pub fn launch(request: &SpawnRequest, target_position: Vec2Fixed, tuning: &ProjectileTuning) -> Self {
        Self {
            id: 0,
            source: request.source,
            target: request.target,
            damage: request.damage,
            kind: request.kind,
            position: request.origin,
            height: tuning.launch_height,
            direction: request.origin.direction_to(target_position),
            speed: tuning.speed,
            hit_radius: tuning.hit_radius,
            active: true,
        }
    }

    /// Whether the projectile is still in flight.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Advance by `delta_ms` and test for impact.
    ///
    /// `target` is `None` when the target no longer exists. The hit test
    /// runs before the liveness test, so a projectile arriving on the
    /// tick its target dies still counts as a hit. A projectile that has
    /// passed its target without hitting it fizzles.
    pub fn advance(&mut self, delta_ms: u64, target: Option<TargetState>) -> FlightOutcome {
        if !self.active {
            return FlightOutcome::Fizzled;
        }

        let seconds = Fixed::from_num(delta_ms) / Fixed::from_num(1000);
        self.position += self.direction.scale(self.speed * seconds);

        let Some(target) = target else {
            self.active = false;
            return FlightOutcome::Fizzled;
        };

        if self.position.distance(target.position) < self.hit_radius {
            self.active = false;
            return FlightOutcome::Hit;
        }

        if !target.alive {
            self.active = false;
            return FlightOutcome::Fizzled;
        }

        // Flew past a target that moved off the line
        if (target.position - self.position).dot(self.direction) < Fixed::ZERO {
            self.active = false;
            return FlightOutcome::Fizzled;
        }

        FlightOutcome::InFlight
    }
}
