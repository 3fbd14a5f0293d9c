//! Deployed troops: targeting, coordination and attacks.
//!
//! Troops only ever attack enemy buildings. Two kinds bend the default
//! "walk to the nearest building" plan:
//!
//! - Rabbits hang back behind the frontline bear heading for the same
//!   target, backing off slowly while they are too far forward.
//! - Penguins drop their own plan to cover the nearest badly injured bear,
//!   shooting at whatever that bear is fighting.
//!
//! Targets and supported bears are ids into the owning registries and are
//! resolved on every use, so a removed entity simply reads as missing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildings::Building;
use crate::components::{EntityId, Health, TargetRef, TroopKind};
use crate::data::{AiTuning, TroopData};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::projectile::SpawnRequest;
use crate::simulation::EntityStorage;

/// Penguin support-mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SupportState {
    /// Whether the penguin is currently covering an injured bear.
    pub active: bool,
    /// Bear being covered.
    pub bear: Option<EntityId>,
}

/// Kind-specific AI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TroopRole {
    /// Melee frontliner.
    Bear,
    /// Stays behind bears.
    Rabbit,
    /// Long-range support.
    Penguin(SupportState),
}

impl TroopRole {
    const fn for_kind(kind: TroopKind) -> Self {
        match kind {
            TroopKind::Bear => Self::Bear,
            TroopKind::Rabbit => Self::Rabbit,
            TroopKind::Penguin => Self::Penguin(SupportState {
                active: false,
                bear: None,
            }),
        }
    }
}

/// Everything a troop reads from the world during its update.
#[derive(Debug, Clone, Copy)]
pub struct TroopContext<'a> {
    /// All live troops, including a stale copy of the one updating.
    pub troops: &'a EntityStorage<Troop>,
    /// All live buildings.
    pub buildings: &'a EntityStorage<Building>,
    /// AI tuning constants.
    pub ai: &'a AiTuning,
    /// Current simulation time.
    pub now_ms: u64,
}

impl TroopContext<'_> {
    fn enemy_buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings
            .iter_sorted()
            .filter(|b| b.is_enemy && !b.is_destroyed())
    }

    fn nearest_enemy_building(&self, from: Vec2Fixed) -> Option<EntityId> {
        nearest(self.enemy_buildings(), |b| from.distance_squared(b.position)).map(|b| b.id)
    }

    fn injured_bears(&self) -> impl Iterator<Item = &Troop> {
        let threshold = self.ai.injured_bear_percent;
        self.troops
            .iter_sorted()
            .filter(move |t| t.kind == TroopKind::Bear && t.health.is_below_percent(threshold))
    }

    fn living_building(&self, id: Option<EntityId>) -> Option<&Building> {
        id.and_then(|id| self.buildings.get(id))
            .filter(|b| !b.is_destroyed())
    }
}

/// First element with the strictly smallest key.
fn nearest<'a, T, I, F>(items: I, mut key: F) -> Option<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    F: FnMut(&T) -> Fixed,
{
    let mut best: Option<(&T, Fixed)> = None;
    for item in items {
        let k = key(item);
        if best.map_or(true, |(_, b)| k < b) {
            best = Some((item, k));
        }
    }
    best.map(|(item, _)| item)
}

/// A deployed troop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Troop {
    /// Entity id in the troop registry.
    pub id: EntityId,
    /// Troop type.
    pub kind: TroopKind,
    /// Hit points.
    pub health: Health,
    /// Damage per projectile.
    pub damage: u32,
    /// Movement per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Attack range.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Ground position.
    pub position: Vec2Fixed,
    /// Building being attacked.
    pub target: Option<EntityId>,
    /// Simulation time of the last attack; `None` until the first.
    pub last_attack_ms: Option<u64>,
    /// Kind-specific AI state.
    pub role: TroopRole,
}

impl Troop {
    /// Create a troop at full health.
    #[must_use]
    pub fn from_data(id: EntityId, kind: TroopKind, data: &TroopData, position: Vec2Fixed) -> Self {
        Self {
            id,
            kind,
            health: Health::new(data.health),
            damage: data.damage,
            speed: data.speed,
            range: data.range,
            position,
            target: None,
            last_attack_ms: None,
            role: TroopRole::for_kind(kind),
        }
    }

    /// Whether the troop has died.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.health.is_dead()
    }

    /// Apply damage; returns `true` once the troop is dead.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        self.health.apply_damage(amount);
        self.is_dead()
    }

    /// Penguin support state; `None` for other kinds.
    #[must_use]
    pub const fn support(&self) -> Option<SupportState> {
        match self.role {
            TroopRole::Penguin(state) => Some(state),
            _ => None,
        }
    }

    fn set_support(&mut self, state: SupportState) {
        if let TroopRole::Penguin(current) = &mut self.role {
            *current = state;
        }
    }

    /// Run one tick of targeting, movement and attack.
    pub fn update(&mut self, ctx: &TroopContext<'_>) -> Option<SpawnRequest> {
        if self.kind == TroopKind::Rabbit && self.retreat_behind_bears(ctx) {
            return None;
        }

        let previous = self.target;
        if self.kind == TroopKind::Penguin {
            if !self.cover_injured_bear(ctx) {
                self.set_support(SupportState::default());
                if ctx.living_building(self.target).is_none() {
                    self.find_new_target(ctx);
                }
            }
        } else if ctx.living_building(self.target).is_none() {
            self.find_new_target(ctx);
        }
        if self.target != previous {
            debug!(troop = self.id, kind = ?self.kind, target = ?self.target, "Troop retargeted");
        }

        self.advance_or_attack(ctx)
    }

    /// Back away from the target while not behind the frontline bear.
    ///
    /// Returns `true` when the rabbit retreated and must skip the rest of
    /// its tick.
    fn retreat_behind_bears(&mut self, ctx: &TroopContext<'_>) -> bool {
        let Some(target) = self.target.and_then(|id| ctx.buildings.get(id)) else {
            return false;
        };
        let cover_sq = ctx.ai.rabbit_cover_radius * ctx.ai.rabbit_cover_radius;
        let position = self.position;
        let bears = ctx.troops.iter_sorted().filter(|t| {
            t.kind == TroopKind::Bear && !t.is_dead() && position.distance_squared(t.position) < cover_sq
        });

        let Some(frontline) = nearest(bears, |bear| bear.position.distance_squared(target.position)) else {
            return false;
        };

        let bear_dist = frontline.position.distance(target.position);
        let my_dist = self.position.distance(target.position);
        if my_dist > bear_dist + ctx.ai.rabbit_safety_margin {
            return false;
        }

        let away = target.position.direction_to(self.position);
        self.position += away.scale(self.speed * ctx.ai.rabbit_retreat_factor);
        true
    }

    /// Enter support mode for the nearest injured bear, if any.
    ///
    /// Returns `false` when no bear needs cover.
    fn cover_injured_bear(&mut self, ctx: &TroopContext<'_>) -> bool {
        let position = self.position;
        let Some(bear) = nearest(ctx.injured_bears(), |b| position.distance_squared(b.position)) else {
            return false;
        };

        self.set_support(SupportState {
            active: true,
            bear: Some(bear.id),
        });
        self.target = match ctx.living_building(bear.target) {
            Some(building) => Some(building.id),
            None => ctx.nearest_enemy_building(bear.position),
        };
        true
    }

    fn find_new_target(&mut self, ctx: &TroopContext<'_>) {
        self.target = ctx.nearest_enemy_building(self.position);
    }

    fn optimal_range(&self, ai: &AiTuning) -> Fixed {
        if self.range > ai.long_range_cutoff {
            self.range * ai.hold_back_factor
        } else {
            self.range
        }
    }

    fn advance_or_attack(&mut self, ctx: &TroopContext<'_>) -> Option<SpawnRequest> {
        let target = ctx.buildings.get(self.target?)?;
        let dist = self.position.distance(target.position);

        if dist > self.optimal_range(ctx.ai) {
            let heading = self.position.direction_to(target.position);
            self.position += heading.scale(self.speed);
            return None;
        }

        if dist >= self.range {
            return None;
        }
        let ready = self.last_attack_ms.map_or(true, |last| {
            ctx.now_ms.saturating_sub(last) > ctx.ai.troop_attack_interval_ms
        });
        if !ready {
            return None;
        }

        self.last_attack_ms = Some(ctx.now_ms);
        Some(SpawnRequest {
            source: TargetRef::Troop(self.id),
            target: TargetRef::Building(target.id),
            damage: self.damage,
            kind: self.kind.projectile_kind(),
            origin: self.position,
        })
    }
}
