//! Game session and tick loop.
//!
//! [`GameSession`] owns every piece of mutable game state: resources,
//! the placement grid, the building/troop/projectile registries, the raid
//! in progress and the simulated clock. The host drives it with
//! [`GameSession::tick`] and player intents; it reacts to the returned
//! [`TickEvents`].
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - No system randomness or wall-clock time (seeded RNG, simulated clock)
//! - Consistent iteration order (sorted entity IDs)
//! - Same config, commands and tick deltas always produce the same state
//!
//! # Example
//!
//! ```
//! use raid_core::components::BuildingKind;
//! use raid_core::simulation::GameSession;
//!
//! let mut session = GameSession::default();
//! session.place_building(BuildingKind::Mine, 3, 3).unwrap();
//! assert_eq!(session.gold(), 400);
//!
//! let events = session.tick(2000);
//! assert_eq!(session.gold(), 410);
//! assert_eq!(events.income.len(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::battle::{BattleEndReason, BattleResults, BattleSignals, BattleState};
use crate::buildings::{Building, BuildingRole};
use crate::components::{BuildingKind, EntityId, GameMode, LayoutEntry, TargetRef, TroopKind};
use crate::data::GameConfig;
use crate::economy::{base_income, Economy, IncomeEvent, IncomeTimer};
use crate::error::{GameError, Resource, Result};
use crate::grid::{GridIndex, PlacementPreview};
use crate::math::Vec2Fixed;
use crate::production::TrainingProgress;
use crate::projectile::{FlightOutcome, ProjectileSim, SpawnRequest, TargetState};
use crate::rng::SimRng;
use crate::troops::{Troop, TroopContext};

/// Registry for one entity category.
///
/// Uses a `HashMap` for O(1) lookup by ID, with deterministic iteration
/// via sorted keys. Ids are never reused, so a stale id can only miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStorage<T> {
    entities: HashMap<EntityId, T>,
    next_id: EntityId,
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntityStorage<T> {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate an id, build the entity with it and store it.
    pub fn insert_with(&mut self, build: impl FnOnce(EntityId) -> T) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.entities.insert(id, build(id));
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Remove every entity. Ids keep counting up.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Sorted entity IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over entities in id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &T> {
        self.sorted_ids()
            .into_iter()
            .filter_map(move |id| self.entities.get(&id))
    }
}

/// Damage applied by a projectile hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Entity hit.
    pub target: TargetRef,
    /// Damage carried by the projectile.
    pub amount: u32,
    /// Whether the hit left the target at zero hit points.
    pub destroyed: bool,
}

/// A building removed after being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDestroyed {
    /// Building id.
    pub id: EntityId,
    /// Building type.
    pub kind: BuildingKind,
    /// Whether it belonged to the raided base.
    pub is_enemy: bool,
}

/// A troop finished training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopTrained {
    /// Barracks that trained it.
    pub barracks: EntityId,
    /// Troop type.
    pub kind: TroopKind,
}

/// Events generated during a tick.
///
/// These are what the visual, audio and UI layers react to; no core state
/// depends on how they are handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Projectiles launched this tick.
    pub projectiles_spawned: Vec<SpawnRequest>,
    /// Projectile hits.
    pub damage: Vec<DamageEvent>,
    /// Buildings removed after destruction.
    pub buildings_destroyed: Vec<BuildingDestroyed>,
    /// Troops removed after dying.
    pub troops_killed: Vec<EntityId>,
    /// Troops that finished training.
    pub troops_trained: Vec<TroopTrained>,
    /// Income ticks.
    pub income: Vec<IncomeEvent>,
    /// Gold milestones crossed.
    pub milestones: Vec<u32>,
    /// Results, on the tick the raid ended.
    pub battle_ended: Option<BattleResults>,
}

/// What the player comes home with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnSummary {
    /// Final raid score.
    pub results: BattleResults,
    /// Gold milestone crossed by applying the loot, if any.
    pub milestone: Option<u32>,
}

/// A complete game session.
///
/// # Tick Order
///
/// 1. **Income** - fixed-interval income (paused during raids by default)
/// 2. **Training** - barracks pipelines, home mode only
/// 3. **Battle** - while a raid runs: timer, troops, towers, projectiles,
///    cleanup, then end-condition evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    config: GameConfig,
    mode: GameMode,
    clock_ms: u64,
    grid: GridIndex,
    buildings: EntityStorage<Building>,
    troops: EntityStorage<Troop>,
    projectiles: EntityStorage<ProjectileSim>,
    economy: Economy,
    income_timer: IncomeTimer,
    battle: Option<BattleState>,
    home_layout: Vec<LayoutEntry>,
    rng: SimRng,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::build(GameConfig::default())
    }
}

impl GameSession {
    /// Start a session with a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] if the config fails validation.
    pub fn new(config: GameConfig) -> Result<Self> {
        Ok(Self::build(config.validated()?))
    }

    /// Start a session from RON config text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or fails validation.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Self::new(GameConfig::from_ron_str(text)?)
    }

    fn build(config: GameConfig) -> Self {
        let mut session = Self {
            mode: GameMode::Home,
            clock_ms: 0,
            grid: GridIndex::new(config.grid_size, config.cell_size),
            buildings: EntityStorage::new(),
            troops: EntityStorage::new(),
            projectiles: EntityStorage::new(),
            economy: Economy::new(config.starting_gold, config.starting_elixir, config.milestone_step),
            income_timer: IncomeTimer::new(config.income_interval_ms),
            battle: None,
            home_layout: config.home_base.clone(),
            rng: SimRng::new(config.seed),
            config,
        };
        session.restore_home_base();
        info!(gold = session.gold(), elixir = session.elixir(), "Session started");
        session
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> GameMode {
        self.mode
    }

    /// Simulated milliseconds since the session started.
    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Current gold.
    #[must_use]
    pub const fn gold(&self) -> u32 {
        self.economy.gold()
    }

    /// Current elixir.
    #[must_use]
    pub const fn elixir(&self) -> u32 {
        self.economy.elixir()
    }

    /// Resources and inventory.
    #[must_use]
    pub const fn economy(&self) -> &Economy {
        &self.economy
    }

    /// Trained troops of a kind ready to deploy.
    #[must_use]
    pub const fn trained_troops(&self, kind: TroopKind) -> u32 {
        self.economy.trained(kind)
    }

    /// Placement grid.
    #[must_use]
    pub const fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Saved home-base layout, in placement order.
    #[must_use]
    pub fn home_layout(&self) -> &[LayoutEntry] {
        &self.home_layout
    }

    /// Raid in progress or just ended.
    #[must_use]
    pub const fn battle(&self) -> Option<&BattleState> {
        self.battle.as_ref()
    }

    /// Milliseconds left on the raid timer; zero outside a raid.
    #[must_use]
    pub fn battle_time_remaining_ms(&self) -> u64 {
        self.battle.as_ref().map_or(0, BattleState::time_remaining_ms)
    }

    /// Results of the raid, once it has ended.
    #[must_use]
    pub fn battle_results(&self) -> Option<&BattleResults> {
        self.battle.as_ref().and_then(BattleState::results)
    }

    /// Whether a raid is running and not yet ended.
    #[must_use]
    pub fn is_battle_running(&self) -> bool {
        self.mode == GameMode::Attack && self.battle.as_ref().is_some_and(|b| !b.is_ended())
    }

    /// Training progress of a troop type at the player's training barracks.
    #[must_use]
    pub fn training_progress(&self, kind: TroopKind) -> TrainingProgress {
        self.training_barracks()
            .and_then(|id| self.buildings.get(id))
            .and_then(Building::training)
            .map(|queues| queues.progress(kind))
            .unwrap_or_default()
    }

    /// Look up a building.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(id)
    }

    /// Look up a troop.
    #[must_use]
    pub fn troop(&self, id: EntityId) -> Option<&Troop> {
        self.troops.get(id)
    }

    /// Live buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.iter_sorted()
    }

    /// Live troops in id order.
    pub fn troops(&self) -> impl Iterator<Item = &Troop> {
        self.troops.iter_sorted()
    }

    /// In-flight projectiles in id order.
    pub fn projectiles(&self) -> impl Iterator<Item = &ProjectileSim> {
        self.projectiles.iter_sorted()
    }

    /// Enemy buildings still standing.
    #[must_use]
    pub fn enemy_building_count(&self) -> u32 {
        let count = self.buildings.iter_sorted().filter(|b| b.is_enemy).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Snap a world point to the grid and check whether `kind` fits there.
    #[must_use]
    pub fn preview(&self, kind: BuildingKind, point: Vec2Fixed) -> PlacementPreview {
        self.grid.preview(point, self.config.buildings.get(kind).size)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Build at a cell of the home base.
    ///
    /// # Errors
    ///
    /// Fails outside home mode, for the town hall, when the footprint does
    /// not fit, or when gold is short. Nothing changes on failure.
    pub fn place_building(&mut self, kind: BuildingKind, x: i32, z: i32) -> Result<EntityId> {
        self.require_mode(GameMode::Home)?;
        if kind == BuildingKind::TownHall {
            warn!(?kind, "Rejected placement of unbuildable building");
            return Err(GameError::NotBuildable(kind));
        }

        let data = self.config.buildings.get(kind);
        if !self.grid.can_place(x, z, data.size) {
            warn!(?kind, x, z, "Rejected placement: footprint blocked");
            return Err(GameError::InvalidPlacement { kind, x, z });
        }
        if let Err(e) = self.economy.spend(Resource::Gold, data.cost) {
            warn!(?kind, error = %e, "Rejected placement");
            return Err(e);
        }

        let id = self
            .spawn_building(kind, x, z, false)
            .ok_or(GameError::InvalidPlacement { kind, x, z })?;
        self.home_layout.push(LayoutEntry::new(kind, x, z));
        debug!(id, ?kind, x, z, gold = self.gold(), "Building placed");
        Ok(id)
    }

    /// Build at the cell under a world point.
    ///
    /// # Errors
    ///
    /// Same as [`place_building`](Self::place_building).
    pub fn place_building_at(&mut self, kind: BuildingKind, point: Vec2Fixed) -> Result<EntityId> {
        let (x, z) = self.grid.world_to_cell(point);
        self.place_building(kind, x, z)
    }

    /// Queue a troop at the player's first barracks.
    ///
    /// # Errors
    ///
    /// Fails when elixir is short or the player has no barracks.
    pub fn train_troop(&mut self, kind: TroopKind) -> Result<()> {
        let data = self.config.troops.get(kind);
        let (cost, train_time_ms) = (data.cost, data.train_time_ms);

        if !self.economy.can_afford(Resource::Elixir, cost) {
            warn!(?kind, "Rejected training: not enough elixir");
            return Err(GameError::InsufficientResources {
                resource: Resource::Elixir,
                required: cost,
                available: self.elixir(),
            });
        }
        let Some(barracks) = self.training_barracks() else {
            warn!(?kind, "Rejected training: no barracks");
            return Err(GameError::NoBarracks);
        };
        let queues = self
            .buildings
            .get_mut(barracks)
            .and_then(Building::training_mut)
            .ok_or(GameError::EntityNotFound(barracks))?;

        queues.enqueue(kind, train_time_ms);
        self.economy.spend(Resource::Elixir, cost)?;
        debug!(?kind, barracks, elixir = self.elixir(), "Troop queued");
        Ok(())
    }

    /// Deploy a trained troop at a world point.
    ///
    /// # Errors
    ///
    /// Fails outside a running raid, off the battlefield, or with no
    /// trained troop of that kind.
    pub fn deploy_troop(&mut self, kind: TroopKind, point: Vec2Fixed) -> Result<EntityId> {
        self.require_mode(GameMode::Attack)?;
        if !self.is_battle_running() {
            return Err(GameError::BattleOver);
        }
        if !self.grid.contains_point(point) {
            warn!(?kind, x = %point.x, z = %point.y, "Rejected deployment off the battlefield");
            return Err(GameError::OutOfBounds {
                x: point.x,
                z: point.y,
            });
        }
        if let Err(e) = self.economy.take_trained(kind) {
            warn!(?kind, error = %e, "Rejected deployment");
            return Err(e);
        }

        let data = self.config.troops.get(kind);
        let cost = data.cost;
        let id = self
            .troops
            .insert_with(|id| Troop::from_data(id, kind, data, point));
        if let Some(battle) = self.battle.as_mut() {
            battle.record_deployment(cost);
        }
        debug!(id, ?kind, x = %point.x, z = %point.y, "Troop deployed");
        Ok(id)
    }

    /// Raid a randomly chosen enemy base.
    ///
    /// Returns the index of the chosen layout.
    ///
    /// # Errors
    ///
    /// Fails outside home mode or with an empty enemy catalog.
    pub fn start_attack(&mut self) -> Result<usize> {
        self.require_mode(GameMode::Home)?;
        let available = self.config.enemy_bases.len();
        let index = self
            .rng
            .next_index(available)
            .ok_or(GameError::UnknownLayout { index: 0, available })?;
        self.start_attack_on(index)?;
        Ok(index)
    }

    /// Raid a specific enemy base.
    ///
    /// Snapshots resources, clears the home base off the field and builds
    /// the enemy base. Barracks training queues do not survive the trip.
    ///
    /// # Errors
    ///
    /// Fails outside home mode or for an unknown layout.
    pub fn start_attack_on(&mut self, layout_index: usize) -> Result<()> {
        self.require_mode(GameMode::Home)?;
        let layout = self
            .config
            .enemy_bases
            .get(layout_index)
            .cloned()
            .ok_or(GameError::UnknownLayout {
                index: layout_index,
                available: self.config.enemy_bases.len(),
            })?;

        let baseline = self.economy.snapshot();
        self.clear_field();

        let mut placed = 0u32;
        for entry in &layout {
            if self.spawn_building(entry.kind, entry.x, entry.z, true).is_some() {
                placed += 1;
            } else {
                warn!(?entry, "Enemy building does not fit; skipped");
            }
        }

        self.battle = Some(BattleState::new(layout_index, self.config.battle_time_ms, baseline, placed));
        self.mode = GameMode::Attack;
        if self.config.pause_income_during_battle {
            self.income_timer.set_paused(true);
        }
        info!(layout = layout_index, buildings = placed, "Attack started");
        Ok(())
    }

    /// End the running raid now.
    ///
    /// # Errors
    ///
    /// Fails outside attack mode or if the raid already ended.
    pub fn surrender(&mut self) -> Result<BattleResults> {
        self.require_mode(GameMode::Attack)?;
        let remaining = self.enemy_building_count();
        let battle = self.battle.as_mut().ok_or(GameError::BattleOver)?;
        battle
            .end(BattleEndReason::Manual, remaining)
            .ok_or(GameError::BattleOver)
    }

    /// Collect the loot and go back to the home base.
    ///
    /// Loot applies to the resources held when the raid started, floored
    /// at zero. The field is cleared and the saved home layout rebuilt.
    ///
    /// # Errors
    ///
    /// Fails outside attack mode or before the raid has ended.
    pub fn return_home(&mut self) -> Result<ReturnSummary> {
        self.require_mode(GameMode::Attack)?;
        let (baseline, results) = match &self.battle {
            Some(battle) => match battle.results() {
                Some(results) => (battle.baseline(), *results),
                None => return Err(GameError::BattleNotEnded),
            },
            None => return Err(GameError::BattleNotEnded),
        };

        let milestone = self
            .economy
            .settle_loot(baseline, results.gold_loot, results.elixir_loot);

        self.clear_field();
        self.battle = None;
        self.mode = GameMode::Home;
        self.income_timer.set_paused(false);
        self.restore_home_base();

        info!(gold = self.gold(), elixir = self.elixir(), "Returned home");
        Ok(ReturnSummary { results, milestone })
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the session by `delta_ms` simulated milliseconds.
    pub fn tick(&mut self, delta_ms: u64) -> TickEvents {
        let mut events = TickEvents::default();
        self.clock_ms = self.clock_ms.saturating_add(delta_ms);

        self.run_income(delta_ms, &mut events);

        match self.mode {
            GameMode::Home => self.run_training(delta_ms, &mut events),
            GameMode::Attack => {
                if self.is_battle_running() {
                    self.run_battle(delta_ms, &mut events);
                }
            }
        }

        #[cfg(feature = "debug-validation")]
        self.assert_grid_consistent();

        events
    }

    fn run_income(&mut self, delta_ms: u64, events: &mut TickEvents) {
        for _ in 0..self.income_timer.advance(delta_ms) {
            let income = base_income(self.buildings.iter_sorted());
            if income.gold == 0 && income.elixir == 0 {
                continue;
            }
            if let Some(milestone) = self.economy.add_income(income) {
                events.milestones.push(milestone);
            }
            events.income.push(income);
        }
    }

    fn run_training(&mut self, delta_ms: u64, events: &mut TickEvents) {
        for id in self.buildings.sorted_ids() {
            let Some(queues) = self.buildings.get_mut(id).and_then(Building::training_mut) else {
                continue;
            };
            if let Some(kind) = queues.update(delta_ms) {
                self.economy.add_trained(kind);
                debug!(barracks = id, ?kind, "Troop trained");
                events.troops_trained.push(TroopTrained { barracks: id, kind });
            }
        }
    }

    fn run_battle(&mut self, delta_ms: u64, events: &mut TickEvents) {
        if let Some(battle) = self.battle.as_mut() {
            battle.tick_timer(delta_ms);
        }

        self.run_troops(events);
        self.run_towers(events);
        self.run_projectiles(delta_ms, events);
        let town_hall_destroyed = self.cleanup(events);

        let signals = BattleSignals {
            town_hall_destroyed,
            troops_alive: self.troops.len(),
            enemy_remaining: self.enemy_building_count(),
        };
        if let Some(battle) = self.battle.as_mut() {
            if let Some(reason) = battle.evaluate(signals) {
                events.battle_ended = battle.end(reason, signals.enemy_remaining);
            }
        }
    }

    fn run_troops(&mut self, events: &mut TickEvents) {
        for id in self.troops.sorted_ids() {
            let Some(mut troop) = self.troops.get(id).cloned() else {
                continue;
            };
            if troop.is_dead() {
                continue;
            }

            let ctx = TroopContext {
                troops: &self.troops,
                buildings: &self.buildings,
                ai: &self.config.ai,
                now_ms: self.clock_ms,
            };
            let shot = troop.update(&ctx);
            if let Some(slot) = self.troops.get_mut(id) {
                *slot = troop;
            }
            if let Some(request) = shot {
                self.launch(request, events);
            }
        }
    }

    fn run_towers(&mut self, events: &mut TickEvents) {
        let targets: Vec<(EntityId, Vec2Fixed)> = self
            .troops
            .iter_sorted()
            .filter(|t| !t.is_dead())
            .map(|t| (t.id, t.position))
            .collect();

        for id in self.buildings.sorted_ids() {
            let Some(building) = self.buildings.get_mut(id) else {
                continue;
            };
            if building.is_destroyed() || !matches!(building.role, BuildingRole::Tower(_)) {
                continue;
            }
            if let Some(request) = building.update_tower(targets.iter().copied(), self.clock_ms) {
                self.launch(request, events);
            }
        }
    }

    fn run_projectiles(&mut self, delta_ms: u64, events: &mut TickEvents) {
        for id in self.projectiles.sorted_ids() {
            let Some(target) = self.projectiles.get(id).map(|p| p.target) else {
                continue;
            };
            let state = self.target_state(target);
            let Some(projectile) = self.projectiles.get_mut(id) else {
                continue;
            };

            match projectile.advance(delta_ms, state) {
                FlightOutcome::InFlight => {}
                FlightOutcome::Fizzled => {
                    self.projectiles.remove(id);
                }
                FlightOutcome::Hit => {
                    let amount = projectile.damage;
                    self.projectiles.remove(id);
                    if let Some(destroyed) = self.apply_damage(target, amount) {
                        events.damage.push(DamageEvent {
                            target,
                            amount,
                            destroyed,
                        });
                    }
                }
            }
        }
    }

    /// Remove dead troops and destroyed buildings.
    ///
    /// Returns whether an enemy town hall was among the destroyed.
    fn cleanup(&mut self, events: &mut TickEvents) -> bool {
        for id in self.troops.sorted_ids() {
            if self.troops.get(id).is_some_and(Troop::is_dead) {
                self.troops.remove(id);
                events.troops_killed.push(id);
            }
        }

        let mut town_hall_destroyed = false;
        for id in self.buildings.sorted_ids() {
            if !self.buildings.get(id).is_some_and(Building::is_destroyed) {
                continue;
            }
            let Some(building) = self.buildings.remove(id) else {
                continue;
            };
            self.grid.remove(id);
            if building.is_enemy && building.kind == BuildingKind::TownHall {
                town_hall_destroyed = true;
            }
            debug!(id, kind = ?building.kind, "Building destroyed");
            events.buildings_destroyed.push(BuildingDestroyed {
                id,
                kind: building.kind,
                is_enemy: building.is_enemy,
            });
        }
        town_hall_destroyed
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_mode(&self, expected: GameMode) -> Result<()> {
        if self.mode == expected {
            Ok(())
        } else {
            warn!(?expected, actual = ?self.mode, "Rejected command in wrong mode");
            Err(GameError::WrongMode {
                expected,
                actual: self.mode,
            })
        }
    }

    /// First player barracks in id order; all training goes there.
    fn training_barracks(&self) -> Option<EntityId> {
        self.buildings
            .iter_sorted()
            .find(|b| !b.is_enemy && b.training().is_some())
            .map(|b| b.id)
    }

    fn spawn_building(&mut self, kind: BuildingKind, x: i32, z: i32, is_enemy: bool) -> Option<EntityId> {
        let data = self.config.buildings.get(kind);
        if !self.grid.can_place(x, z, data.size) {
            return None;
        }
        let position = self.grid.cell_to_world(x, z, data.size);
        let id = self
            .buildings
            .insert_with(|id| Building::from_data(id, kind, data, is_enemy, (x, z), position));
        self.grid.place(id, x, z, data.size);
        Some(id)
    }

    fn restore_home_base(&mut self) {
        for entry in self.home_layout.clone() {
            if self.spawn_building(entry.kind, entry.x, entry.z, false).is_none() {
                warn!(?entry, "Home building does not fit; skipped");
            }
        }
    }

    fn clear_field(&mut self) {
        self.troops.clear();
        self.projectiles.clear();
        self.buildings.clear();
        self.grid.clear();
    }

    fn target_state(&self, target: TargetRef) -> Option<TargetState> {
        match target {
            TargetRef::Building(id) => self.buildings.get(id).map(|b| TargetState {
                position: b.position,
                alive: !b.is_destroyed(),
            }),
            TargetRef::Troop(id) => self.troops.get(id).map(|t| TargetState {
                position: t.position,
                alive: !t.is_dead(),
            }),
        }
    }

    /// Apply damage; `None` if the target no longer exists.
    fn apply_damage(&mut self, target: TargetRef, amount: u32) -> Option<bool> {
        match target {
            TargetRef::Building(id) => self.buildings.get_mut(id).map(|b| b.take_damage(amount)),
            TargetRef::Troop(id) => self.troops.get_mut(id).map(|t| t.take_damage(amount)),
        }
    }

    fn launch(&mut self, request: SpawnRequest, events: &mut TickEvents) {
        let Some(target) = self.target_state(request.target) else {
            return;
        };
        let mut projectile = ProjectileSim::launch(&request, target.position, &self.config.projectiles);
        self.projectiles.insert_with(|id| {
            projectile.id = id;
            projectile
        });
        events.projectiles_spawned.push(request);
    }

    #[cfg(feature = "debug-validation")]
    fn assert_grid_consistent(&self) {
        let mut expected = 0usize;
        for building in self.buildings.iter_sorted() {
            let size = i32::try_from(building.size).unwrap_or(0);
            for dz in 0..size {
                for dx in 0..size {
                    debug_assert_eq!(
                        self.grid.occupant(building.cell_x + dx, building.cell_z + dz),
                        Some(building.id),
                        "grid cell does not map to its building"
                    );
                }
            }
            expected += (building.size as usize) * (building.size as usize);
        }
        debug_assert_eq!(self.grid.occupied_count(), expected, "grid holds stale cells");
    }

    // ------------------------------------------------------------------
    // State hash and snapshots
    // ------------------------------------------------------------------

    /// Hash of the simulation state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.clock_ms.hash(&mut hasher);
        self.mode.hash(&mut hasher);
        self.economy.gold().hash(&mut hasher);
        self.economy.elixir().hash(&mut hasher);
        for kind in TroopKind::ALL {
            self.economy.trained(kind).hash(&mut hasher);
        }

        self.buildings.len().hash(&mut hasher);
        for b in self.buildings.iter_sorted() {
            b.id.hash(&mut hasher);
            b.kind.hash(&mut hasher);
            b.health.current.hash(&mut hasher);
            b.position.hash(&mut hasher);
            if let Some(tower) = b.tower() {
                tower.target.hash(&mut hasher);
                tower.last_attack_ms.hash(&mut hasher);
            }
            if let Some(queues) = b.training() {
                for kind in TroopKind::ALL {
                    queues.queued(kind).hash(&mut hasher);
                    queues.progress(kind).elapsed_ms.hash(&mut hasher);
                }
            }
        }

        self.troops.len().hash(&mut hasher);
        for t in self.troops.iter_sorted() {
            t.id.hash(&mut hasher);
            t.kind.hash(&mut hasher);
            t.health.current.hash(&mut hasher);
            t.position.hash(&mut hasher);
            t.target.hash(&mut hasher);
            t.last_attack_ms.hash(&mut hasher);
            t.support().hash(&mut hasher);
        }

        self.projectiles.len().hash(&mut hasher);
        for p in self.projectiles.iter_sorted() {
            p.id.hash(&mut hasher);
            p.target.hash(&mut hasher);
            p.position.hash(&mut hasher);
        }

        if let Some(battle) = &self.battle {
            battle.time_remaining_ms().hash(&mut hasher);
            battle.deployed_cost().hash(&mut hasher);
            battle.is_ended().hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the whole session.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Rebuild a session from [`snapshot`](Self::snapshot) bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| GameError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    fn point(x: i32, z: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, z)
    }

    #[test]
    fn test_entity_storage_ids_increase() {
        let mut storage: EntityStorage<&str> = EntityStorage::new();
        let a = storage.insert_with(|_| "a");
        let b = storage.insert_with(|_| "b");
        storage.clear();
        let c = storage.insert_with(|_| "c");
        assert!(a < b && b < c);
        assert_eq!(storage.sorted_ids(), vec![c]);
        assert!(!storage.contains(a));
    }

    #[test]
    fn test_new_session_has_town_hall() {
        let session = GameSession::default();
        assert_eq!(session.mode(), GameMode::Home);
        assert_eq!(session.gold(), 500);
        assert_eq!(session.elixir(), 200);
        let buildings: Vec<_> = session.buildings().collect();
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].kind, BuildingKind::TownHall);
        assert_eq!(buildings[0].position, Vec2Fixed::ZERO);
        assert_eq!(session.grid().occupied_count(), 4);
    }

    #[test]
    fn test_place_building_rejections_leave_state_unchanged() {
        let mut session = GameSession::default();

        assert!(matches!(
            session.place_building(BuildingKind::TownHall, 0, 0),
            Err(GameError::NotBuildable(BuildingKind::TownHall))
        ));
        assert!(matches!(
            session.place_building(BuildingKind::Mine, 10, 10),
            Err(GameError::InvalidPlacement { .. })
        ));
        assert!(matches!(
            session.place_building(BuildingKind::Mine, 20, 0),
            Err(GameError::InvalidPlacement { .. })
        ));
        assert_eq!(session.gold(), 500);
        assert_eq!(session.home_layout().len(), 1);
    }

    #[test]
    fn test_place_building_short_of_gold() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Barracks, 0, 0).unwrap();
        session.place_building(BuildingKind::Barracks, 1, 0).unwrap();
        let err = session.place_building(BuildingKind::ArcherTower, 2, 0).unwrap_err();
        assert!(matches!(err, GameError::InsufficientResources { resource: Resource::Gold, .. }));
        assert!(session.grid().can_place(2, 0, 1));
    }

    #[test]
    fn test_place_building_at_world_point() {
        let mut session = GameSession::default();
        let id = session
            .place_building_at(BuildingKind::Mine, point(-19, -19))
            .unwrap();
        assert_eq!(session.grid().occupant(0, 0), Some(id));
        assert_eq!(session.home_layout()[1], LayoutEntry::new(BuildingKind::Mine, 0, 0));
    }

    #[test]
    fn test_preview_uses_footprint() {
        let session = GameSession::default();
        let preview = session.preview(BuildingKind::Mine, point(1, 1));
        assert!(!preview.is_valid);
        let preview = session.preview(BuildingKind::Mine, point(5, 5));
        assert!(preview.is_valid);
    }

    #[test]
    fn test_train_requires_barracks_and_elixir() {
        let mut session = GameSession::default();
        assert!(matches!(session.train_troop(TroopKind::Bear), Err(GameError::NoBarracks)));
        assert_eq!(session.elixir(), 200);

        session.place_building(BuildingKind::Barracks, 0, 0).unwrap();
        for _ in 0..4 {
            session.train_troop(TroopKind::Penguin).unwrap();
        }
        assert_eq!(session.elixir(), 0);
        assert!(matches!(
            session.train_troop(TroopKind::Rabbit),
            Err(GameError::InsufficientResources { resource: Resource::Elixir, .. })
        ));
    }

    #[test]
    fn test_training_completes_in_home_mode() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Barracks, 0, 0).unwrap();
        session.train_troop(TroopKind::Bear).unwrap();

        session.tick(1500);
        assert_eq!(session.training_progress(TroopKind::Bear).elapsed_ms, 1500);
        let events = session.tick(1500);
        assert_eq!(events.troops_trained.len(), 1);
        assert_eq!(session.trained_troops(TroopKind::Bear), 1);
    }

    #[test]
    fn test_deploy_requires_attack_and_inventory() {
        let mut session = GameSession::default();
        assert!(matches!(
            session.deploy_troop(TroopKind::Bear, point(0, 0)),
            Err(GameError::WrongMode { expected: GameMode::Attack, .. })
        ));

        session.start_attack_on(0).unwrap();
        assert!(matches!(
            session.deploy_troop(TroopKind::Bear, point(0, 0)),
            Err(GameError::NoTrainedTroops(TroopKind::Bear))
        ));
        assert_eq!(session.battle().unwrap().deployed_cost(), 0);
    }

    #[test]
    fn test_deploy_off_battlefield_is_rejected() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Barracks, 0, 0).unwrap();
        session.train_troop(TroopKind::Bear).unwrap();
        session.tick(3000);
        session.start_attack_on(0).unwrap();

        assert!(matches!(
            session.deploy_troop(TroopKind::Bear, point(50_000, 0)),
            Err(GameError::OutOfBounds { .. })
        ));
        assert_eq!(session.trained_troops(TroopKind::Bear), 1);
        assert_eq!(session.battle().unwrap().deployed_cost(), 0);

        session.tick(16);
        assert_eq!(session.troops().count(), 0);
        assert!(session.is_battle_running());
    }

    #[test]
    fn test_start_attack_builds_enemy_base() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Mine, 0, 0).unwrap();
        session.start_attack_on(1).unwrap();

        assert_eq!(session.mode(), GameMode::Attack);
        assert_eq!(session.enemy_building_count(), 8);
        assert!(session.buildings().all(|b| b.is_enemy));
        assert_eq!(session.battle().unwrap().initial_enemy_buildings(), 8);
        assert_eq!(session.battle_time_remaining_ms(), 120_000);
        assert!(matches!(session.start_attack_on(0), Err(GameError::WrongMode { .. })));
        assert!(matches!(
            GameSession::default().start_attack_on(3),
            Err(GameError::UnknownLayout { index: 3, available: 3 })
        ));
    }

    #[test]
    fn test_random_layout_is_seeded() {
        let pick = |seed| {
            let config = GameConfig { seed, ..GameConfig::default() };
            GameSession::new(config).unwrap().start_attack().unwrap()
        };
        assert_eq!(pick(11), pick(11));
        assert!(pick(11) < 3);
    }

    #[test]
    fn test_surrender_then_return_home() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Mine, 0, 0).unwrap();
        session.start_attack_on(0).unwrap();
        assert!(matches!(session.return_home(), Err(GameError::BattleNotEnded)));

        let results = session.surrender().unwrap();
        assert_eq!(results.reason, BattleEndReason::Manual);
        assert_eq!(results.destroyed, 0);
        assert!(matches!(session.surrender(), Err(GameError::BattleOver)));

        let summary = session.return_home().unwrap();
        assert_eq!(summary.results, results);
        assert_eq!(session.mode(), GameMode::Home);
        assert_eq!(session.gold(), 400);
        assert_eq!(session.buildings().count(), 2);
        assert!(session.battle().is_none());
    }

    #[test]
    fn test_ended_battle_freezes() {
        let mut session = GameSession::default();
        session.start_attack_on(0).unwrap();
        session.surrender().unwrap();
        let before = session.state_hash();
        let events = session.tick(1000);
        assert_eq!(events, TickEvents::default());
        assert_eq!(session.battle_time_remaining_ms(), 120_000);
        assert_ne!(session.state_hash(), before, "clock still advances");
    }

    #[test]
    fn test_income_paused_during_battle() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Mine, 0, 0).unwrap();
        session.start_attack_on(0).unwrap();
        let events = session.tick(4000);
        assert!(events.income.is_empty());
        assert_eq!(session.gold(), 400);
    }

    #[test]
    fn test_income_during_battle_when_not_paused() {
        let config = GameConfig {
            pause_income_during_battle: false,
            ..GameConfig::default()
        };
        let mut session = GameSession::new(config).unwrap();
        session.start_attack_on(0).unwrap();
        // Layout 0 has two mines and two barracks on the field
        let events = session.tick(2000);
        assert_eq!(events.income, vec![IncomeEvent { gold: 20, elixir: 12 }]);
    }

    #[test]
    fn test_snapshot_restore_keeps_state() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Barracks, 0, 0).unwrap();
        session.train_troop(TroopKind::Rabbit).unwrap();
        session.tick(700);

        let bytes = session.snapshot().unwrap();
        let mut restored = GameSession::restore(&bytes).unwrap();
        assert_eq!(restored.state_hash(), session.state_hash());

        session.tick(5000);
        restored.tick(5000);
        assert_eq!(restored.state_hash(), session.state_hash());
        assert_eq!(restored.trained_troops(TroopKind::Rabbit), 1);
    }

    #[test]
    fn test_restore_rejects_garbage() {
        assert!(matches!(GameSession::restore(&[1, 2, 3]), Err(GameError::Serialization(_))));
    }

    #[test]
    fn test_tower_shoots_deployed_troop() {
        let mut session = GameSession::default();
        session.place_building(BuildingKind::Barracks, 0, 0).unwrap();
        session.train_troop(TroopKind::Bear).unwrap();
        session.tick(3000);
        session.start_attack_on(0).unwrap();

        // Tower (6, 6) sits at world (-7, -7)
        let bear = session.deploy_troop(TroopKind::Bear, point(-10, -10)).unwrap();
        let events = session.tick(16);
        let shot = events
            .projectiles_spawned
            .iter()
            .find(|s| s.target == TargetRef::Troop(bear))
            .copied()
            .unwrap();
        assert_eq!(shot.damage, 3);
        assert!(session.projectiles().count() >= 1);
        assert!(session.troop(bear).unwrap().position.x > Fixed::from_num(-10));
    }
}
