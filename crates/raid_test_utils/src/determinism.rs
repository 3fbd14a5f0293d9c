//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a session produces identical
//! results given identical configuration, commands and tick deltas.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the core guards against:
//!
//! - **Floating-point math**: we use fixed-point arithmetic via
//!   [`raid_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Registries always iterate in sorted entity ID order.
//!
//! - **System randomness and wall-clock time**: enemy layout choice uses a
//!   seeded RNG and every timer runs on the simulated clock.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual behaviors (targeting, training, scoring)
//! 2. **Property tests**: random intent scripts must replay identically
//! 3. **Integration tests**: full raids are reproducible
//! 4. **Parallel tests**: running N sessions on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use raid_core::simulation::GameSession;

use crate::fixtures::FRAME_MS;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic session).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Session is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a session twice from the same setup and compare final hashes.
///
/// # Example
///
/// ```
/// use raid_test_utils::determinism::verify_session_determinism;
/// use raid_test_utils::fixtures::session_with_barracks;
///
/// assert!(verify_session_determinism(session_with_barracks, 500));
/// ```
pub fn verify_session_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> GameSession,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |session| {
            session.tick(FRAME_MS);
        },
        GameSession::state_hash,
    )
    .is_deterministic
}

/// Run N sessions on scoped threads and collect their final hashes.
///
/// Catches anything that only shows up under thread scheduling or memory
/// layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_sessions<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> GameSession + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut session = setup_fn();
                    for _ in 0..num_ticks {
                        session.tick(FRAME_MS);
                    }
                    session.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match throughout, `Some(tick)` if they diverge at
/// that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> GameSession,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        a.tick(FRAME_MS);
        b.tick(FRAME_MS);
        if a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot taken mid-run restores to an identical session
/// that keeps evolving identically.
pub fn verify_snapshot_determinism<F>(setup_fn: F, before: u64, after: u64) -> bool
where
    F: Fn() -> GameSession,
{
    let mut session = setup_fn();
    for _ in 0..before {
        session.tick(FRAME_MS);
    }

    let Ok(bytes) = session.snapshot() else {
        return false;
    };
    let Ok(mut restored) = GameSession::restore(&bytes) else {
        return false;
    };
    if restored.state_hash() != session.state_hash() {
        return false;
    }

    for _ in 0..after {
        session.tick(FRAME_MS);
        restored.tick(FRAME_MS);
    }
    restored.state_hash() == session.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for session scripts.
///
/// These generate random but reproducible player intents for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use raid_core::components::{BuildingKind, TroopKind};
    use raid_core::math::Vec2Fixed;
    use raid_core::simulation::{GameSession, TickEvents};

    /// A player intent or a frame of simulated time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Intent {
        /// Place a building at a cell.
        Place(BuildingKind, i32, i32),
        /// Queue a troop.
        Train(TroopKind),
        /// Raid an enemy layout.
        Attack(usize),
        /// Deploy a trained troop at a world point.
        Deploy(TroopKind, i32, i32),
        /// End the raid early.
        Surrender,
        /// Collect loot and go home.
        ReturnHome,
        /// Advance the clock.
        Tick(u64),
    }

    impl Intent {
        /// Apply to a session. Rejected commands are ignored, as a UI would.
        pub fn apply(self, session: &mut GameSession) -> TickEvents {
            match self {
                Self::Place(kind, x, z) => {
                    let _ = session.place_building(kind, x, z);
                }
                Self::Train(kind) => {
                    let _ = session.train_troop(kind);
                }
                Self::Attack(layout) => {
                    let _ = session.start_attack_on(layout);
                }
                Self::Deploy(kind, x, z) => {
                    let _ = session.deploy_troop(kind, Vec2Fixed::from_ints(x, z));
                }
                Self::Surrender => {
                    let _ = session.surrender();
                }
                Self::ReturnHome => {
                    let _ = session.return_home();
                }
                Self::Tick(delta_ms) => return session.tick(delta_ms),
            }
            TickEvents::default()
        }
    }

    /// Any building kind, including the unbuildable town hall.
    pub fn arb_building_kind() -> impl Strategy<Value = BuildingKind> {
        prop::sample::select(BuildingKind::ALL.to_vec())
    }

    /// Any troop kind.
    pub fn arb_troop_kind() -> impl Strategy<Value = TroopKind> {
        prop::sample::select(TroopKind::ALL.to_vec())
    }

    /// A cell, sometimes just off the 20x20 grid.
    pub fn arb_cell() -> impl Strategy<Value = (i32, i32)> {
        (-2i32..22, -2i32..22)
    }

    /// A tick delta, from a single frame up to a few seconds.
    pub fn arb_delta_ms() -> impl Strategy<Value = u64> {
        prop_oneof![
            4 => Just(16u64),
            2 => 1u64..500,
            1 => 500u64..5000,
        ]
    }

    /// Any intent, weighted towards time passing.
    pub fn arb_intent() -> impl Strategy<Value = Intent> {
        prop_oneof![
            6 => arb_delta_ms().prop_map(Intent::Tick),
            3 => (arb_building_kind(), arb_cell()).prop_map(|(k, (x, z))| Intent::Place(k, x, z)),
            3 => arb_troop_kind().prop_map(Intent::Train),
            1 => (0usize..4).prop_map(Intent::Attack),
            3 => (arb_troop_kind(), -20i32..20, -20i32..20).prop_map(|(k, x, z)| Intent::Deploy(k, x, z)),
            1 => Just(Intent::Surrender),
            1 => Just(Intent::ReturnHome),
        ]
    }

    /// A script of intents.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<Intent>> {
        prop::collection::vec(arb_intent(), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{raid_session, session_with_barracks};
    use raid_core::components::TroopKind;

    #[test]
    fn test_identical_setup_matches() {
        let result = verify_determinism(3, 200, session_with_barracks, |s| {
            s.tick(FRAME_MS);
        }, GameSession::state_hash);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_raid_has_no_divergence() {
        let setup = || {
            let mut session = raid_session(0, &[(TroopKind::Bear, 2)]);
            session
                .deploy_troop(TroopKind::Bear, crate::fixtures::point(-15, 0))
                .unwrap();
            session
        };
        assert_eq!(find_first_divergence(setup, 300), None);
        assert!(verify_snapshot_determinism(setup, 100, 200));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&42u64), compute_hash(&42u64));
        assert_ne!(compute_hash(&1u64), compute_hash(&2u64));
    }
}
