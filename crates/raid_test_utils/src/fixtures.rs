//! Test fixtures and helpers.
//!
//! Pre-built sessions for consistent testing: a fresh home base, a home
//! base with a barracks, a stocked army, and a raid ready to deploy.

use raid_core::battle::BattleResults;
use raid_core::components::{BuildingKind, TroopKind};
use raid_core::data::GameConfig;
use raid_core::math::Vec2Fixed;
use raid_core::simulation::GameSession;

/// Frame length used by the fixtures, roughly 60 fps.
pub const FRAME_MS: u64 = 16;

/// World point from integer coordinates.
#[must_use]
pub fn point(x: i32, z: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, z)
}

/// Default config with deep pockets, so fixtures never run dry.
#[must_use]
pub fn rich_config() -> GameConfig {
    GameConfig {
        starting_gold: 5000,
        starting_elixir: 5000,
        ..GameConfig::default()
    }
}

/// Fresh session on the default config.
#[must_use]
pub fn home_session() -> GameSession {
    GameSession::default()
}

/// Rich session with one barracks at cell (0, 0).
///
/// # Panics
///
/// Panics if the barracks cannot be placed.
#[must_use]
pub fn session_with_barracks() -> GameSession {
    let mut session = GameSession::new(rich_config()).expect("rich config is valid");
    session
        .place_building(BuildingKind::Barracks, 0, 0)
        .expect("corner is free");
    session
}

/// Rich session holding the requested trained troops.
///
/// Training runs in 100 ms steps until the inventory is full. Troops of
/// different kinds that finish on the same step are lost, so pick armies
/// whose completion times do not collide.
///
/// # Panics
///
/// Panics if training fails or takes unreasonably long.
#[must_use]
pub fn trained_session(army: &[(TroopKind, u32)]) -> GameSession {
    let mut session = session_with_barracks();
    for &(kind, count) in army {
        for _ in 0..count {
            session.train_troop(kind).expect("training accepted");
        }
    }

    let ready = |s: &GameSession| army.iter().all(|&(kind, count)| s.trained_troops(kind) >= count);
    for _ in 0..100_000 {
        if ready(&session) {
            return session;
        }
        session.tick(100);
    }
    panic!("army never finished training");
}

/// Trained army already in attack mode against `layout`.
///
/// # Panics
///
/// Panics if training or the attack fails.
#[must_use]
pub fn raid_session(layout: usize, army: &[(TroopKind, u32)]) -> GameSession {
    let mut session = trained_session(army);
    session.start_attack_on(layout).expect("layout exists");
    session
}

/// Tick in [`FRAME_MS`] steps until the raid ends or `max_ticks` pass.
pub fn run_until_battle_ends(session: &mut GameSession, max_ticks: u64) -> Option<BattleResults> {
    for _ in 0..max_ticks {
        if let Some(results) = session.tick(FRAME_MS).battle_ended {
            return Some(results);
        }
    }
    None
}
