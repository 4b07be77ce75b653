//! Determinism testing utilities.
//!
//! Games must be exactly reproducible from their seed so that training
//! batches can be replayed and audited. Sources of non-determinism:
//!
//! - **Floating-point path costs**: path and sightline arithmetic use
//!   [`lch_core::math::Fixed`]; floats only appear in hit probabilities,
//!   which never feed back into geometry.
//!
//! - **HashMap iteration order**: occupancy sets and caches are only ever
//!   probed, never iterated to make a decision.
//!
//! - **System randomness**: every roll and every random policy draws from
//!   a seeded `ChaCha8Rng`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use lch_core::game::Game;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns played per run.
    pub turns: u32,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic game).
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
                "Game is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare final hashes.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `turns` - Number of steps per run
/// * `setup` - Builds the initial state
/// * `step` - Advances the state by one turn
/// * `hash` - Hashes the state
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    turns: u32,
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
        for _ in 0..turns {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    }
}

/// Play `turns` turns of two identically built games and compare hashes.
///
/// Stops early (without failing) once a game is decided.
///
/// # Panics
///
/// Panics if a turn returns an error.
pub fn verify_game_determinism<F>(setup_fn: F, turns: u32) -> DeterminismResult
where
    F: Fn() -> Game,
{
    verify_determinism(
        2,
        turns,
        setup_fn,
        |game| {
            if game.result().is_none() {
                game.play_turn(&mut ()).expect("turn failed");
            }
        },
        Game::state_hash,
    )
}

/// Play complete games on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a game returns an error or a thread panics.
pub fn run_parallel_games<F>(setup_fn: F, num_games: usize) -> Vec<u64>
where
    F: Fn() -> Game + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup_fn();
                    game.run().expect("game failed").state_hash
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("game thread panicked"))
            .collect()
    })
}

/// Compare two games turn by turn and return the first turn after which
/// their hashes differ.
///
/// # Panics
///
/// Panics if a turn returns an error.
pub fn find_first_divergence<F>(setup_fn: F, turns: u32) -> Option<u32>
where
    F: Fn() -> Game,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for turn in 1..=turns {
        if a.result().is_some() && b.result().is_some() {
            break;
        }
        a.play_turn(&mut ()).expect("turn failed");
        b.play_turn(&mut ()).expect("turn failed");
        if a.state_hash() != b.state_hash() {
            return Some(turn);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for spatial and combat tests.
pub mod strategies {
    use lch_core::grid::Position;
    use lch_core::weapon::{DamageRange, Weapon, WeaponCategory};
    use proptest::prelude::*;

    /// A position inside a `width` x `height` grid.
    pub fn arb_position(width: i32, height: i32) -> impl Strategy<Value = Position> {
        (0..width, 0..height).prop_map(|(x, y)| Position::new(x, y))
    }

    /// Two distinct positions inside a grid.
    pub fn arb_position_pair(
        width: i32,
        height: i32,
    ) -> impl Strategy<Value = (Position, Position)> {
        (arb_position(width, height), arb_position(width, height))
            .prop_filter("distinct endpoints", |(a, b)| a != b)
    }

    /// A well-formed damage range.
    pub fn arb_damage() -> impl Strategy<Value = DamageRange> {
        (0u32..8, 0u32..8).prop_map(|(a, b)| DamageRange::new(a.min(b), a.max(b)))
    }

    /// Any weapon, melee or ranged.
    pub fn arb_weapon() -> impl Strategy<Value = Weapon> {
        let category = prop_oneof![
            Just(WeaponCategory::Assault),
            Just(WeaponCategory::Heavy),
            Just(WeaponCategory::Standard),
        ];
        prop_oneof![
            (1u32..4, arb_damage()).prop_map(|(attacks, damage)| Weapon::melee("Blade", attacks, damage)),
            (category, 1u32..30, 1u32..4, 0u32..3, arb_damage()).prop_map(
                |(category, range, attacks, punch, damage)| {
                    Weapon::ranged("Gun", category, range, attacks, punch, damage)
                }
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::reference_game;

    #[test]
    fn test_verify_determinism_counts() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 7, |n| *n);
        assert_eq!(result.hashes, vec![70, 70, 70]);
        result.assert_deterministic();
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_detects_divergence() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let counter = AtomicU64::new(0);
        let result = verify_determinism(
            2,
            1,
            || counter.fetch_add(1, Ordering::SeqCst),
            |_| {},
            |n| *n,
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_reference_game_is_deterministic() {
        verify_game_determinism(|| reference_game(3), 4).assert_deterministic();
        assert_eq!(find_first_divergence(|| reference_game(3), 4), None);
    }
}
