//! Batch game runner.
//!
//! Runs many games of one scenario in parallel with rayon. The terrain is
//! generated once and shared read-only; every game gets its own
//! battlefield caches, roster and dice, seeded `seed_start + i`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use lch_core::game::{GameResult, GameSummary};
use lch_core::grid::TerrainGraph;
use lch_core::unit::TeamId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run.
    pub game_count: u32,
    /// Seed of the first game.
    pub seed_start: u64,
    /// Worker threads (0 = rayon default).
    pub parallel_games: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            seed_start: 0,
            parallel_games: 0,
        }
    }
}

impl BatchConfig {
    /// Config for `game_count` games.
    #[must_use]
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set worker threads.
    #[must_use]
    pub fn with_parallel(mut self, threads: usize) -> Self {
        self.parallel_games = threads;
        self
    }
}

/// Error during one game of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games completed.
    pub total_games: u32,
    /// Wins per team.
    pub wins: [u32; 2],
    /// Drawn games.
    pub draws: u32,
    /// Mean turns per game.
    pub mean_turns: f64,
    /// Mean actions per game.
    pub mean_actions: f64,
}

impl BatchSummary {
    /// Tally finished games.
    #[must_use]
    pub fn from_games(games: &[GameSummary]) -> Self {
        let mut summary = Self {
            total_games: games.len() as u32,
            ..Self::default()
        };
        if games.is_empty() {
            return summary;
        }
        for game in games {
            match game.result {
                GameResult::Victory(team) => summary.wins[team.index()] += 1,
                GameResult::Draw => summary.draws += 1,
            }
        }
        let n = games.len() as f64;
        summary.mean_turns = games.iter().map(|g| f64::from(g.turns)).sum::<f64>() / n;
        summary.mean_actions = games.iter().map(|g| g.actions as f64).sum::<f64>() / n;
        summary
    }

    /// Fraction of completed games won by `team`.
    #[must_use]
    pub fn win_rate(&self, team: TeamId) -> f64 {
        if self.total_games == 0 {
            return 0.0;
        }
        f64::from(self.wins[team.index()]) / f64::from(self.total_games)
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name.
    pub scenario: String,
    /// Content hash of the shared terrain.
    pub terrain_hash: u64,
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-game summaries in seed order.
    pub games: Vec<GameSummary>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Play one game of `scenario` on prebuilt terrain.
pub fn run_single_game(
    scenario: &Scenario,
    terrain: &Arc<TerrainGraph>,
    seed: u64,
) -> Result<GameSummary, ScenarioError> {
    let mut game = scenario.new_game(terrain, seed)?;
    Ok(game.run()?)
}

/// Run a batch of games.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let terrain = scenario.build_terrain()?;

    info!(
        scenario = %scenario.name,
        games = config.game_count,
        seed_start = config.seed_start,
        "Starting batch run"
    );

    let play = || -> Vec<Result<GameSummary, BatchError>> {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                run_single_game(scenario, &terrain, seed).map_err(|e| {
                    warn!(game = i, seed, error = %e, "Game failed");
                    BatchError {
                        game_index: i,
                        seed,
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    };

    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games)
            .build()
        {
            Ok(pool) => pool.install(play),
            Err(e) => {
                warn!(error = %e, "Falling back to the global thread pool");
                play()
            }
        }
    } else {
        play()
    };

    let mut games = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(game) => games.push(game),
            Err(e) => errors.push(e),
        }
    }

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        games = games.len(),
        errors = errors.len(),
        duration_seconds,
        "Batch complete"
    );
    debug!(?summary, "Batch summary");

    Ok(BatchResults {
        scenario: scenario.name.clone(),
        terrain_hash: terrain.content_hash(),
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Play the same seed `runs` times and compare final state hashes.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> Result<bool, ScenarioError> {
    let terrain = scenario.build_terrain()?;
    let mut first = None;
    for run in 0..runs {
        let hash = run_single_game(scenario, &terrain, seed)?.state_hash;
        debug!(run, hash, "Verification run");
        match first {
            None => first = Some(hash),
            Some(expected) if expected != hash => return Ok(false),
            Some(_) => {}
        }
    }
    Ok(true)
}
