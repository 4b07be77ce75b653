//! Headless skirmish runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a single game and print its summary as JSON
//! cargo run -p lch_headless -- run --scenario skirmish --seed 3
//!
//! # Record a replay of that game
//! cargo run -p lch_headless -- run --seed 3 --replay game.bin
//!
//! # Run a batch
//! cargo run -p lch_headless -- batch --count 1000 --output results/batch.json
//!
//! # Verify determinism
//! cargo run -p lch_headless -- verify --seed 12345 --runs 5
//!
//! # Dump the scenario's terrain for a front-end
//! cargo run -p lch_headless -- terrain
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lch_core::replay::ReplayLog;
use lch_core::unit::TeamId;
use lch_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    scenario::{Scenario, ScenarioError},
};

#[derive(Parser)]
#[command(name = "lch_headless")]
#[command(about = "Headless Last Chance Heroes skirmish runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game
    Run {
        /// Scenario file, or "skirmish" for the built-in one
        #[arg(short, long)]
        scenario: Option<String>,

        /// Game seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write the summary here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record a bincode replay to this file
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Play many games in parallel
    Batch {
        /// Scenario file, or "skirmish" for the built-in one
        #[arg(short, long)]
        scenario: Option<String>,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Worker threads (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario file, or "skirmish" for the built-in one
        #[arg(short, long)]
        scenario: Option<String>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Print the scenario's non-open terrain as JSON
    Terrain {
        /// Scenario file, or "skirmish" for the built-in one
        #[arg(short, long)]
        scenario: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout is for JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let outcome = match cli.command {
        Commands::Run {
            scenario,
            seed,
            output,
            replay,
        } => cmd_run(scenario.as_deref(), seed, output, replay),
        Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            output,
        } => cmd_batch(scenario.as_deref(), count, parallel, seed, output),
        Commands::Verify {
            scenario,
            seed,
            runs,
        } => cmd_verify(scenario.as_deref(), seed, runs),
        Commands::Terrain { scenario } => cmd_terrain(scenario.as_deref()),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn emit<T: Serialize>(value: &T, output: Option<PathBuf>) -> Result<(), ScenarioError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)?;
            tracing::info!(path = %path.display(), "Wrote results");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Play a single game
fn cmd_run(
    scenario: Option<&str>,
    seed: u64,
    output: Option<PathBuf>,
    replay: Option<PathBuf>,
) -> Result<(), ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    let terrain = scenario.build_terrain()?;
    let mut game = scenario.new_game(&terrain, seed)?;

    let summary = match replay {
        Some(path) => {
            let mut log = ReplayLog::new(
                seed,
                terrain.content_hash(),
                game.roster().content_hash(),
                game.snapshots(),
            );
            let summary = game.run_observed(&mut log)?;
            std::fs::write(&path, log.to_bytes()?)?;
            tracing::info!(path = %path.display(), frames = log.frames.len(), "Wrote replay");
            summary
        }
        None => game.run()?,
    };

    emit(&summary, output)
}

/// Play a batch of games
fn cmd_batch(
    scenario: Option<&str>,
    count: u32,
    parallel: usize,
    seed: u64,
    output: Option<PathBuf>,
) -> Result<(), ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    let config = BatchConfig::new(count)
        .with_seed(seed)
        .with_parallel(parallel);
    let results = run_batch(&scenario, config)?;

    eprintln!(
        "{}: {} games, team one {:.1}%, team two {:.1}%, {} draws",
        results.scenario,
        results.summary.total_games,
        results.summary.win_rate(TeamId::One) * 100.0,
        results.summary.win_rate(TeamId::Two) * 100.0,
        results.summary.draws
    );

    match output {
        Some(path) => {
            results.save(&path)?;
            tracing::info!(path = %path.display(), "Wrote results");
            Ok(())
        }
        None => emit(&results, None),
    }
}

/// Verify determinism by running the same seed several times
fn cmd_verify(scenario: Option<&str>, seed: u64, runs: u32) -> Result<(), ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    tracing::info!(scenario = %scenario.name, seed, runs, "Verifying determinism");

    if verify_determinism(&scenario, seed, runs)? {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Print terrain features
fn cmd_terrain(scenario: Option<&str>) -> Result<(), ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    let terrain = scenario.build_terrain()?;
    emit(&terrain.export(), None)
}
