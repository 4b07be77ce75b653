//! Headless skirmish runner for training data and CI verification.
//!
//! Loads RON scenarios, plays single games or parallel batches without
//! any front-end, and writes JSON results. Logs go to stderr; stdout is
//! reserved for JSON.
//!
//! # Example
//!
//! ```bash
//! # Play the built-in forest skirmish once
//! cargo run -p lch_headless -- run --seed 7
//!
//! # 1000 games on 8 threads
//! cargo run -p lch_headless -- batch --count 1000 --parallel 8 --output results/batch.json
//!
//! # Check that a seed always plays out the same way
//! cargo run -p lch_headless -- verify --seed 12345 --runs 5
//! ```

pub mod batch;
pub mod scenario;

pub use batch::{run_batch, run_single_game, BatchConfig, BatchResults, BatchSummary};
pub use scenario::{Scenario, ScenarioError, TeamSetup};
