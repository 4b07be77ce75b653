//! # LCH Core
//!
//! Skirmish simulation engine for Last Chance Heroes.
//!
//! Two squads fight turn by turn on a square grid. This crate holds the
//! whole engine and nothing else:
//! - No rendering
//! - No IO
//! - No system randomness (every roll comes from a seeded generator)
//! - Fixed-point path and sightline arithmetic
//!
//! This separation enables:
//! - Headless batch runs for training data
//! - Replay recording through a snapshot hook
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`terrain`] - Terrain cells and generators
//! - [`grid`] - The terrain graph: squares, edges, corner rules
//! - [`sightline`] - Rasterized lines and obstruction
//! - [`pathfinding`] - A* and bounded reachability
//! - [`battlefield`] - Cached spatial queries for one game
//! - [`weapon`], [`unit`] - Static stats and the unit arena
//! - [`combat`] - Hit probabilities and stochastic resolution
//! - [`action`], [`generator`] - Candidate actions and their enumeration
//! - [`policy`] - Decision policies
//! - [`game`] - The turn loop
//! - [`replay`] - Snapshots for external recorders
//! - [`math`] - Fixed-point and probability helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod action;
pub mod battlefield;
pub mod combat;
pub mod error;
pub mod game;
pub mod generator;
pub mod grid;
pub mod math;
pub mod pathfinding;
pub mod policy;
pub mod replay;
pub mod sightline;
pub mod terrain;
pub mod unit;
pub mod weapon;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::action::{Action, ActionKind, ActionTag, SituationalFeatures};
    pub use crate::battlefield::{Battlefield, CacheStats};
    pub use crate::combat::{CombatOutcome, Engagement, ShotContext};
    pub use crate::error::{GameError, Result};
    pub use crate::game::{deploy, Game, GameConfig, GameResult, GameSummary};
    pub use crate::grid::{Position, TerrainGraph};
    pub use crate::math::Fixed;
    pub use crate::pathfinding::Path;
    pub use crate::policy::{
        DecisionPolicy, FeatureWeights, FirstChoicePolicy, PolicySpec, RandomPolicy,
        WeightedPolicy,
    };
    pub use crate::replay::{ReplayLog, TurnObserver, UnitSnapshot};
    pub use crate::sightline::Sightline;
    pub use crate::terrain::{ForestConfig, TerrainCell, TerrainLayout, TerrainSpec};
    pub use crate::unit::{Roster, TeamId, Unit, UnitId, UnitProfile, UnitStatus};
    pub use crate::weapon::{DamageRange, Weapon, WeaponCategory};
}
