//! Scenario loading and configuration.
//!
//! A scenario fixes everything about a game except its seed: battlefield
//! size and terrain, turn limit, and both squads with their policies.

use std::path::Path;
use std::sync::Arc;

use lch_core::battlefield::Battlefield;
use lch_core::error::GameError;
use lch_core::game::{deploy, Game, GameConfig};
use lch_core::grid::TerrainGraph;
use lch_core::policy::{DecisionPolicy, PolicySpec};
use lch_core::terrain::TerrainSpec;
use lch_core::unit::UnitProfile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The built-in reference scenario.
pub const SKIRMISH_RON: &str = include_str!("../scenarios/skirmish.ron");

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to write RON.
    #[error("Failed to serialize scenario: {0}")]
    WriteError(#[from] ron::Error),
    /// The scenario describes an impossible game.
    #[error("Invalid scenario: {0}")]
    Game(#[from] GameError),
}

/// One side of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Display name.
    pub name: String,
    /// How the side picks its actions.
    #[serde(default)]
    pub policy: PolicySpec,
    /// Units in deployment order.
    pub units: Vec<UnitProfile>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Battlefield width in squares.
    pub width: i32,
    /// Battlefield height in squares.
    pub height: i32,
    /// Terrain generator.
    #[serde(default)]
    pub terrain: TerrainSpec,
    /// Turn limit, base seed, cache size.
    #[serde(default)]
    pub game: GameConfig,
    /// Deployed down the left edge.
    pub team_one: TeamSetup,
    /// Deployed up the right edge.
    pub team_two: TeamSetup,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Pretty RON text for this scenario.
    pub fn to_ron(&self) -> Result<String, ScenarioError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// The reference forest skirmish.
    pub fn skirmish() -> Result<Self, ScenarioError> {
        Self::from_ron_str(SKIRMISH_RON)
    }

    /// Load `name` as a file path, or the built-in skirmish for `None` or
    /// `"skirmish"`.
    pub fn resolve(name: Option<&str>) -> Result<Self, ScenarioError> {
        match name {
            None | Some("skirmish") => Self::skirmish(),
            Some(path) => Self::load(path),
        }
    }

    /// Generate the terrain graph. Built once and shared by every game of a
    /// batch.
    pub fn build_terrain(&self) -> Result<Arc<TerrainGraph>, ScenarioError> {
        let layout = self.terrain.layout(self.width, self.height);
        let graph = TerrainGraph::from_layout(&layout)?;
        tracing::debug!(
            scenario = %self.name,
            impassable = layout.impassable_count(),
            hash = graph.content_hash(),
            "Terrain built"
        );
        Ok(Arc::new(graph))
    }

    /// Set up a game on `terrain` with the given seed. Each game gets its
    /// own battlefield caches.
    pub fn new_game(&self, terrain: &Arc<TerrainGraph>, seed: u64) -> Result<Game, ScenarioError> {
        let battlefield = Battlefield::from_terrain(Arc::clone(terrain));
        let roster = deploy(
            &battlefield,
            [&self.team_one.name, &self.team_two.name],
            [&self.team_one.units, &self.team_two.units],
        )?;
        let policies: [Box<dyn DecisionPolicy>; 2] = [
            self.team_one.policy.build(seed),
            self.team_two.policy.build(seed),
        ];
        let config = self.game.with_seed(seed);
        Ok(Game::new(battlefield, roster, policies, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lch_core::terrain::ForestConfig;

    #[test]
    fn test_builtin_skirmish_parses() {
        let scenario = Scenario::skirmish().unwrap();
        assert_eq!(scenario.width, 20);
        assert_eq!(scenario.height, 12);
        assert_eq!(scenario.team_one.units.len(), 3);
        assert_eq!(scenario.team_two.units.len(), 3);
        assert_eq!(scenario.game.max_turns, 12);
        assert!(matches!(scenario.terrain, TerrainSpec::Forest(ForestConfig { seed: 1, .. })));
        assert!(matches!(scenario.team_two.policy, PolicySpec::Random { seed: 2 }));
    }

    #[test]
    fn test_ron_round_trip() {
        let scenario = Scenario::skirmish().unwrap();
        let text = scenario.to_ron().unwrap();
        assert_eq!(Scenario::from_ron_str(&text).unwrap(), scenario);
    }

    #[test]
    fn test_new_game_deploys_both_squads() {
        let scenario = Scenario::skirmish().unwrap();
        let terrain = scenario.build_terrain().unwrap();
        let game = scenario.new_game(&terrain, 3).unwrap();
        assert_eq!(game.roster().len(), 6);
        assert_eq!(game.config().seed, 3);
        assert_eq!(game.battlefield().content_hash(), terrain.content_hash());
    }

    #[test]
    fn test_oversized_squad_rejected() {
        let mut scenario = Scenario::skirmish().unwrap();
        scenario.height = 2;
        let terrain = scenario.build_terrain().unwrap();
        assert!(matches!(
            scenario.new_game(&terrain, 0),
            Err(ScenarioError::Game(GameError::OutOfBounds(_)))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load("/definitely/not/here.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
