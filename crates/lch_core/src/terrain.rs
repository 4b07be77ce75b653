//! Terrain classification and seeded battlefield layouts.
//!
//! A [`TerrainCell`] carries the two per-square scales the graph is built
//! from. [`TerrainSpec`] is the serializable description of a layout and
//! turns into a concrete [`TerrainLayout`] for a given size.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::math::{option_fixed_serde, Fixed};

/// Movement and visibility scale of a single square.
///
/// `None` marks the square impassable (move) or fully opaque (visibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerrainCell {
    /// Cost multiplier for stepping through the square, at least 1.
    #[serde(with = "option_fixed_serde")]
    pub move_scale: Option<Fixed>,
    /// Obstruction contributed by the square to sightlines crossing it.
    #[serde(with = "option_fixed_serde")]
    pub visibility_scale: Option<Fixed>,
}

impl TerrainCell {
    /// Open ground: normal movement, no obstruction.
    pub const OPEN: Self = Self {
        move_scale: Some(Fixed::ONE),
        visibility_scale: Some(Fixed::ZERO),
    };

    /// A tree: impassable and blocks sight completely.
    pub const TREE: Self = Self {
        move_scale: None,
        visibility_scale: None,
    };

    /// Scrub: slow going and partially obstructs sight.
    pub const SCRUB: Self = Self {
        move_scale: Some(Fixed::const_from_int(2)),
        visibility_scale: Some(Fixed::ONE),
    };

    /// Build a cell from plain scales, where any negative value is the
    /// impassable/opaque sentinel.
    #[must_use]
    pub fn from_scales(move_scale: f64, visibility_scale: f64) -> Self {
        let scale = |v: f64| (v >= 0.0).then(|| Fixed::from_num(v));
        Self {
            move_scale: scale(move_scale),
            visibility_scale: scale(visibility_scale),
        }
    }

    /// Whether units may stand on or move through this square.
    #[must_use]
    pub const fn is_passable(&self) -> bool {
        self.move_scale.is_some()
    }

    /// Whether this square blocks every sightline through it.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.visibility_scale.is_none()
    }
}

impl Default for TerrainCell {
    fn default() -> Self {
        Self::OPEN
    }
}

/// Parameters for a seeded forest layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Fewest trees to place.
    pub min_trees: u32,
    /// Most trees to place.
    pub max_trees: u32,
    /// Chance for each remaining interior square to be scrub (0.0 - 1.0).
    pub scrub_density: f64,
    /// Random seed for deterministic generation.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            min_trees: 10,
            max_trees: 20,
            scrub_density: 0.0,
            seed: 0,
        }
    }
}

impl ForestConfig {
    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the scrub density.
    #[must_use]
    pub const fn with_scrub_density(mut self, density: f64) -> Self {
        self.scrub_density = density;
        self
    }
}

/// Serializable description of a battlefield's terrain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TerrainSpec {
    /// Nothing but open ground.
    #[default]
    Open,
    /// Trees and scrub scattered over open ground.
    Forest(ForestConfig),
}

impl TerrainSpec {
    /// Lay out terrain for a `width` x `height` battlefield.
    ///
    /// Non-positive dimensions produce an empty layout; building a graph from
    /// it reports the dimension error.
    #[must_use]
    pub fn layout(&self, width: i32, height: i32) -> TerrainLayout {
        let mut layout = TerrainLayout::open(width, height);
        if let Self::Forest(config) = self {
            plant_forest(&mut layout, config);
        }
        layout
    }
}

/// A concrete grid of terrain cells in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainLayout {
    width: i32,
    height: i32,
    cells: Vec<TerrainCell>,
}

impl TerrainLayout {
    /// An all-open layout.
    #[must_use]
    pub fn open(width: i32, height: i32) -> Self {
        let count = usize::try_from(width.max(0)).unwrap_or(0)
            * usize::try_from(height.max(0)).unwrap_or(0);
        Self {
            width,
            height,
            cells: vec![TerrainCell::OPEN; count],
        }
    }

    /// Layout width.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Layout height.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    /// Cell at `(x, y)`, open ground outside the layout.
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> TerrainCell {
        self.index(x, y)
            .map_or(TerrainCell::OPEN, |i| self.cells[i])
    }

    /// Overwrite the cell at `(x, y)`. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, x: i32, y: i32, cell: TerrainCell) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Number of impassable squares.
    #[must_use]
    pub fn impassable_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_passable()).count()
    }
}

/// Scatter trees (and optionally scrub) over the interior, keeping a one
/// square margin clear for deployment.
fn plant_forest(layout: &mut TerrainLayout, config: &ForestConfig) {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let (width, height) = (layout.width, layout.height);
    let mut interior: Vec<(i32, i32)> = (1..height - 1)
        .flat_map(|y| (1..width - 1).map(move |x| (x, y)))
        .collect();
    if interior.is_empty() {
        return;
    }

    let low = config.min_trees.min(config.max_trees);
    let wanted = rng.gen_range(low..=config.max_trees) as usize;
    let trees = wanted.min(interior.len());

    let (chosen, rest) = interior.partial_shuffle(&mut rng, trees);
    for &(x, y) in chosen.iter() {
        layout.set_cell(x, y, TerrainCell::TREE);
    }

    let density = config.scrub_density.clamp(0.0, 1.0);
    if density > 0.0 {
        for &(x, y) in rest.iter() {
            if rng.gen_bool(density) {
                layout.set_cell(x, y, TerrainCell::SCRUB);
            }
        }
    }

    tracing::debug!(
        trees,
        seed = config.seed,
        width,
        height,
        "Planted forest"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scales_sentinel() {
        let cell = TerrainCell::from_scales(-1.0, -1.0);
        assert_eq!(cell, TerrainCell::TREE);
        assert!(!cell.is_passable());
        assert!(cell.is_opaque());

        let cell = TerrainCell::from_scales(1.0, 0.0);
        assert_eq!(cell, TerrainCell::OPEN);
    }

    #[test]
    fn test_open_layout() {
        let layout = TerrainSpec::Open.layout(6, 4);
        assert_eq!(layout.impassable_count(), 0);
        assert_eq!(layout.cell(5, 3), TerrainCell::OPEN);
    }

    #[test]
    fn test_forest_tree_count_and_margin() {
        let spec = TerrainSpec::Forest(ForestConfig::default().with_seed(7));
        let layout = spec.layout(20, 12);
        let trees = layout.impassable_count();
        assert!((10..=20).contains(&trees), "got {trees} trees");

        for y in 0..12 {
            assert!(layout.cell(0, y).is_passable());
            assert!(layout.cell(19, y).is_passable());
        }
        for x in 0..20 {
            assert!(layout.cell(x, 0).is_passable());
            assert!(layout.cell(x, 11).is_passable());
        }
    }

    #[test]
    fn test_forest_determinism() {
        let config = ForestConfig::default().with_seed(42).with_scrub_density(0.1);
        let a = TerrainSpec::Forest(config.clone()).layout(25, 17);
        let b = TerrainSpec::Forest(config).layout(25, 17);
        assert_eq!(a, b);
    }

    #[test]
    fn test_forest_tiny_battlefield() {
        // No interior squares: nothing to plant
        let layout = TerrainSpec::Forest(ForestConfig::default()).layout(2, 2);
        assert_eq!(layout.impassable_count(), 0);
    }

    #[test]
    fn test_spec_ron_roundtrip() {
        let spec = TerrainSpec::Forest(ForestConfig::default().with_seed(3));
        let text = ron::to_string(&spec).unwrap();
        let back: TerrainSpec = ron::from_str(&text).unwrap();
        assert_eq!(spec, back);
    }
}
