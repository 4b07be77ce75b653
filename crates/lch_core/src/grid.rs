//! The terrain graph: squares on a fixed grid linked to their eight neighbours.
//!
//! Built once per battlefield and never mutated afterwards. Each link stores
//! the combined cost of moving and of seeing between the two squares, so
//! every later query is a lookup rather than a recomputation.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{GameError, Result};
use crate::math::{option_fixed_serde, Fixed, DIAGONAL_SCALE, ORTHOGONAL_SCALE};
use crate::terrain::{TerrainCell, TerrainLayout};

/// Integer grid coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Neighbour in direction `dir` (index into [`DIRECTIONS`]).
    #[must_use]
    pub const fn step(self, dir: usize) -> Self {
        let (dx, dy) = DIRECTIONS[dir % 8];
        self.offset(dx, dy)
    }

    /// Chebyshev distance (number of king moves).
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// Index into [`DIRECTIONS`] leading from `self` to `other`, if they touch.
    #[must_use]
    pub fn direction_to(self, other: Self) -> Option<usize> {
        let delta = (other.x - self.x, other.y - self.y);
        DIRECTIONS.iter().position(|&d| d == delta)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Neighbour offsets, counter-clockwise from +x. Odd indices are diagonals.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Combined costs of the link between two neighbouring squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Cost of stepping across; `None` if either square is impassable or
    /// the diagonal squeezes past an impassable corner.
    #[serde(with = "option_fixed_serde")]
    pub move_cost: Option<Fixed>,
    /// Obstruction between the two squares; `None` if either is opaque.
    #[serde(with = "option_fixed_serde")]
    pub visibility_cost: Option<Fixed>,
}

/// One grid cell and its links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    /// Where the square is.
    pub position: Position,
    /// Static costs of the square itself.
    pub terrain: TerrainCell,
    /// Links indexed like [`DIRECTIONS`]; `None` at the grid border.
    pub edges: [Option<Edge>; 8],
}

impl Square {
    fn new(position: Position, terrain: TerrainCell) -> Self {
        Self {
            position,
            terrain,
            edges: [None; 8],
        }
    }
}

/// A non-default terrain cell, for front-ends and content hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainFeature {
    /// Where the cell is.
    pub position: Position,
    /// Its costs.
    pub cell: TerrainCell,
}

/// Immutable weighted grid graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainGraph {
    width: i32,
    height: i32,
    /// Squares in row-major order.
    squares: Vec<Square>,
}

impl TerrainGraph {
    /// Build the graph from a terrain classification function.
    ///
    /// Every pair of neighbouring squares is linked once with the averaged
    /// costs of both squares times the orthogonal (0.5) or diagonal (0.707)
    /// scale; an impassable or opaque square makes the whole link so. A
    /// second pass then severs the diagonal move between the two squares
    /// flanking each corner of every impassable square.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidDimensions`] if either dimension is not
    /// positive, or [`GameError::InvalidTerrain`] for a cell with a move
    /// scale below 1 or a negative visibility scale.
    pub fn build<F>(width: i32, height: i32, mut terrain_fn: F) -> Result<Self>
    where
        F: FnMut(i32, i32) -> TerrainCell,
    {
        if width <= 0 || height <= 0 {
            return Err(GameError::InvalidDimensions { width, height });
        }

        let mut squares = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let position = Position::new(x, y);
                let terrain = terrain_fn(x, y);
                validate_cell(position, terrain)?;
                squares.push(Square::new(position, terrain));
            }
        }

        let mut graph = Self {
            width,
            height,
            squares,
        };
        graph.link_neighbours();
        graph.sever_corners();

        #[cfg(feature = "debug-validation")]
        graph.assert_symmetric();

        tracing::debug!(width, height, "Built terrain graph");
        Ok(graph)
    }

    /// Build the graph for a pre-generated layout.
    ///
    /// # Errors
    ///
    /// Same as [`TerrainGraph::build`].
    pub fn from_layout(layout: &TerrainLayout) -> Result<Self> {
        Self::build(layout.width(), layout.height(), |x, y| layout.cell(x, y))
    }

    /// Link each square to its east, north-east, north and north-west
    /// neighbours; the reverse links follow, so every pair is visited once.
    fn link_neighbours(&mut self) {
        for i in 0..self.squares.len() {
            let here = self.squares[i].position;
            for dir in 0..4 {
                let there = here.step(dir);
                let Some(j) = self.index(there) else {
                    continue;
                };
                let scale = if dir % 2 == 1 {
                    DIAGONAL_SCALE
                } else {
                    ORTHOGONAL_SCALE
                };
                let a = self.squares[i].terrain;
                let b = self.squares[j].terrain;
                let edge = Edge {
                    move_cost: combine(a.move_scale, b.move_scale, scale),
                    visibility_cost: combine(a.visibility_scale, b.visibility_scale, scale),
                };
                self.squares[i].edges[dir] = Some(edge);
                self.squares[j].edges[dir + 4] = Some(edge);
            }
        }
    }

    /// For every impassable square, cut the diagonal move between each pair
    /// of its orthogonal neighbours that sit either side of one of its corners.
    fn sever_corners(&mut self) {
        for i in 0..self.squares.len() {
            if self.squares[i].terrain.is_passable() {
                continue;
            }
            let here = self.squares[i].position;
            for dir in (0..8).step_by(2) {
                let p1 = here.step(dir);
                let p2 = here.step(dir + 2);
                let (Some(a), Some(b)) = (self.index(p1), self.index(p2)) else {
                    continue;
                };
                // p1 -> p2 is always the diagonal three steps round from dir
                if let Some(edge) = self.squares[a].edges[(dir + 3) % 8].as_mut() {
                    edge.move_cost = None;
                }
                if let Some(edge) = self.squares[b].edges[(dir + 7) % 8].as_mut() {
                    edge.move_cost = None;
                }
            }
        }
    }

    #[cfg(feature = "debug-validation")]
    fn assert_symmetric(&self) {
        for square in &self.squares {
            for (dir, edge) in square.edges.iter().enumerate() {
                if let Some(edge) = edge {
                    let back = self.square(square.position.step(dir)).edges[(dir + 4) % 8];
                    assert_eq!(Some(*edge), back, "asymmetric link at {}", square.position);
                }
            }
        }
    }

    /// Grid width in squares.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in squares.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, pos: Position) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    /// Check if a position is within the grid.
    #[must_use]
    pub const fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Square at `pos`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, pos: Position) -> Option<&Square> {
        self.index(pos).map(|i| &self.squares[i])
    }

    /// Square at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is outside the grid; callers validate positions at
    /// configuration time, so reaching this is a bug.
    #[must_use]
    pub fn square(&self, pos: Position) -> &Square {
        match self.get(pos) {
            Some(square) => square,
            None => panic!(
                "position {pos} outside {}x{} battlefield",
                self.width, self.height
            ),
        }
    }

    /// Whether a unit may stand on `pos`.
    #[must_use]
    pub fn is_passable(&self, pos: Position) -> bool {
        self.get(pos).is_some_and(|s| s.terrain.is_passable())
    }

    /// Link between two neighbouring squares, `None` if they do not touch.
    #[must_use]
    pub fn edge(&self, from: Position, to: Position) -> Option<Edge> {
        let dir = from.direction_to(to)?;
        self.get(from)?.edges[dir]
    }

    /// Move cost of a single step, `None` if the step is not allowed.
    #[must_use]
    pub fn step_cost(&self, from: Position, to: Position) -> Option<Fixed> {
        self.edge(from, to)?.move_cost
    }

    /// Whether two squares are one legal step apart.
    #[must_use]
    pub fn is_adjacent(&self, a: Position, b: Position) -> bool {
        self.step_cost(a, b).is_some()
    }

    /// Neighbours reachable in one step, with the step's cost.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is outside the grid.
    pub fn adjacent(&self, pos: Position) -> impl Iterator<Item = (Position, Fixed)> + '_ {
        let square = self.square(pos);
        square.edges.iter().enumerate().filter_map(move |(dir, edge)| {
            let cost = (*edge)?.move_cost?;
            Some((square.position.step(dir), cost))
        })
    }

    /// All squares in row-major order.
    pub fn squares(&self) -> impl Iterator<Item = &Square> {
        self.squares.iter()
    }

    /// Every cell that differs from open ground.
    #[must_use]
    pub fn export(&self) -> Vec<TerrainFeature> {
        self.squares
            .iter()
            .filter(|s| s.terrain != TerrainCell::OPEN)
            .map(|s| TerrainFeature {
                position: s.position,
                cell: s.terrain,
            })
            .collect()
    }

    /// Hash of the dimensions and every non-default cell.
    ///
    /// Two battlefields with the same hash answer every query identically,
    /// so external stores may key cached results by it.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        for feature in self.export() {
            feature.position.hash(&mut hasher);
            feature.cell.move_scale.map(Fixed::to_bits).hash(&mut hasher);
            feature
                .cell
                .visibility_scale
                .map(Fixed::to_bits)
                .hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn combine(a: Option<Fixed>, b: Option<Fixed>, scale: Fixed) -> Option<Fixed> {
    Some((a? + b?) * scale)
}

fn validate_cell(position: Position, cell: TerrainCell) -> Result<()> {
    if cell.move_scale.is_some_and(|m| m < Fixed::ONE) {
        return Err(GameError::InvalidTerrain {
            position,
            reason: "move scale below 1".into(),
        });
    }
    if cell.visibility_scale.is_some_and(|v| v < Fixed::ZERO) {
        return Err(GameError::InvalidTerrain {
            position,
            reason: "negative visibility scale".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn open(width: i32, height: i32) -> TerrainGraph {
        TerrainGraph::build(width, height, |_, _| TerrainCell::OPEN).unwrap()
    }

    fn pos(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_invalid_dimensions() {
        let err = TerrainGraph::build(0, 5, |_, _| TerrainCell::OPEN).unwrap_err();
        assert!(matches!(
            err,
            GameError::InvalidDimensions {
                width: 0,
                height: 5
            }
        ));
        assert!(TerrainGraph::build(4, -1, |_, _| TerrainCell::OPEN).is_err());
    }

    #[test]
    fn test_invalid_move_scale() {
        let result = TerrainGraph::build(3, 3, |_, _| TerrainCell::from_scales(0.5, 0.0));
        assert!(matches!(result, Err(GameError::InvalidTerrain { .. })));
    }

    #[test]
    fn test_open_costs() {
        let graph = open(5, 5);
        assert_eq!(graph.step_cost(pos(2, 2), pos(3, 2)), Some(Fixed::ONE));
        assert_eq!(
            graph.step_cost(pos(2, 2), pos(3, 3)),
            Some(Fixed::from_num(2) * DIAGONAL_SCALE)
        );
        assert_eq!(graph.step_cost(pos(2, 2), pos(4, 2)), None);
    }

    #[test]
    fn test_adjacent_counts() {
        let graph = open(5, 5);
        assert_eq!(graph.adjacent(pos(0, 0)).count(), 3);
        assert_eq!(graph.adjacent(pos(2, 0)).count(), 5);
        assert_eq!(graph.adjacent(pos(2, 2)).count(), 8);
    }

    #[test]
    fn test_impassable_propagates() {
        let graph = TerrainGraph::build(3, 3, |x, y| {
            if (x, y) == (1, 1) {
                TerrainCell::TREE
            } else {
                TerrainCell::OPEN
            }
        })
        .unwrap();
        assert_eq!(graph.step_cost(pos(0, 1), pos(1, 1)), None);
        let edge = graph.edge(pos(1, 0), pos(1, 1)).unwrap();
        assert_eq!(edge.visibility_cost, None);
        assert!(graph.adjacent(pos(1, 1)).next().is_none());
    }

    #[test]
    fn test_mixed_costs_are_averaged() {
        let graph = TerrainGraph::build(2, 1, |x, _| {
            if x == 0 {
                TerrainCell::OPEN
            } else {
                TerrainCell::SCRUB
            }
        })
        .unwrap();
        let edge = graph.edge(pos(0, 0), pos(1, 0)).unwrap();
        // (1 + 2) * 0.5 and (0 + 1) * 0.5
        assert_eq!(edge.move_cost, Some(Fixed::from_num(1.5)));
        assert_eq!(edge.visibility_cost, Some(Fixed::from_num(0.5)));
    }

    #[test]
    fn test_corner_cutting_removed() {
        // Two impassable squares on one diagonal of a 2x2 block
        let graph = TerrainGraph::build(2, 2, |x, y| {
            if x == y {
                TerrainCell::TREE
            } else {
                TerrainCell::OPEN
            }
        })
        .unwrap();
        assert!(!graph.is_adjacent(pos(1, 0), pos(0, 1)));
        assert!(!graph.is_adjacent(pos(0, 1), pos(1, 0)));
        // Sight across the corner is untouched
        assert!(graph.edge(pos(1, 0), pos(0, 1)).is_some());
    }

    #[test]
    fn test_single_tree_severs_flanking_diagonal() {
        let graph = TerrainGraph::build(3, 3, |x, y| {
            if (x, y) == (1, 1) {
                TerrainCell::TREE
            } else {
                TerrainCell::OPEN
            }
        })
        .unwrap();
        assert!(!graph.is_adjacent(pos(2, 1), pos(1, 2)));
        assert!(!graph.is_adjacent(pos(1, 2), pos(0, 1)));
        assert!(!graph.is_adjacent(pos(0, 1), pos(1, 0)));
        assert!(!graph.is_adjacent(pos(1, 0), pos(2, 1)));
        // Orthogonal links between open squares stay
        assert!(graph.is_adjacent(pos(0, 0), pos(1, 0)));
    }

    #[test]
    fn test_export_and_hash() {
        let plain = open(6, 6);
        assert!(plain.export().is_empty());

        let wooded = TerrainGraph::build(6, 6, |x, y| {
            if (x, y) == (3, 3) {
                TerrainCell::TREE
            } else {
                TerrainCell::OPEN
            }
        })
        .unwrap();
        assert_eq!(wooded.export().len(), 1);
        assert_ne!(plain.content_hash(), wooded.content_hash());
        assert_eq!(plain.content_hash(), open(6, 6).content_hash());
        assert_ne!(plain.content_hash(), open(6, 7).content_hash());
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_square_out_of_bounds_panics() {
        let graph = open(3, 3);
        let _ = graph.square(pos(3, 0));
    }

    #[test]
    fn test_direction_to() {
        assert_eq!(pos(0, 0).direction_to(pos(1, 0)), Some(0));
        assert_eq!(pos(0, 0).direction_to(pos(1, -1)), Some(7));
        assert_eq!(pos(0, 0).direction_to(pos(2, 0)), None);
    }

    proptest! {
        #[test]
        fn prop_adjacency_symmetric(
            width in 1i32..10,
            height in 1i32..10,
            cells in proptest::collection::vec(0u8..4, 100),
        ) {
            let graph = TerrainGraph::build(width, height, |x, y| {
                match cells[(y * 10 + x) as usize] {
                    0 => TerrainCell::TREE,
                    1 => TerrainCell::SCRUB,
                    _ => TerrainCell::OPEN,
                }
            })
            .unwrap();

            for square in graph.squares() {
                for (next, cost) in graph.adjacent(square.position) {
                    prop_assert_eq!(graph.step_cost(next, square.position), Some(cost));
                }
            }
        }
    }
}
