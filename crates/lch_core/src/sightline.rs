//! Rasterized lines and line-of-sight scoring.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::iter::FusedIterator;

use crate::grid::{Position, TerrainGraph};
use crate::math::{euclidean, fixed_serde, option_fixed_serde, Fixed};

/// The cells a straight line from `start` to `end` passes through.
///
/// Yields every cell after `start` up to and including `end`. Each step
/// moves along x, along y, or diagonally, whichever keeps the cell centre
/// closest to the ideal line; exact ties go diagonally. Distances are
/// compared as integer cross products, so there is no floating-point
/// ambiguity and the same pair always rasterizes the same way.
#[derive(Debug, Clone)]
pub struct StraightLine {
    start: Position,
    end: Position,
    current: Position,
    step_x: i32,
    step_y: i32,
}

impl StraightLine {
    /// Line from `start` to `end`.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            current: start,
            step_x: (end.x - start.x).signum(),
            step_y: (end.y - start.y).signum(),
        }
    }

    /// Perpendicular distance of `p` from the ideal line, scaled by the
    /// line's length.
    fn deviation(&self, p: Position) -> i64 {
        let dx = i64::from(self.end.x - self.start.x);
        let dy = i64::from(self.end.y - self.start.y);
        let px = i64::from(p.x - self.start.x);
        let py = i64::from(p.y - self.start.y);
        (dx * py - dy * px).abs()
    }
}

impl Iterator for StraightLine {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        if self.current == self.end {
            return None;
        }

        let here = self.current;
        let along_x = here.offset(self.step_x, 0);
        let along_y = here.offset(0, self.step_y);

        let next = if here.x == self.end.x {
            along_y
        } else if here.y == self.end.y {
            along_x
        } else {
            match self.deviation(along_x).cmp(&self.deviation(along_y)) {
                Ordering::Less => along_x,
                Ordering::Greater => along_y,
                Ordering::Equal => here.offset(self.step_x, self.step_y),
            }
        };

        self.current = next;
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let lower = self.current.chebyshev(self.end) as usize;
        let upper = (self.current.x.abs_diff(self.end.x) + self.current.y.abs_diff(self.end.y))
            as usize;
        (lower, Some(upper))
    }
}

impl FusedIterator for StraightLine {}

/// Distance and obstruction between two squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sightline {
    /// Euclidean distance in squares.
    #[serde(with = "fixed_serde")]
    pub distance: Fixed,
    /// Accumulated visibility cost, `None` if something opaque is in the way.
    #[serde(with = "option_fixed_serde")]
    pub obstruction: Option<Fixed>,
}

impl Sightline {
    /// Nothing at all in the way.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.obstruction == Some(Fixed::ZERO)
    }

    /// No shot possible.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.obstruction.is_none()
    }
}

/// Score the sightline between `a` and `b` without any caching.
///
/// Neighbours use their precomputed link. Otherwise the visibility costs of
/// every square on the line are summed, plus half the first square's cost
/// and minus half the last's, so the two endpoints count half each. The
/// line is always traced from the lesser endpoint so `trace(a, b)` and
/// `trace(b, a)` agree exactly.
///
/// # Panics
///
/// Panics if either position is outside the grid.
#[must_use]
pub fn trace(graph: &TerrainGraph, a: Position, b: Position) -> Sightline {
    let (from, to) = if a <= b { (a, b) } else { (b, a) };
    let distance = euclidean(to.x - from.x, to.y - from.y);

    let from_cost = graph.square(from).terrain.visibility_scale;
    let to_cost = graph.square(to).terrain.visibility_scale;

    let obstruction = if from == to {
        from_cost.map(|_| Fixed::ZERO)
    } else if let Some(edge) = graph.edge(from, to) {
        edge.visibility_cost
    } else {
        line_obstruction(graph, from, to, from_cost, to_cost)
    };

    Sightline {
        distance,
        obstruction,
    }
}

fn line_obstruction(
    graph: &TerrainGraph,
    from: Position,
    to: Position,
    from_cost: Option<Fixed>,
    to_cost: Option<Fixed>,
) -> Option<Fixed> {
    let mut total = Fixed::ZERO;
    for cell in StraightLine::new(from, to) {
        total += graph.square(cell).terrain.visibility_scale?;
    }
    Some(total + from_cost? / 2 - to_cost? / 2)
}
