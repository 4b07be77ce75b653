//! A* pathfinding and bounded reachability over the terrain graph.
//!
//! Costs are fixed-point and ties are broken on coordinates, so the same
//! query always expands the same squares and returns the same path.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::iter::FusedIterator;

use crate::grid::{Position, TerrainGraph};
use crate::math::{fixed_serde, octile_distance, Fixed};

/// An ordered route including both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    squares: Vec<Position>,
    #[serde(with = "fixed_serde")]
    cost: Fixed,
}

impl Path {
    /// Squares from start to goal.
    #[must_use]
    pub fn squares(&self) -> &[Position] {
        &self.squares
    }

    /// Total move cost.
    #[must_use]
    pub const fn cost(&self) -> Fixed {
        self.cost
    }

    /// First square.
    #[must_use]
    pub fn start(&self) -> Position {
        self.squares[0]
    }

    /// Last square.
    #[must_use]
    pub fn goal(&self) -> Position {
        self.squares[self.squares.len() - 1]
    }

    /// Number of squares, endpoints included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.squares.len()
    }

    /// Always false; a path holds at least its start.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }

    /// Squares strictly between the endpoints.
    #[must_use]
    pub fn interior(&self) -> &[Position] {
        match self.squares.len() {
            0..=2 => &[],
            n => &self.squares[1..n - 1],
        }
    }

    /// Whether any square between the endpoints is in `blocked`.
    #[must_use]
    pub fn crosses(&self, blocked: &HashSet<Position>) -> bool {
        self.interior().iter().any(|p| blocked.contains(p))
    }

    /// The same route walked the other way; costs are symmetric.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut squares = self.squares.clone();
        squares.reverse();
        Self {
            squares,
            cost: self.cost,
        }
    }
}

/// Priority queue entry shared by A* and the reachability search.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct Frontier {
    position: Position,
    /// Cost so far (Dijkstra) or cost plus heuristic (A*).
    priority: Fixed,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Frontier {
    fn new(position: Position, priority: Fixed) -> Self {
        Self {
            position,
            priority,
            tie_breaker: coords_to_tie_breaker(position),
        }
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest priority first.
        match other.priority.cmp(&self.priority) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn coords_to_tie_breaker(pos: Position) -> u64 {
    (u64::from(pos.y as u32) << 32) | u64::from(pos.x as u32)
}

/// Octile lower bound on the cost between two squares.
#[must_use]
pub fn heuristic(a: Position, b: Position) -> Fixed {
    octile_distance(a.x.abs_diff(b.x), a.y.abs_diff(b.y))
}

/// Cheapest path from `start` to `goal` costing at most `max_cost`.
///
/// Squares in `blocked` cannot be entered, except `goal` itself so that a
/// path can end on an occupied square (an attack target). Returns `None`
/// when no such path exists; this is a normal outcome.
///
/// # Panics
///
/// Panics if `start` is outside the grid.
#[must_use]
pub fn astar(
    graph: &TerrainGraph,
    start: Position,
    goal: Position,
    max_cost: Option<Fixed>,
    blocked: &HashSet<Position>,
) -> Option<Path> {
    let within = |cost: Fixed| max_cost.map_or(true, |max| cost <= max);

    if !graph.contains(goal) || !within(heuristic(start, goal)) {
        return None;
    }
    if start == goal {
        return Some(Path {
            squares: vec![start],
            cost: Fixed::ZERO,
        });
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, Fixed> = HashMap::new();
    let mut closed: HashSet<Position> = HashSet::new();

    g_score.insert(start, Fixed::ZERO);
    open_set.push(Frontier::new(start, heuristic(start, goal)));

    while let Some(current) = open_set.pop() {
        if current.position == goal {
            let cost = g_score[&goal];
            return Some(Path {
                squares: reconstruct(&came_from, goal),
                cost,
            });
        }
        if !closed.insert(current.position) {
            continue;
        }

        let current_g = g_score[&current.position];
        for (next, step) in graph.adjacent(current.position) {
            if closed.contains(&next) || (next != goal && blocked.contains(&next)) {
                continue;
            }
            let tentative = current_g + step;
            if !within(tentative) {
                continue;
            }
            if g_score.get(&next).map_or(true, |&g| tentative < g) {
                came_from.insert(next, current.position);
                g_score.insert(next, tentative);
                let f = tentative + heuristic(next, goal);
                if within(f) {
                    open_set.push(Frontier::new(next, f));
                }
            }
        }
    }

    None
}

fn reconstruct(came_from: &HashMap<Position, Position>, goal: Position) -> Vec<Position> {
    let mut squares = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        squares.push(prev);
        current = prev;
    }
    squares.reverse();
    squares
}

/// Every square reachable from a start within a cost budget, cheapest first.
///
/// A lazy Dijkstra expansion: each call to `next` settles one more square.
/// The start comes first at cost zero; squares in `blocked` are never
/// entered. Costs are non-decreasing across the sequence.
#[derive(Debug)]
pub struct Reachable<'a> {
    graph: &'a TerrainGraph,
    blocked: &'a HashSet<Position>,
    budget: Fixed,
    frontier: BinaryHeap<Frontier>,
    best: HashMap<Position, Fixed>,
    settled: HashSet<Position>,
}

impl<'a> Reachable<'a> {
    /// Start a search from `start` with `budget` movement.
    ///
    /// # Panics
    ///
    /// Panics during iteration if `start` is outside the grid.
    #[must_use]
    pub fn new(
        graph: &'a TerrainGraph,
        start: Position,
        budget: Fixed,
        blocked: &'a HashSet<Position>,
    ) -> Self {
        let mut frontier = BinaryHeap::new();
        let mut best = HashMap::new();
        if budget >= Fixed::ZERO {
            frontier.push(Frontier::new(start, Fixed::ZERO));
            best.insert(start, Fixed::ZERO);
        }
        Self {
            graph,
            blocked,
            budget,
            frontier,
            best,
            settled: HashSet::new(),
        }
    }
}

impl Iterator for Reachable<'_> {
    type Item = (Position, Fixed);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.frontier.pop() {
            if !self.settled.insert(node.position) {
                continue;
            }
            let cost = node.priority;
            for (next, step) in self.graph.adjacent(node.position) {
                if self.settled.contains(&next) || self.blocked.contains(&next) {
                    continue;
                }
                let candidate = cost + step;
                if candidate > self.budget {
                    continue;
                }
                if self.best.get(&next).map_or(true, |&b| candidate < b) {
                    self.best.insert(next, candidate);
                    self.frontier.push(Frontier::new(next, candidate));
                }
            }
            return Some((node.position, cost));
        }
        None
    }
}

impl FusedIterator for Reachable<'_> {}
