//! Spatial queries over a terrain graph, with per-instance result caches.
//!
//! The terrain never changes during a battlefield's lifetime, so cached
//! sightlines are always valid and cached paths are valid unless the
//! squares occupied right now get in the way. Caches are keyed by the
//! unordered pair of endpoints.
//!
//! A [`Battlefield`] is owned by one game. Concurrent games share the
//! immutable [`TerrainGraph`] through an [`Arc`] and each keep their own
//! caches (see [`Battlefield::share`]).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::{Position, TerrainGraph};
use crate::math::Fixed;
use crate::pathfinding::{astar, heuristic, Path, Reachable};
use crate::sightline::{trace, Sightline, StraightLine};
use crate::terrain::TerrainCell;

/// Default maximum number of entries per cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Path queries answered from the cache.
    pub path_hits: u64,
    /// Path queries that ran a search.
    pub path_misses: u64,
    /// Sightline queries answered from the cache.
    pub sightline_hits: u64,
    /// Sightline queries that traced a line.
    pub sightline_misses: u64,
    /// Times a cache was cleared for reaching capacity.
    pub evictions: u64,
}

type PairKey = (Position, Position);

fn pair_key(a: Position, b: Position) -> PairKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone)]
struct QueryCache {
    capacity: usize,
    /// Successful paths, stored walking from the lesser endpoint.
    paths: HashMap<PairKey, Path>,
    sightlines: HashMap<PairKey, Sightline>,
    stats: CacheStats,
}

impl QueryCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            paths: HashMap::new(),
            sightlines: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    fn store_path(&mut self, key: PairKey, path: Path) {
        if self.paths.len() >= self.capacity {
            tracing::debug!(entries = self.paths.len(), "Path cache full, clearing");
            self.paths.clear();
            self.stats.evictions += 1;
        }
        self.paths.insert(key, path);
    }

    fn store_sightline(&mut self, key: PairKey, sightline: Sightline) {
        if self.sightlines.len() >= self.capacity {
            tracing::debug!(
                entries = self.sightlines.len(),
                "Sightline cache full, clearing"
            );
            self.sightlines.clear();
            self.stats.evictions += 1;
        }
        self.sightlines.insert(key, sightline);
    }
}

/// One game's view of the terrain: the shared graph plus its own caches.
#[derive(Debug, Clone)]
pub struct Battlefield {
    terrain: Arc<TerrainGraph>,
    cache: QueryCache,
}

impl Battlefield {
    /// Build a battlefield from a terrain classification function.
    ///
    /// # Errors
    ///
    /// See [`TerrainGraph::build`].
    pub fn build<F>(width: i32, height: i32, terrain_fn: F) -> Result<Self>
    where
        F: FnMut(i32, i32) -> TerrainCell,
    {
        Ok(Self::from_terrain(Arc::new(TerrainGraph::build(
            width, height, terrain_fn,
        )?)))
    }

    /// Wrap an already built terrain graph with empty caches.
    #[must_use]
    pub fn from_terrain(terrain: Arc<TerrainGraph>) -> Self {
        Self {
            terrain,
            cache: QueryCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    /// Set the per-cache entry limit.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache.capacity = capacity.max(1);
        self
    }

    /// A new battlefield over the same terrain with fresh, empty caches.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            terrain: Arc::clone(&self.terrain),
            cache: QueryCache::new(self.cache.capacity),
        }
    }

    /// The underlying terrain graph.
    #[must_use]
    pub fn terrain(&self) -> &Arc<TerrainGraph> {
        &self.terrain
    }

    /// Grid width.
    #[must_use]
    pub fn width(&self) -> i32 {
        self.terrain.width()
    }

    /// Grid height.
    #[must_use]
    pub fn height(&self) -> i32 {
        self.terrain.height()
    }

    /// Check if a position is within the grid.
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        self.terrain.contains(pos)
    }

    /// Positions one legal step from `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is outside the grid.
    pub fn adjacent(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        self.terrain.adjacent(pos).map(|(p, _)| p)
    }

    /// Whether `a` and `b` are one legal step apart.
    #[must_use]
    pub fn is_adjacent(&self, a: Position, b: Position) -> bool {
        self.terrain.is_adjacent(a, b)
    }

    /// Cells a line from `start` to `end` passes through.
    #[must_use]
    pub fn straight_line(&self, start: Position, end: Position) -> StraightLine {
        StraightLine::new(start, end)
    }

    /// Squares reachable from `start` within `budget`, cheapest first.
    ///
    /// Not cached: the result depends on the blocked set, which changes
    /// after every action.
    #[must_use]
    pub fn reachable<'a>(
        &'a self,
        start: Position,
        budget: Fixed,
        blocked: &'a HashSet<Position>,
    ) -> Reachable<'a> {
        Reachable::new(&self.terrain, start, budget, blocked)
    }

    /// Distance and obstruction between two squares, cached symmetrically.
    ///
    /// # Panics
    ///
    /// Panics if either position is outside the grid.
    pub fn line_of_sight(&mut self, a: Position, b: Position) -> Sightline {
        let key = pair_key(a, b);
        if let Some(&hit) = self.cache.sightlines.get(&key) {
            self.cache.stats.sightline_hits += 1;
            return hit;
        }
        self.cache.stats.sightline_misses += 1;
        let sightline = trace(&self.terrain, key.0, key.1);
        self.cache.store_sightline(key, sightline);
        sightline
    }

    /// Cheapest path from `start` to `goal` within `max_cost`, avoiding
    /// `blocked` squares other than the goal.
    ///
    /// The cache holds the cheapest route over the bare terrain for each
    /// pair. It answers a query when that route is clear of `blocked`
    /// (nothing cheaper can exist) or already costs more than `max_cost`
    /// (blocking only makes routes dearer). Otherwise the search runs with
    /// the blocked set and the result is returned uncached, since it is
    /// only cheapest while those squares stay occupied.
    pub fn astar_path(
        &mut self,
        start: Position,
        goal: Position,
        max_cost: Option<Fixed>,
        blocked: &HashSet<Position>,
    ) -> Option<Path> {
        let key = pair_key(start, goal);
        let fits = |path: &Path| max_cost.map_or(true, |max| path.cost() <= max);

        if let Some(cached) = self.cache.paths.get(&key) {
            if !fits(cached) {
                self.cache.stats.path_hits += 1;
                return None;
            }
            if !cached.crosses(blocked) {
                self.cache.stats.path_hits += 1;
                tracing::trace!(%start, %goal, "Path cache hit");
                return Some(orient(cached, start));
            }
            self.cache.stats.path_misses += 1;
            return astar(&self.terrain, start, goal, max_cost, blocked);
        }

        self.cache.stats.path_misses += 1;
        let path = astar(&self.terrain, key.0, key.1, max_cost, blocked)?;
        let oriented = orient(&path, start);
        let optimal = self.terrain_optimal(key, path, blocked);
        self.cache.store_path(key, optimal);
        Some(oriented)
    }

    /// The cheapest route over the bare terrain, given one found while
    /// avoiding `blocked`.
    fn terrain_optimal(&self, key: PairKey, found: Path, blocked: &HashSet<Position>) -> Path {
        if blocked.is_empty() || found.cost() == heuristic(key.0, key.1) {
            return found;
        }
        match astar(&self.terrain, key.0, key.1, Some(found.cost()), &HashSet::new()) {
            Some(unblocked) if unblocked.cost() < found.cost() => unblocked,
            _ => found,
        }
    }

    /// Hash of the terrain content, see [`TerrainGraph::content_hash`].
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.terrain.content_hash()
    }

    /// Cache counters since construction.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats
    }

    /// Number of cached paths and sightlines.
    #[must_use]
    pub fn cache_len(&self) -> (usize, usize) {
        (self.cache.paths.len(), self.cache.sightlines.len())
    }

    /// Drop every cached result.
    pub fn clear_caches(&mut self) {
        self.cache.paths.clear();
        self.cache.sightlines.clear();
    }
}

fn orient(path: &Path, start: Position) -> Path {
    if path.start() == start {
        path.clone()
    } else {
        path.reversed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::octile_distance;
    use proptest::prelude::*;

    fn pos(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn open(width: i32, height: i32) -> Battlefield {
        Battlefield::build(width, height, |_, _| TerrainCell::OPEN).unwrap()
    }

    fn sparse_forest() -> Battlefield {
        Battlefield::build(12, 9, |x, y| {
            if (x * 7 + y * 3) % 11 == 0 && x > 0 {
                TerrainCell::TREE
            } else if (x + y) % 5 == 0 {
                TerrainCell::SCRUB
            } else {
                TerrainCell::OPEN
            }
        })
        .unwrap()
    }

    #[test]
    fn test_repeated_query_hits_cache() {
        let mut bf = sparse_forest();
        let none = HashSet::new();
        let first = bf.astar_path(pos(1, 1), pos(10, 7), None, &none).unwrap();
        let second = bf.astar_path(pos(1, 1), pos(10, 7), None, &none).unwrap();
        assert_eq!(first, second);
        assert_eq!(bf.cache_stats().path_hits, 1);
        assert_eq!(bf.cache_stats().path_misses, 1);
    }

    #[test]
    fn test_reverse_query_shares_entry() {
        let mut bf = sparse_forest();
        let none = HashSet::new();
        let there = bf.astar_path(pos(1, 1), pos(10, 7), None, &none).unwrap();
        let back = bf.astar_path(pos(10, 7), pos(1, 1), None, &none).unwrap();
        assert_eq!(back, there.reversed());
        assert_eq!(bf.cache_stats().path_hits, 1);
    }

    #[test]
    fn test_blocked_cached_path_recomputes() {
        let mut bf = open(7, 5);
        let none = HashSet::new();
        let cached = bf.astar_path(pos(0, 2), pos(6, 2), None, &none).unwrap();

        let blocker = cached.interior()[2];
        let blocked: HashSet<Position> = [blocker].into_iter().collect();
        let detour = bf.astar_path(pos(0, 2), pos(6, 2), None, &blocked).unwrap();

        assert!(!detour.squares().contains(&blocker));
        assert!(detour.cost() >= cached.cost());
        assert_eq!(bf.cache_stats().path_misses, 2);
    }

    #[test]
    fn test_detour_not_reused_after_blockers_leave() {
        let mut bf = open(9, 5);
        let (start, goal) = (pos(0, 2), pos(4, 2));
        let wall: HashSet<Position> = (0..4).map(|y| pos(2, y)).collect();
        let detour = bf.astar_path(start, goal, None, &wall).unwrap();
        let optimal = octile_distance(4, 0);
        assert!(detour.cost() > optimal);

        let none = HashSet::new();
        let clear = bf
            .astar_path(start, goal, Some(Fixed::from_num(10)), &none)
            .unwrap();
        assert_eq!(clear.cost(), optimal);

        // A blocker off the straight route still gets the cheapest path
        let aside: HashSet<Position> = [pos(2, 0)].into_iter().collect();
        let again = bf.astar_path(goal, start, None, &aside).unwrap();
        assert_eq!(again.cost(), optimal);
        assert_eq!(again.start(), goal);
    }

    #[test]
    fn test_blocked_wall_is_unreachable() {
        let mut bf = open(5, 3);
        let none = HashSet::new();
        assert!(bf.astar_path(pos(0, 1), pos(4, 1), None, &none).is_some());

        let wall: HashSet<Position> = (0..3).map(|y| pos(2, y)).collect();
        assert!(bf.astar_path(pos(0, 1), pos(4, 1), None, &wall).is_none());
    }

    #[test]
    fn test_cached_path_respects_max_cost() {
        let mut bf = open(10, 1);
        let none = HashSet::new();
        assert!(bf.astar_path(pos(0, 0), pos(9, 0), None, &none).is_some());
        assert!(bf
            .astar_path(pos(0, 0), pos(9, 0), Some(Fixed::from_num(5)), &none)
            .is_none());
    }

    #[test]
    fn test_line_of_sight_cached() {
        let mut bf = sparse_forest();
        let a = bf.line_of_sight(pos(0, 0), pos(11, 8));
        let b = bf.line_of_sight(pos(11, 8), pos(0, 0));
        assert_eq!(a, b);
        assert_eq!(bf.cache_stats().sightline_hits, 1);
    }

    #[test]
    fn test_eviction_clears_cache() {
        let mut bf = open(6, 6).with_cache_capacity(2);
        bf.line_of_sight(pos(0, 0), pos(5, 5));
        bf.line_of_sight(pos(0, 0), pos(4, 5));
        assert_eq!(bf.cache_len().1, 2);
        bf.line_of_sight(pos(0, 0), pos(3, 5));
        assert_eq!(bf.cache_len().1, 1);
        assert_eq!(bf.cache_stats().evictions, 1);
    }

    #[test]
    fn test_share_keeps_terrain_drops_cache() {
        let mut bf = sparse_forest();
        bf.line_of_sight(pos(0, 0), pos(5, 5));
        let other = bf.share();
        assert!(Arc::ptr_eq(bf.terrain(), other.terrain()));
        assert_eq!(other.cache_len(), (0, 0));
        assert_eq!(other.content_hash(), bf.content_hash());
    }

    #[test]
    fn test_adjacent_and_reachable_queries() {
        let bf = open(4, 4);
        assert_eq!(bf.adjacent(pos(0, 0)).count(), 3);
        let none = HashSet::new();
        let near: Vec<_> = bf.reachable(pos(0, 0), Fixed::ONE, &none).collect();
        assert_eq!(near.len(), 3);
        assert_eq!(bf.straight_line(pos(0, 0), pos(3, 3)).count(), 3);
    }

    proptest! {
        #[test]
        fn prop_astar_matches_octile_on_open_ground(
            pairs in proptest::collection::vec((0i32..16, 0i32..12, 0i32..16, 0i32..12), 20..40)
        ) {
            let mut bf = open(16, 12);
            let none = HashSet::new();
            for (sx, sy, gx, gy) in pairs {
                let path = bf.astar_path(pos(sx, sy), pos(gx, gy), None, &none).unwrap();
                let expected = octile_distance(sx.abs_diff(gx), sy.abs_diff(gy));
                prop_assert_eq!(path.cost(), expected);
                prop_assert_eq!(path.start(), pos(sx, sy));
                prop_assert_eq!(path.goal(), pos(gx, gy));
            }
        }

        #[test]
        fn prop_line_of_sight_symmetric(
            ax in 0i32..12, ay in 0i32..9, bx in 0i32..12, by in 0i32..9,
        ) {
            let mut fresh = sparse_forest();
            let forward = fresh.line_of_sight(pos(ax, ay), pos(bx, by));
            let mut fresh = sparse_forest();
            let backward = fresh.line_of_sight(pos(bx, by), pos(ax, ay));
            prop_assert_eq!(forward, backward);
        }
    }
}
