//! Units, teams and the roster arena that owns them.
//!
//! Units live in a single arena indexed by [`UnitId`]. Teams hold ids, and
//! units hold their team's id, so there are no back-references to manage.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{GameError, Result};
use crate::grid::Position;
use crate::replay::UnitSnapshot;
use crate::weapon::{Weapon, WeaponCategory};

/// Stable handle of a unit within its roster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamId {
    /// Deploys along the left edge and acts first.
    One,
    /// Deploys along the right edge.
    Two,
}

impl TeamId {
    /// Both teams in turn order.
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    /// Index for per-team arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// The other team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "team one"),
            Self::Two => write!(f, "team two"),
        }
    }
}

/// Activation state of a unit within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitStatus {
    /// May still act this turn.
    Ready,
    /// Has acted this turn.
    Activated,
    /// Out of the game for good.
    Dead,
}

/// The static stat line of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitProfile {
    /// Display name.
    pub name: String,
    /// Movement budget per activation.
    pub movement: u32,
    /// Mean of ranged attack rolls.
    pub ranged_skill: u32,
    /// Standard deviation of ranged attack rolls.
    pub ranged_consistency: u32,
    /// Mean of melee rolls.
    pub melee_skill: u32,
    /// Standard deviation of melee rolls.
    pub melee_consistency: u32,
    /// Ranged rolls must beat this to hit.
    pub dodge: u32,
    /// Subtracted from every hit, less the weapon's punch.
    pub armor: u32,
    /// Starting health.
    pub max_health: u32,
    /// Close-combat weapon.
    pub melee_weapon: Weapon,
    /// Ranged weapon, if any.
    #[serde(default)]
    pub ranged_weapon: Option<Weapon>,
}

/// Largest movement allowance a profile may have. Path costs are
/// fixed-point numbers with 32 integer bits.
pub const MAX_MOVEMENT: u32 = 10_000;

impl UnitProfile {
    /// Check the profile is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.movement > MAX_MOVEMENT {
            return Err(GameError::InvalidProfile(format!(
                "'{}' has movement {} above the limit of {MAX_MOVEMENT}",
                self.name, self.movement
            )));
        }
        if self.max_health == 0 {
            return Err(GameError::InvalidProfile(format!(
                "'{}' has no health",
                self.name
            )));
        }
        if self.melee_weapon.category != WeaponCategory::Melee {
            return Err(GameError::InvalidProfile(format!(
                "'{}' carries ranged weapon '{}' as its melee weapon",
                self.name, self.melee_weapon.name
            )));
        }
        self.melee_weapon.validate()?;
        if let Some(ranged) = &self.ranged_weapon {
            if !ranged.is_ranged() {
                return Err(GameError::InvalidProfile(format!(
                    "'{}' carries melee weapon '{}' as its ranged weapon",
                    self.name, ranged.name
                )));
            }
            ranged.validate()?;
        }
        Ok(())
    }

    /// Hash of every stat and weapon, for external caches.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// A unit in play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Handle in the roster.
    pub id: UnitId,
    /// Owning team.
    pub team: TeamId,
    /// Static stats.
    pub profile: UnitProfile,
    /// Current health, `0..=max_health`.
    pub health: u32,
    /// Activation state.
    pub status: UnitStatus,
    /// Square occupied; `None` once dead.
    pub position: Option<Position>,
}

impl Unit {
    /// Whether the unit is still in the game.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status != UnitStatus::Dead
    }

    /// Whether the unit may act this turn.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == UnitStatus::Ready
    }

    /// Ranged weapon, if carried.
    #[must_use]
    pub fn ranged_weapon(&self) -> Option<&Weapon> {
        self.profile.ranged_weapon.as_ref()
    }

    /// Apply one hit's damage. Returns `true` if this hit killed the unit.
    ///
    /// A dead unit takes no damage.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            self.status = UnitStatus::Dead;
            self.position = None;
            return true;
        }
        false
    }
}

/// A named side and the units on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Which side.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Members in deployment order.
    pub units: Vec<UnitId>,
}

/// Arena of every unit in a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    units: Vec<Unit>,
    teams: [Team; 2],
}

impl Roster {
    /// An empty roster with two named teams.
    #[must_use]
    pub fn new(team_one: impl Into<String>, team_two: impl Into<String>) -> Self {
        Self {
            units: Vec::new(),
            teams: [
                Team {
                    id: TeamId::One,
                    name: team_one.into(),
                    units: Vec::new(),
                },
                Team {
                    id: TeamId::Two,
                    name: team_two.into(),
                    units: Vec::new(),
                },
            ],
        }
    }

    /// Add a unit at full health, ready, standing on `position`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidProfile`] if the profile does not validate,
    /// or [`GameError::InvalidMoveDestination`] if another unit already
    /// stands on `position`.
    pub fn spawn(&mut self, team: TeamId, profile: UnitProfile, position: Position) -> Result<UnitId> {
        profile.validate()?;
        let id = UnitId(self.units.len() as u32);
        if let Some(other) = self.unit_at(position) {
            return Err(GameError::InvalidMoveDestination {
                unit: id,
                destination: position,
                reason: format!("occupied by {other}"),
            });
        }
        self.units.push(Unit {
            id,
            team,
            health: profile.max_health,
            profile,
            status: UnitStatus::Ready,
            position: Some(position),
        });
        self.teams[team.index()].units.push(id);
        Ok(id)
    }

    /// Unit by handle.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.0 as usize)
    }

    /// Unit by handle, or an error for unknown handles.
    pub fn get(&self, id: UnitId) -> Result<&Unit> {
        self.unit(id).ok_or(GameError::UnknownUnit(id))
    }

    /// Mutable unit by handle.
    pub fn get_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units
            .get_mut(id.0 as usize)
            .ok_or(GameError::UnknownUnit(id))
    }

    /// Two distinct units mutably at once.
    pub fn pair_mut(&mut self, a: UnitId, b: UnitId) -> Result<(&mut Unit, &mut Unit)> {
        let (i, j) = (a.0 as usize, b.0 as usize);
        let len = self.units.len();
        if i >= len {
            return Err(GameError::UnknownUnit(a));
        }
        if j >= len {
            return Err(GameError::UnknownUnit(b));
        }
        match i.cmp(&j) {
            std::cmp::Ordering::Less => {
                let (low, high) = self.units.split_at_mut(j);
                Ok((&mut low[i], &mut high[0]))
            }
            std::cmp::Ordering::Greater => {
                let (low, high) = self.units.split_at_mut(i);
                Ok((&mut high[0], &mut low[j]))
            }
            std::cmp::Ordering::Equal => Err(GameError::InvalidState(format!(
                "unit {a} cannot engage itself"
            ))),
        }
    }

    /// Every unit, dead or alive, in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Number of units ever spawned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no unit has been spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// A team's record.
    #[must_use]
    pub fn team(&self, id: TeamId) -> &Team {
        &self.teams[id.index()]
    }

    /// Living members of a team.
    pub fn living(&self, team: TeamId) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(move |u| u.team == team && u.is_alive())
    }

    /// Sum of current health over a team's living units.
    #[must_use]
    pub fn strength(&self, team: TeamId) -> u32 {
        self.living(team).map(|u| u.health).sum()
    }

    /// Whether a team has nobody left.
    #[must_use]
    pub fn is_eliminated(&self, team: TeamId) -> bool {
        self.living(team).next().is_none()
    }

    /// Squares held by living units, optionally leaving one unit out.
    #[must_use]
    pub fn occupied(&self, except: Option<UnitId>) -> HashSet<Position> {
        self.units
            .iter()
            .filter(|u| Some(u.id) != except)
            .filter_map(|u| u.position)
            .collect()
    }

    /// Living unit standing on `pos`.
    #[must_use]
    pub fn unit_at(&self, pos: Position) -> Option<UnitId> {
        self.units
            .iter()
            .find(|u| u.position == Some(pos))
            .map(|u| u.id)
    }

    /// Start of a turn: every living unit becomes ready.
    pub fn ready_up(&mut self) {
        for unit in self.units.iter_mut().filter(|u| u.is_alive()) {
            unit.status = UnitStatus::Ready;
        }
    }

    /// Per-unit state for replay recorders.
    #[must_use]
    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.units.iter().map(UnitSnapshot::of).collect()
    }

    /// Restore health, status and position from snapshots.
    ///
    /// Every snapshot is checked before any unit changes, so a rejected
    /// call leaves the roster as it was.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownUnit`] for a snapshot of a unit not in
    /// this roster, or [`GameError::InvalidState`] for health above maximum,
    /// a status that disagrees with the health, or two units on one square.
    pub fn restore(&mut self, snapshots: &[UnitSnapshot]) -> Result<()> {
        for snap in snapshots {
            let unit = self.get(snap.unit)?;
            if snap.health > unit.profile.max_health {
                return Err(GameError::InvalidState(format!(
                    "snapshot health {} above maximum {} for unit {}",
                    snap.health, unit.profile.max_health, snap.unit
                )));
            }
            let dead = snap.status == UnitStatus::Dead;
            if dead != (snap.health == 0) || (dead && snap.position.is_some()) {
                return Err(GameError::InvalidState(format!(
                    "snapshot of unit {} has status {:?} with health {} at {:?}",
                    snap.unit, snap.status, snap.health, snap.position
                )));
            }
        }

        let mut positions: HashMap<UnitId, Option<Position>> =
            self.units.iter().map(|u| (u.id, u.position)).collect();
        for snap in snapshots {
            positions.insert(snap.unit, snap.position);
        }
        let mut taken = HashSet::new();
        for pos in positions.values().flatten() {
            if !taken.insert(*pos) {
                return Err(GameError::InvalidState(format!(
                    "snapshots put two units on {pos}"
                )));
            }
        }

        for snap in snapshots {
            let unit = self.get_mut(snap.unit)?;
            unit.health = snap.health;
            unit.status = snap.status;
            unit.position = snap.position;
        }
        Ok(())
    }

    /// Hash of both teams' names and members' profiles, for external caches.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for team in &self.teams {
            team.name.hash(&mut hasher);
            team.units.len().hash(&mut hasher);
            for &id in &team.units {
                if let Some(unit) = self.unit(id) {
                    unit.profile.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}
