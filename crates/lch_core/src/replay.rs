//! Per-action snapshots for external replay recorders.
//!
//! The engine never writes anything itself. After every resolved action it
//! hands a [`TurnObserver`] the acting [`Action`] and a snapshot of every
//! unit; [`ReplayLog`] is an in-memory observer that can be serialized.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionTag};
use crate::error::{GameError, Result};
use crate::grid::Position;
use crate::unit::{TeamId, Unit, UnitId, UnitStatus};

/// Replay format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Identity, health, status and position of one unit at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Which unit.
    pub unit: UnitId,
    /// Its side.
    pub team: TeamId,
    /// Current health.
    pub health: u32,
    /// Activation state.
    pub status: UnitStatus,
    /// Square held, `None` if dead.
    pub position: Option<Position>,
}

impl UnitSnapshot {
    /// Snapshot a unit.
    #[must_use]
    pub fn of(unit: &Unit) -> Self {
        Self {
            unit: unit.id,
            team: unit.team,
            health: unit.health,
            status: unit.status,
            position: unit.position,
        }
    }
}

/// Hook called by the turn loop as the game progresses.
pub trait TurnObserver {
    /// An action was resolved; `snapshots` is every unit's state after it.
    fn on_action(&mut self, turn: u32, action: &Action, snapshots: &[UnitSnapshot]);

    /// A turn finished.
    fn on_turn_end(&mut self, _turn: u32, _snapshots: &[UnitSnapshot]) {}
}

/// The do-nothing observer.
impl TurnObserver for () {
    fn on_action(&mut self, _turn: u32, _action: &Action, _snapshots: &[UnitSnapshot]) {}
}

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Turn the action happened in.
    pub turn: u32,
    /// Acting unit.
    pub unit: UnitId,
    /// Kind of action.
    pub action: ActionTag,
    /// Attack target, if any.
    pub target: Option<UnitId>,
    /// Move destination, if any.
    pub destination: Option<Position>,
    /// Every unit after the action.
    pub snapshots: Vec<UnitSnapshot>,
}

/// In-memory record of a whole game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Replay format version.
    pub version: u32,
    /// Seed of the game's random stream.
    pub seed: u64,
    /// Content hash of the battlefield.
    pub terrain_hash: u64,
    /// Content hash of the roster.
    pub roster_hash: u64,
    /// Unit states before the first action.
    pub initial: Vec<UnitSnapshot>,
    /// Actions in the order they were resolved.
    pub frames: Vec<ReplayFrame>,
    /// Turns completed.
    pub turns: u32,
}

impl ReplayLog {
    /// Start a log for a game about to begin.
    #[must_use]
    pub fn new(seed: u64, terrain_hash: u64, roster_hash: u64, initial: Vec<UnitSnapshot>) -> Self {
        Self {
            version: REPLAY_VERSION,
            seed,
            terrain_hash,
            roster_hash,
            initial,
            frames: Vec::new(),
            turns: 0,
        }
    }

    /// Frames recorded during one turn.
    #[must_use]
    pub fn frames_in_turn(&self, turn: u32) -> Vec<&ReplayFrame> {
        self.frames.iter().filter(|f| f.turn == turn).collect()
    }

    /// Unit states after the last recorded action.
    #[must_use]
    pub fn final_snapshots(&self) -> &[UnitSnapshot] {
        self.frames
            .last()
            .map_or(self.initial.as_slice(), |f| f.snapshots.as_slice())
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))
    }

    /// Decode from bincode, checking the format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let log: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;
        if log.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                log.version
            )));
        }
        Ok(log)
    }
}

impl TurnObserver for ReplayLog {
    fn on_action(&mut self, turn: u32, action: &Action, snapshots: &[UnitSnapshot]) {
        self.frames.push(ReplayFrame {
            turn,
            unit: action.unit,
            action: action.kind.tag(),
            target: action.target(),
            destination: action.destination(),
            snapshots: snapshots.to_vec(),
        });
    }

    fn on_turn_end(&mut self, turn: u32, _snapshots: &[UnitSnapshot]) {
        self.turns = turn + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, SituationalFeatures};
    use crate::math::Fixed;

    fn snapshot(health: u32) -> UnitSnapshot {
        UnitSnapshot {
            unit: UnitId(0),
            team: TeamId::One,
            health,
            status: UnitStatus::Ready,
            position: Some(Position::new(1, 1)),
        }
    }

    fn step() -> Action {
        Action {
            unit: UnitId(0),
            kind: ActionKind::Move {
                destination: Position::new(2, 1),
                cost: Fixed::ONE,
            },
            hit_probability: None,
            expected_damage: 0.0,
            target_health: None,
            features: SituationalFeatures::default(),
        }
    }

    #[test]
    fn test_log_records_frames() {
        let mut log = ReplayLog::new(7, 1, 2, vec![snapshot(6)]);
        assert_eq!(log.final_snapshots(), &[snapshot(6)]);

        log.on_action(0, &step(), &[snapshot(5)]);
        log.on_turn_end(0, &[snapshot(5)]);

        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.frames[0].action, ActionTag::Move);
        assert_eq!(log.frames[0].destination, Some(Position::new(2, 1)));
        assert_eq!(log.final_snapshots(), &[snapshot(5)]);
        assert_eq!(log.frames_in_turn(0).len(), 1);
        assert_eq!(log.turns, 1);
    }

    #[test]
    fn test_bytes_roundtrip_and_version_check() {
        let mut log = ReplayLog::new(7, 1, 2, vec![snapshot(6)]);
        log.on_action(0, &step(), &[snapshot(4)]);
        let bytes = log.to_bytes().unwrap();
        assert_eq!(ReplayLog::from_bytes(&bytes).unwrap(), log);

        log.version = REPLAY_VERSION + 1;
        let bytes = log.to_bytes().unwrap();
        assert!(ReplayLog::from_bytes(&bytes).is_err());
    }
}
