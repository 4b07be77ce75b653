//! Error types for the skirmish engine.
//!
//! Only configuration mistakes and broken invariants are errors. An
//! unreachable square, a blocked sightline or a heavy weapon that cannot
//! fire after moving are ordinary results and never show up here.

use thiserror::Error;

use crate::grid::Position;
use crate::unit::UnitId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all engine errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Battlefield dimensions must both be positive.
    #[error("Invalid battlefield dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },

    /// A terrain cell violated the cost rules (move scale below 1, negative visibility).
    #[error("Invalid terrain at {position}: {reason}")]
    InvalidTerrain {
        /// Offending cell.
        position: Position,
        /// What was wrong with it.
        reason: String,
    },

    /// A configured position lies outside the battlefield.
    #[error("Position {0} is outside the battlefield")]
    OutOfBounds(Position),

    /// A move destination was impassable or already occupied.
    #[error("Unit {unit} cannot move to {destination}: {reason}")]
    InvalidMoveDestination {
        /// Unit attempting the move.
        unit: UnitId,
        /// Requested destination.
        destination: Position,
        /// Why the destination was rejected.
        reason: String,
    },

    /// Unit handle not present in the roster.
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// A decision policy picked an index outside the candidate list.
    #[error("Policy selected action {index} out of {candidates} candidates")]
    InvalidPolicyChoice {
        /// Returned index.
        index: usize,
        /// Number of candidates offered.
        candidates: usize,
    },

    /// Unit profile failed validation.
    #[error("Invalid unit profile: {0}")]
    InvalidProfile(String),

    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
