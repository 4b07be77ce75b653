//! Candidate actions offered to decision policies.
//!
//! An [`Action`] is built fresh for one activation and thrown away after
//! the policy picks. The kind-specific data lives in [`ActionKind`]; the
//! game dispatches on it with a single `match`.

use serde::{Deserialize, Serialize};

use crate::grid::Position;
use crate::math::{fixed_serde, Fixed};
use crate::sightline::Sightline;
use crate::unit::UnitId;

/// Kind of an action, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionTag {
    /// Hold position.
    NoAction,
    /// Move only.
    Move,
    /// Shoot without moving.
    Shoot,
    /// Fight an adjacent enemy.
    Melee,
    /// Move, then shoot.
    SnapShot,
    /// Move into contact, then fight.
    Charge,
}

/// What an action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Stay put and spend the activation.
    NoAction,
    /// Move to `destination` at `cost`.
    Move {
        /// Square to end on.
        destination: Position,
        /// Movement spent.
        #[serde(with = "fixed_serde")]
        cost: Fixed,
    },
    /// Shoot `target` from where the unit stands.
    Shoot {
        /// Unit shot at.
        target: UnitId,
        /// Sightline to it.
        sightline: Sightline,
    },
    /// Fight an adjacent `target`.
    Melee {
        /// Unit attacked.
        target: UnitId,
    },
    /// Move to `destination`, then shoot `target`.
    SnapShot {
        /// Square to shoot from.
        destination: Position,
        /// Movement spent.
        #[serde(with = "fixed_serde")]
        cost: Fixed,
        /// Unit shot at.
        target: UnitId,
        /// Sightline from `destination`.
        sightline: Sightline,
    },
    /// Move to `destination` next to `target`, then fight it.
    Charge {
        /// Square to end on.
        destination: Position,
        /// Movement spent.
        #[serde(with = "fixed_serde")]
        cost: Fixed,
        /// Unit attacked.
        target: UnitId,
    },
}

impl ActionKind {
    /// Payload-free kind.
    #[must_use]
    pub const fn tag(&self) -> ActionTag {
        match self {
            Self::NoAction => ActionTag::NoAction,
            Self::Move { .. } => ActionTag::Move,
            Self::Shoot { .. } => ActionTag::Shoot,
            Self::Melee { .. } => ActionTag::Melee,
            Self::SnapShot { .. } => ActionTag::SnapShot,
            Self::Charge { .. } => ActionTag::Charge,
        }
    }

    /// Unit attacked, if any.
    #[must_use]
    pub const fn target(&self) -> Option<UnitId> {
        match self {
            Self::Shoot { target, .. }
            | Self::Melee { target }
            | Self::SnapShot { target, .. }
            | Self::Charge { target, .. } => Some(*target),
            Self::NoAction | Self::Move { .. } => None,
        }
    }

    /// Square moved to, if any.
    #[must_use]
    pub const fn destination(&self) -> Option<Position> {
        match self {
            Self::Move { destination, .. }
            | Self::SnapShot { destination, .. }
            | Self::Charge { destination, .. } => Some(*destination),
            Self::NoAction | Self::Shoot { .. } | Self::Melee { .. } => None,
        }
    }

    /// Movement spent, zero if the unit stays put.
    #[must_use]
    pub const fn move_cost(&self) -> Fixed {
        match self {
            Self::Move { cost, .. } | Self::SnapShot { cost, .. } | Self::Charge { cost, .. } => {
                *cost
            }
            Self::NoAction | Self::Shoot { .. } | Self::Melee { .. } => Fixed::ZERO,
        }
    }
}

/// Threat counts at the square an action leaves the unit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SituationalFeatures {
    /// Enemies the unit could shoot from there.
    pub shootable_targets: u32,
    /// Enemies the unit could charge from there.
    pub chargeable_targets: u32,
    /// Enemies that could shoot the unit there.
    pub can_shoot_back: u32,
    /// Enemies that could charge the unit there.
    pub can_charge_back: u32,
}

/// One candidate action with the features a policy scores it by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Acting unit.
    pub unit: UnitId,
    /// What it does.
    pub kind: ActionKind,
    /// Chance each attack hits; `None` for non-attacks.
    pub hit_probability: Option<f64>,
    /// Expected damage after armour over all attacks.
    pub expected_damage: f64,
    /// Target's current health, for attacks.
    pub target_health: Option<u32>,
    /// Threat counts at the resulting square.
    pub features: SituationalFeatures,
}

/// Number of entries in [`Action::feature_vector`].
pub const FEATURE_COUNT: usize = 8;

impl Action {
    /// Hold position.
    #[must_use]
    pub fn hold(unit: UnitId, features: SituationalFeatures) -> Self {
        Self {
            unit,
            kind: ActionKind::NoAction,
            hit_probability: None,
            expected_damage: 0.0,
            target_health: None,
            features,
        }
    }

    /// Unit attacked, if any.
    #[must_use]
    pub const fn target(&self) -> Option<UnitId> {
        self.kind.target()
    }

    /// Square moved to, if any.
    #[must_use]
    pub const fn destination(&self) -> Option<Position> {
        self.kind.destination()
    }

    /// Movement spent.
    #[must_use]
    pub const fn move_cost(&self) -> Fixed {
        self.kind.move_cost()
    }

    /// Normalized inputs for a scoring policy, given how many candidates
    /// were offered alongside this one.
    ///
    /// Counts are log-scaled with -1 standing for zero; damage and health
    /// are log-scaled with 0 standing for zero.
    #[must_use]
    pub fn feature_vector(&self, candidates: usize) -> [f64; FEATURE_COUNT] {
        let count = |n: u32| if n == 0 { -1.0 } else { f64::from(n).ln() };
        let positive = |v: f64| if v > 0.0 { v.ln() } else { 0.0 };
        let f = &self.features;
        [
            positive(candidates as f64),
            count(f.shootable_targets),
            count(f.chargeable_targets),
            count(f.can_shoot_back),
            count(f.can_charge_back),
            self.hit_probability.unwrap_or(0.0),
            positive(self.expected_damage),
            positive(f64::from(self.target_health.unwrap_or(0))),
        ]
    }
}
