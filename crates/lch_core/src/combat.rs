//! Stochastic combat resolution.
//!
//! Ranged: the shooter rolls one normal sample per attack with mean
//! `ranged_skill - penalty * ranged_consistency` and deviation
//! `ranged_consistency`; every roll strictly above the target's dodge hits.
//! Penalties are therefore measured in standard deviations of the shooter's
//! own consistency.
//!
//! Melee uses opposed rolls paired by position: attacker and defender each
//! roll once per attack of the attacker's melee weapon, and attacker roll
//! `i` hits if it strictly beats defender roll `i`. A charging attacker adds
//! its melee consistency to its mean. Each pair is an independent trial, so
//! the per-roll hit chance is `P(A - D > 0)` with `A - D` normal.
//!
//! Damage: each hit draws uniformly from the weapon's range, falloff
//! weapons scale it by `exp(-distance / range)`, then `max(armor - punch, 0)`
//! is subtracted with a floor of zero. A defender that reaches zero health
//! is dead at once and ignores the rest of the hits.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::{prob_exceeds, Fixed};
use crate::sightline::Sightline;
use crate::unit::{Roster, Unit, UnitId, UnitProfile};
use crate::weapon::{Weapon, WeaponCategory};

/// Penalty per full movement allowance spent before shooting.
pub const MOVE_PENALTY: f64 = 1.0;

/// Penalty per range increment beyond a weapon's free increments.
pub const RANGE_PENALTY: f64 = 0.5;

/// Penalty for a heavy weapon fired point blank without aiming.
pub const CLOSE_RANGE_PENALTY: f64 = 1.0;

/// Heavy weapons are inaccurate below this many range increments.
pub const HEAVY_MIN_INCREMENTS: f64 = 0.5;

/// Multiplier on `(attacks - 1)^3`.
pub const MULTI_SHOT_PENALTY: f64 = 0.02;

/// Penalty per unit of sightline obstruction.
pub const OBSTRUCTION_PENALTY: f64 = 0.25;

/// What the shooter did and sees when taking a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotContext {
    /// Movement spent this activation before shooting.
    pub move_cost: Fixed,
    /// Sightline to the target.
    pub sightline: Sightline,
}

impl ShotContext {
    /// A shot without moving first.
    #[must_use]
    pub const fn stationary(sightline: Sightline) -> Self {
        Self {
            move_cost: Fixed::ZERO,
            sightline,
        }
    }

    /// A snap shot after spending `move_cost`.
    #[must_use]
    pub const fn after_move(move_cost: Fixed, sightline: Sightline) -> Self {
        Self {
            move_cost,
            sightline,
        }
    }

    /// Stationary with a clear view: a heavy weapon can be aimed.
    #[must_use]
    pub fn is_aimed(&self) -> bool {
        self.move_cost == Fixed::ZERO && self.sightline.is_clear()
    }
}

/// Summed penalty for a shot, or `None` if the shot cannot be taken at all:
/// melee weapon, blocked sightline, beyond maximum range, or a heavy weapon
/// after moving.
#[must_use]
pub fn ranged_penalty(weapon: &Weapon, movement: u32, ctx: &ShotContext) -> Option<f64> {
    if !weapon.is_ranged() {
        return None;
    }
    let obstruction = ctx.sightline.obstruction?.to_num::<f64>();
    let distance = ctx.sightline.distance.to_num::<f64>();
    if distance > weapon.max_range() {
        return None;
    }
    let moved = ctx.move_cost > Fixed::ZERO;
    if moved && weapon.is_heavy() {
        return None;
    }

    let mut penalty = 0.0;

    if moved && weapon.category != WeaponCategory::Assault && movement > 0 {
        penalty += MOVE_PENALTY * ctx.move_cost.to_num::<f64>() / f64::from(movement);
    }

    let increments = weapon.range_increments(distance);
    let free = match weapon.category {
        WeaponCategory::Assault => 1.0,
        WeaponCategory::Heavy | WeaponCategory::Standard => 2.0,
        WeaponCategory::Melee => return None,
    };
    penalty += RANGE_PENALTY * (increments - free).max(0.0);
    if weapon.is_heavy() && !ctx.is_aimed() && increments < HEAVY_MIN_INCREMENTS {
        penalty += CLOSE_RANGE_PENALTY * (HEAVY_MIN_INCREMENTS - increments) / HEAVY_MIN_INCREMENTS;
    }

    let extra_shots = f64::from(weapon.attacks.saturating_sub(1));
    penalty += MULTI_SHOT_PENALTY * extra_shots.powi(3);

    penalty += OBSTRUCTION_PENALTY * obstruction;

    Some(penalty)
}

/// Chance that one ranged attack hits, or `None` if the shot cannot be taken.
#[must_use]
pub fn ranged_hit_probability(
    shooter: &UnitProfile,
    target: &UnitProfile,
    ctx: &ShotContext,
) -> Option<f64> {
    let weapon = shooter.ranged_weapon.as_ref()?;
    let penalty = ranged_penalty(weapon, shooter.movement, ctx)?;
    let consistency = f64::from(shooter.ranged_consistency);
    let mean = f64::from(shooter.ranged_skill) - penalty * consistency;
    Some(prob_exceeds(mean, consistency, f64::from(target.dodge)))
}

/// Mean melee roll, including the charge bonus.
fn melee_mean(profile: &UnitProfile, charging: bool) -> f64 {
    let bonus = if charging {
        profile.melee_consistency
    } else {
        0
    };
    f64::from(profile.melee_skill + bonus)
}

/// Chance that one paired melee roll of the attacker beats the defender's.
#[must_use]
pub fn melee_hit_probability(attacker: &UnitProfile, defender: &UnitProfile, charging: bool) -> f64 {
    let spread = f64::from(attacker.melee_consistency).hypot(f64::from(defender.melee_consistency));
    let lead = melee_mean(attacker, charging) - f64::from(defender.melee_skill);
    prob_exceeds(lead, spread, 0.0)
}

/// Result of one attack action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
    /// Dice rolled.
    pub attacks: u32,
    /// Dice that hit.
    pub hits: u32,
    /// Health actually removed.
    pub damage: u32,
    /// Whether the defender died.
    pub killed: bool,
}

/// Outcome of asking the resolver for an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatOutcome {
    /// The attack is not allowed; nothing was rolled.
    CannotAct,
    /// Dice were rolled (possibly none, against a defender already dead).
    Resolved(Engagement),
}

impl CombatOutcome {
    /// The engagement, if dice were rolled.
    #[must_use]
    pub const fn engagement(&self) -> Option<&Engagement> {
        match self {
            Self::CannotAct => None,
            Self::Resolved(e) => Some(e),
        }
    }
}

fn roll<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + sd * z
}

/// Draw one hit's damage before armour.
pub fn roll_damage<R: Rng + ?Sized>(weapon: &Weapon, distance: f64, rng: &mut R) -> u32 {
    let raw = rng.gen_range(weapon.damage.min..=weapon.damage.max);
    if weapon.falloff && weapon.range > 0 {
        let scale = (-distance / f64::from(weapon.range)).exp();
        (f64::from(raw) * scale).round() as u32
    } else {
        raw
    }
}

/// Apply `hits` hits of `weapon` to `defender`. Returns damage dealt and
/// whether the defender died.
pub fn apply_hits<R: Rng + ?Sized>(
    defender: &mut Unit,
    weapon: &Weapon,
    hits: u32,
    distance: f64,
    rng: &mut R,
) -> (u32, bool) {
    let effective_armor = defender.profile.armor.saturating_sub(weapon.punch);
    let mut dealt = 0;
    for _ in 0..hits {
        if !defender.is_alive() {
            break;
        }
        let damage = roll_damage(weapon, distance, rng).saturating_sub(effective_armor);
        dealt += damage.min(defender.health);
        if defender.take_damage(damage) {
            return (dealt, true);
        }
    }
    (dealt, false)
}

/// Resolve a ranged attack.
///
/// # Panics
///
/// In debug builds, panics if the attacker is dead.
pub fn resolve_ranged<R: Rng + ?Sized>(
    roster: &mut Roster,
    attacker: UnitId,
    defender: UnitId,
    ctx: &ShotContext,
    rng: &mut R,
) -> Result<CombatOutcome> {
    let (shooter, target) = roster.pair_mut(attacker, defender)?;
    debug_assert!(shooter.is_alive(), "dead unit {attacker} cannot shoot");
    if !shooter.is_alive() {
        return Ok(CombatOutcome::CannotAct);
    }
    let Some(weapon) = shooter.profile.ranged_weapon.as_ref() else {
        return Ok(CombatOutcome::CannotAct);
    };
    let Some(penalty) = ranged_penalty(weapon, shooter.profile.movement, ctx) else {
        return Ok(CombatOutcome::CannotAct);
    };
    if !target.is_alive() {
        return Ok(CombatOutcome::Resolved(Engagement::default()));
    }

    let consistency = f64::from(shooter.profile.ranged_consistency);
    let mean = f64::from(shooter.profile.ranged_skill) - penalty * consistency;
    let dodge = f64::from(target.profile.dodge);
    let hits = (0..weapon.attacks)
        .filter(|_| roll(rng, mean, consistency) > dodge)
        .count() as u32;

    let distance = ctx.sightline.distance.to_num::<f64>();
    let (damage, killed) = apply_hits(target, weapon, hits, distance, rng);

    tracing::debug!(
        attacker = %attacker,
        defender = %defender,
        penalty,
        hits,
        damage,
        killed,
        "Ranged attack"
    );

    Ok(CombatOutcome::Resolved(Engagement {
        attacks: weapon.attacks,
        hits,
        damage,
        killed,
    }))
}

/// Resolve a melee attack; `charging` when the attacker moved into contact.
///
/// # Panics
///
/// In debug builds, panics if the attacker is dead.
pub fn resolve_melee<R: Rng + ?Sized>(
    roster: &mut Roster,
    attacker: UnitId,
    defender: UnitId,
    charging: bool,
    rng: &mut R,
) -> Result<CombatOutcome> {
    let (striker, target) = roster.pair_mut(attacker, defender)?;
    debug_assert!(striker.is_alive(), "dead unit {attacker} cannot fight");
    if !striker.is_alive() {
        return Ok(CombatOutcome::CannotAct);
    }
    if !target.is_alive() {
        return Ok(CombatOutcome::Resolved(Engagement::default()));
    }

    let weapon = &striker.profile.melee_weapon;
    let attack_mean = melee_mean(&striker.profile, charging);
    let attack_sd = f64::from(striker.profile.melee_consistency);
    let defence_mean = f64::from(target.profile.melee_skill);
    let defence_sd = f64::from(target.profile.melee_consistency);

    let mut hits = 0;
    for _ in 0..weapon.attacks {
        let attack = roll(rng, attack_mean, attack_sd);
        let defence = roll(rng, defence_mean, defence_sd);
        if attack > defence {
            hits += 1;
        }
    }

    let (damage, killed) = apply_hits(target, weapon, hits, 0.0, rng);

    tracing::debug!(
        attacker = %attacker,
        defender = %defender,
        charging,
        hits,
        damage,
        killed,
        "Melee attack"
    );

    Ok(CombatOutcome::Resolved(Engagement {
        attacks: weapon.attacks,
        hits,
        damage,
        killed,
    }))
}
