//! Weapons and their categories.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// How many multiples of its listed range a ranged weapon can reach at all.
pub const MAX_RANGE_INCREMENTS: u32 = 3;

/// Weapon category, which decides range and movement penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponCategory {
    /// Close combat only; range 0 means adjacent squares.
    Melee,
    /// Fires on the move without penalty, one free range increment.
    Assault,
    /// Cannot fire after moving; inaccurate very close and far out.
    Heavy,
    /// Ordinary ranged weapon, two free range increments.
    Standard,
}

/// Inclusive per-hit damage range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageRange {
    /// Least damage per hit.
    pub min: u32,
    /// Most damage per hit.
    pub max: u32,
}

impl DamageRange {
    /// Create a new damage range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Mean of a uniform draw.
    #[must_use]
    pub fn mean(&self) -> f64 {
        (f64::from(self.min) + f64::from(self.max)) / 2.0
    }
}

/// A melee or ranged weapon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Weapon {
    /// Display name.
    pub name: String,
    /// Category.
    pub category: WeaponCategory,
    /// Range in squares; 0 for melee weapons.
    pub range: u32,
    /// Dice rolled per attack.
    pub attacks: u32,
    /// Armour penetration.
    pub punch: u32,
    /// Damage per hit before armour.
    pub damage: DamageRange,
    /// Damage decays with distance (shotguns).
    #[serde(default)]
    pub falloff: bool,
}

impl Weapon {
    /// A close-combat weapon.
    #[must_use]
    pub fn melee(name: impl Into<String>, attacks: u32, damage: DamageRange) -> Self {
        Self {
            name: name.into(),
            category: WeaponCategory::Melee,
            range: 0,
            attacks,
            punch: 0,
            damage,
            falloff: false,
        }
    }

    /// A ranged weapon of the given category.
    #[must_use]
    pub fn ranged(
        name: impl Into<String>,
        category: WeaponCategory,
        range: u32,
        attacks: u32,
        punch: u32,
        damage: DamageRange,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            range,
            attacks,
            punch,
            damage,
            falloff: false,
        }
    }

    /// Set armour penetration.
    #[must_use]
    pub fn with_punch(mut self, punch: u32) -> Self {
        self.punch = punch;
        self
    }

    /// Make damage decay exponentially with distance relative to range.
    #[must_use]
    pub fn with_falloff(mut self) -> Self {
        self.falloff = true;
        self
    }

    /// Whether this is a ranged weapon.
    #[must_use]
    pub fn is_ranged(&self) -> bool {
        self.category != WeaponCategory::Melee
    }

    /// Whether this weapon may not fire after moving.
    #[must_use]
    pub fn is_heavy(&self) -> bool {
        self.category == WeaponCategory::Heavy
    }

    /// Furthest distance this weapon can fire at all.
    #[must_use]
    pub fn max_range(&self) -> f64 {
        f64::from(self.range) * f64::from(MAX_RANGE_INCREMENTS)
    }

    /// Shot distance in multiples of the weapon's range.
    #[must_use]
    pub fn range_increments(&self, distance: f64) -> f64 {
        if self.range == 0 {
            return f64::INFINITY;
        }
        distance / f64::from(self.range)
    }

    /// Expected damage of one hit after armour, before falloff.
    #[must_use]
    pub fn expected_damage(&self, armor: u32) -> f64 {
        let effective = u64::from(armor.saturating_sub(self.punch));
        let (lo, hi) = (u64::from(self.damage.min), u64::from(self.damage.max));
        if hi <= effective || hi < lo {
            return 0.0;
        }
        // Draws at or below armour do nothing; the rest form an arithmetic run
        let first = lo.max(effective) - effective;
        let n = (hi - lo.max(effective) + 1) as f64;
        let total = n * first as f64 + n * (n - 1.0) / 2.0;
        total / (hi - lo + 1) as f64
    }

    /// Check the weapon's numbers make sense.
    pub fn validate(&self) -> Result<()> {
        if self.damage.min > self.damage.max {
            return Err(GameError::InvalidProfile(format!(
                "weapon '{}' has min damage {} above max {}",
                self.name, self.damage.min, self.damage.max
            )));
        }
        if self.attacks == 0 {
            return Err(GameError::InvalidProfile(format!(
                "weapon '{}' has no attacks",
                self.name
            )));
        }
        if self.is_ranged() && self.range == 0 {
            return Err(GameError::InvalidProfile(format!(
                "ranged weapon '{}' has zero range",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rifle() -> Weapon {
        Weapon::ranged("Rifle", WeaponCategory::Standard, 18, 1, 0, DamageRange::new(2, 4))
    }

    #[test]
    fn test_melee_has_no_range() {
        let knife = Weapon::melee("Knife", 1, DamageRange::new(2, 3));
        assert!(!knife.is_ranged());
        assert_eq!(knife.range, 0);
        assert!(knife.range_increments(1.0).is_infinite());
    }

    #[test]
    fn test_max_range() {
        assert_eq!(rifle().max_range(), 54.0);
        assert!((rifle().range_increments(27.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_expected_damage_floors_at_zero() {
        let w = rifle();
        // Armour 3 against 2..=4: 0, 0, 1
        assert!((w.expected_damage(3) - 1.0 / 3.0).abs() < 1e-12);
        assert!((w.expected_damage(0) - 3.0).abs() < 1e-12);
        assert_eq!(w.expected_damage(10), 0.0);
        // Punch cancels armour
        assert!((w.with_punch(3).expected_damage(3) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(rifle().validate().is_ok());
        let mut bad = rifle();
        bad.damage = DamageRange::new(5, 2);
        assert!(bad.validate().is_err());
        let mut no_range = rifle();
        no_range.range = 0;
        assert!(no_range.validate().is_err());
    }

    #[test]
    fn test_extreme_numbers_do_not_overflow() {
        let mut w = rifle();
        w.range = u32::MAX;
        assert_eq!(w.max_range(), f64::from(u32::MAX) * 3.0);

        w.damage = DamageRange::new(0, u32::MAX);
        let mean = f64::from(u32::MAX) / 2.0;
        assert!((w.damage.mean() - mean).abs() < 1.0);
        assert!((w.expected_damage(0) - mean).abs() < 1.0);
        assert_eq!(w.expected_damage(u32::MAX), 0.0);
    }
}
