//! Test fixtures and helpers.
//!
//! The reference squads every balance discussion starts from: a
//! well-armoured, accurate team one against a tougher melee-leaning team
//! two, three units each.

use std::sync::Arc;

use fixed::types::I32F32;
use lch_core::battlefield::Battlefield;
use lch_core::game::{deploy, Game, GameConfig};
use lch_core::grid::{Position, TerrainGraph};
use lch_core::policy::{DecisionPolicy, FirstChoicePolicy, RandomPolicy};
use lch_core::terrain::{ForestConfig, TerrainCell, TerrainSpec};
use lch_core::unit::{Roster, TeamId, UnitId, UnitProfile};
use lch_core::weapon::{DamageRange, Weapon, WeaponCategory};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Standard rifle: range 18, one shot.
#[must_use]
pub fn rifle() -> Weapon {
    Weapon::ranged("Test R1", WeaponCategory::Standard, 18, 1, 0, DamageRange::new(2, 4))
}

/// Heavy weapon: range 24, three shots, punch 1.
#[must_use]
pub fn heavy() -> Weapon {
    Weapon::ranged("Test RH", WeaponCategory::Heavy, 24, 3, 1, DamageRange::new(3, 5))
}

/// Short rifle: range 12, two shots.
#[must_use]
pub fn short_rifle() -> Weapon {
    Weapon::ranged("Test R2", WeaponCategory::Standard, 12, 2, 0, DamageRange::new(3, 4))
}

/// Assault weapon: range 12, three shots, punch 1.
#[must_use]
pub fn assault() -> Weapon {
    Weapon::ranged("Test RA", WeaponCategory::Assault, 12, 3, 1, DamageRange::new(3, 4))
}

/// One attack, 2-3 damage.
#[must_use]
pub fn knife() -> Weapon {
    Weapon::melee("Knife", 1, DamageRange::new(2, 3))
}

/// Two attacks, 3-4 damage.
#[must_use]
pub fn sword() -> Weapon {
    Weapon::melee("Sword", 2, DamageRange::new(3, 4))
}

/// Three attacks, 3-5 damage.
#[must_use]
pub fn axe() -> Weapon {
    Weapon::melee("Axe", 3, DamageRange::new(3, 5))
}

fn team_one_profile(name: &str, melee: Weapon, ranged: Option<Weapon>) -> UnitProfile {
    UnitProfile {
        name: name.into(),
        movement: 6,
        ranged_skill: 55,
        ranged_consistency: 15,
        melee_skill: 45,
        melee_consistency: 15,
        dodge: 60,
        armor: 2,
        max_health: 6,
        melee_weapon: melee,
        ranged_weapon: ranged,
    }
}

fn team_two_profile(name: &str, melee: Weapon, ranged: Option<Weapon>) -> UnitProfile {
    UnitProfile {
        name: name.into(),
        movement: 6,
        ranged_skill: 45,
        ranged_consistency: 25,
        melee_skill: 60,
        melee_consistency: 20,
        dodge: 50,
        armor: 1,
        max_health: 7,
        melee_weapon: melee,
        ranged_weapon: ranged,
    }
}

/// Team one rifleman.
#[must_use]
pub fn rifleman() -> UnitProfile {
    team_one_profile("Test1", knife(), Some(rifle()))
}

/// Team one heavy gunner.
#[must_use]
pub fn gunner() -> UnitProfile {
    team_one_profile("Test1a", knife(), Some(heavy()))
}

/// Team one swordsman, no ranged weapon.
#[must_use]
pub fn swordsman() -> UnitProfile {
    team_one_profile("Test1b", sword(), None)
}

/// Team two trooper.
#[must_use]
pub fn trooper() -> UnitProfile {
    team_two_profile("Test2", sword(), Some(short_rifle()))
}

/// Team two assault trooper.
#[must_use]
pub fn stormer() -> UnitProfile {
    team_two_profile("Test2a", sword(), Some(assault()))
}

/// Team two axeman, no ranged weapon.
#[must_use]
pub fn axeman() -> UnitProfile {
    team_two_profile("Test2b", axe(), None)
}

/// The reference team one squad.
#[must_use]
pub fn squad_one() -> Vec<UnitProfile> {
    vec![rifleman(), gunner(), swordsman()]
}

/// The reference team two squad.
#[must_use]
pub fn squad_two() -> Vec<UnitProfile> {
    vec![trooper(), stormer(), axeman()]
}

/// Open ground of the given size.
///
/// # Panics
///
/// Panics on non-positive dimensions.
#[must_use]
pub fn open_field(width: i32, height: i32) -> Battlefield {
    Battlefield::build(width, height, |_, _| TerrainCell::OPEN).expect("valid dimensions")
}

/// Seeded forest of the given size.
///
/// # Panics
///
/// Panics on non-positive dimensions.
#[must_use]
pub fn forest(width: i32, height: i32, seed: u64) -> Battlefield {
    let layout = TerrainSpec::Forest(ForestConfig::default().with_seed(seed)).layout(width, height);
    let graph = TerrainGraph::from_layout(&layout).expect("valid forest");
    Battlefield::from_terrain(Arc::new(graph))
}

/// Both reference squads in the default deployment.
///
/// # Panics
///
/// Panics if the battlefield is shorter than three squares.
#[must_use]
pub fn reference_roster(battlefield: &Battlefield) -> Roster {
    deploy(
        battlefield,
        ["TestTeam1", "TestTeam2"],
        [&squad_one(), &squad_two()],
    )
    .expect("deployable reference squads")
}

/// Place single units at chosen squares, team one first.
///
/// # Panics
///
/// Panics on an invalid profile.
#[must_use]
pub fn roster_at(units: &[(TeamId, UnitProfile, Position)]) -> (Roster, Vec<UnitId>) {
    let mut roster = Roster::new("TestTeam1", "TestTeam2");
    let ids = units
        .iter()
        .map(|(team, profile, pos)| {
            roster
                .spawn(*team, profile.clone(), *pos)
                .expect("valid profile")
        })
        .collect();
    (roster, ids)
}

/// Reference squads on a 20x12 forest with seeded random policies.
#[must_use]
pub fn reference_game(seed: u64) -> Game {
    let battlefield = forest(20, 12, seed);
    let roster = reference_roster(&battlefield);
    let policies: [Box<dyn DecisionPolicy>; 2] = [
        Box::new(RandomPolicy::new(seed)),
        Box::new(RandomPolicy::new(seed ^ 0x5eed)),
    ];
    tracing::debug!(seed, "Reference game");
    Game::new(battlefield, roster, policies, GameConfig::default().with_seed(seed))
}

/// Reference squads on open ground, both sides taking their first option.
#[must_use]
pub fn scripted_game(width: i32, height: i32) -> Game {
    let battlefield = open_field(width, height);
    let roster = reference_roster(&battlefield);
    Game::new(
        battlefield,
        roster,
        [Box::new(FirstChoicePolicy), Box::new(FirstChoicePolicy)],
        GameConfig::default(),
    )
}
