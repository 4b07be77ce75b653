//! Legal-action enumeration for one activation.
//!
//! For a ready unit, in priority order:
//!
//! 1. In contact with a living enemy: one melee action per adjacent enemy
//!    and nothing else.
//! 2. With a ranged weapon: a shot at every enemy it can fire on from
//!    where it stands.
//! 3. For every other square within its movement budget: a charge per
//!    enemy adjacent to that square, or else a move plus (unless the
//!    ranged weapon is heavy) a snap shot at every enemy in range.
//!
//! A unit with nothing legal contributes no candidates; the turn loop
//! treats a team with no candidates at all as passing.
//!
//! Every candidate carries threat counts for the square it ends on. Those
//! need a sightline and a bounded path per enemy per candidate, which is
//! what the battlefield caches are for.

use std::collections::HashSet;
use std::sync::Arc;

use crate::action::{Action, ActionKind, SituationalFeatures};
use crate::battlefield::Battlefield;
use crate::combat::{melee_hit_probability, ranged_hit_probability, ShotContext};
use crate::error::Result;
use crate::grid::Position;
use crate::math::Fixed;
use crate::pathfinding::Reachable;
use crate::unit::{Roster, TeamId, Unit, UnitId};

/// Candidates for every ready unit of `team`, in roster order.
pub fn generate_team_actions(
    battlefield: &mut Battlefield,
    roster: &Roster,
    team: TeamId,
) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for &id in &roster.team(team).units {
        actions.extend(generate_unit_actions(battlefield, roster, id)?);
    }
    Ok(actions)
}

/// Candidates for one unit; empty unless it is ready and on the board.
pub fn generate_unit_actions(
    battlefield: &mut Battlefield,
    roster: &Roster,
    id: UnitId,
) -> Result<Vec<Action>> {
    let unit = roster.get(id)?;
    let Some(origin) = unit.position else {
        return Ok(Vec::new());
    };
    if !unit.is_ready() {
        return Ok(Vec::new());
    }

    let enemies: Vec<(&Unit, Position)> = roster
        .living(unit.team.opponent())
        .filter_map(|e| e.position.map(|p| (e, p)))
        .collect();
    let blocked = roster.occupied(Some(id));

    let here = evaluate_position(battlefield, unit, &enemies, &blocked, origin);

    let engaged: Vec<&Unit> = enemies
        .iter()
        .filter(|(_, p)| battlefield.is_adjacent(origin, *p))
        .map(|(e, _)| *e)
        .collect();
    if !engaged.is_empty() {
        tracing::trace!(unit = %id, engaged = engaged.len(), "Unit in contact, melee only");
        return Ok(engaged
            .into_iter()
            .map(|enemy| melee_action(unit, enemy, ActionKind::Melee { target: enemy.id }, false, here))
            .collect());
    }

    let mut actions = Vec::new();

    if unit.ranged_weapon().is_some() {
        for &(enemy, target_pos) in &enemies {
            let sightline = battlefield.line_of_sight(origin, target_pos);
            let shot = ShotContext::stationary(sightline);
            if let Some(p) = ranged_hit_probability(&unit.profile, &enemy.profile, &shot) {
                let kind = ActionKind::Shoot {
                    target: enemy.id,
                    sightline,
                };
                actions.push(ranged_action(unit, enemy, kind, p, here));
            }
        }
    }

    // The search borrows the graph while the battlefield's caches are
    // updated for each square it yields.
    let terrain = Arc::clone(battlefield.terrain());
    let budget = Fixed::from_num(unit.profile.movement);
    for (square, cost) in Reachable::new(&terrain, origin, budget, &blocked).skip(1) {
        let features = evaluate_position(battlefield, unit, &enemies, &blocked, square);

        let contacts: Vec<&Unit> = enemies
            .iter()
            .filter(|(_, p)| terrain.is_adjacent(square, *p))
            .map(|(e, _)| *e)
            .collect();
        if !contacts.is_empty() {
            for enemy in contacts {
                let kind = ActionKind::Charge {
                    destination: square,
                    cost,
                    target: enemy.id,
                };
                actions.push(melee_action(unit, enemy, kind, true, features));
            }
            continue;
        }

        actions.push(Action {
            unit: id,
            kind: ActionKind::Move {
                destination: square,
                cost,
            },
            hit_probability: None,
            expected_damage: 0.0,
            target_health: None,
            features,
        });

        if unit.ranged_weapon().is_some_and(|w| !w.is_heavy()) {
            for &(enemy, target_pos) in &enemies {
                let sightline = battlefield.line_of_sight(square, target_pos);
                let shot = ShotContext::after_move(cost, sightline);
                if let Some(p) = ranged_hit_probability(&unit.profile, &enemy.profile, &shot) {
                    let kind = ActionKind::SnapShot {
                        destination: square,
                        cost,
                        target: enemy.id,
                        sightline,
                    };
                    actions.push(ranged_action(unit, enemy, kind, p, features));
                }
            }
        }
    }

    tracing::debug!(unit = %id, count = actions.len(), "Generated actions");
    Ok(actions)
}

/// Threat counts for `unit` standing on `square`.
///
/// One sightline and one path search per enemy. The path is capped at the
/// larger of the two movement allowances and checked against each side's
/// allowance for the charge counts.
pub fn evaluate_position(
    battlefield: &mut Battlefield,
    unit: &Unit,
    enemies: &[(&Unit, Position)],
    blocked: &HashSet<Position>,
    square: Position,
) -> SituationalFeatures {
    let mut features = SituationalFeatures::default();
    let own_reach = unit.ranged_weapon().map(|w| w.max_range());
    let own_move = Fixed::from_num(unit.profile.movement);

    for &(enemy, target_pos) in enemies {
        let sightline = battlefield.line_of_sight(square, target_pos);
        if !sightline.is_blocked() {
            let distance = sightline.distance.to_num::<f64>();
            if own_reach.is_some_and(|r| distance <= r) {
                features.shootable_targets += 1;
            }
            if enemy.ranged_weapon().is_some_and(|w| distance <= w.max_range()) {
                features.can_shoot_back += 1;
            }
        }

        let enemy_move = Fixed::from_num(enemy.profile.movement);
        let cap = own_move.max(enemy_move);
        if let Some(path) = battlefield.astar_path(square, target_pos, Some(cap), blocked) {
            if path.cost() <= own_move {
                features.chargeable_targets += 1;
            }
            if path.cost() <= enemy_move {
                features.can_charge_back += 1;
            }
        }
    }

    features
}

fn ranged_action(
    unit: &Unit,
    enemy: &Unit,
    kind: ActionKind,
    hit_probability: f64,
    features: SituationalFeatures,
) -> Action {
    let expected_damage = unit.ranged_weapon().map_or(0.0, |w| {
        f64::from(w.attacks) * hit_probability * w.expected_damage(enemy.profile.armor)
    });
    Action {
        unit: unit.id,
        kind,
        hit_probability: Some(hit_probability),
        expected_damage,
        target_health: Some(enemy.health),
        features,
    }
}

fn melee_action(
    unit: &Unit,
    enemy: &Unit,
    kind: ActionKind,
    charging: bool,
    features: SituationalFeatures,
) -> Action {
    let p = melee_hit_probability(&unit.profile, &enemy.profile, charging);
    let weapon = &unit.profile.melee_weapon;
    Action {
        unit: unit.id,
        kind,
        hit_probability: Some(p),
        expected_damage: f64::from(weapon.attacks) * p * weapon.expected_damage(enemy.profile.armor),
        target_health: Some(enemy.health),
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionTag;
    use crate::terrain::TerrainCell;
    use crate::unit::{UnitProfile, UnitStatus};
    use crate::weapon::{DamageRange, Weapon, WeaponCategory};

    fn profile(ranged: Option<Weapon>) -> UnitProfile {
        UnitProfile {
            name: "Trooper".into(),
            movement: 3,
            ranged_skill: 55,
            ranged_consistency: 15,
            melee_skill: 45,
            melee_consistency: 15,
            dodge: 60,
            armor: 2,
            max_health: 6,
            melee_weapon: Weapon::melee("Knife", 1, DamageRange::new(2, 3)),
            ranged_weapon: ranged,
        }
    }

    fn rifle() -> Weapon {
        Weapon::ranged("Rifle", WeaponCategory::Standard, 18, 1, 0, DamageRange::new(2, 4))
    }

    fn heavy() -> Weapon {
        Weapon::ranged("Cannon", WeaponCategory::Heavy, 24, 3, 1, DamageRange::new(3, 5))
    }

    fn open(width: i32, height: i32) -> Battlefield {
        Battlefield::build(width, height, |_, _| TerrainCell::OPEN).unwrap()
    }

    fn skirmish(shooter: UnitProfile, at: (i32, i32), enemy_at: (i32, i32)) -> (Roster, UnitId) {
        let mut roster = Roster::new("Red", "Blue");
        let id = roster.spawn(TeamId::One, shooter, at.into()).unwrap();
        roster.spawn(TeamId::Two, profile(Some(rifle())), enemy_at.into()).unwrap();
        (roster, id)
    }

    #[test]
    fn test_melee_priority() {
        let mut bf = open(10, 10);
        let (roster, id) = skirmish(profile(Some(rifle())), (4, 4), (5, 5));
        let actions = generate_unit_actions(&mut bf, &roster, id).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind.tag(), ActionTag::Melee);
        assert_eq!(actions[0].target(), Some(UnitId(1)));
    }

    #[test]
    fn test_shoot_move_and_snap_shot() {
        let mut bf = open(12, 5);
        let (roster, id) = skirmish(profile(Some(rifle())), (0, 2), (11, 2));
        let actions = generate_unit_actions(&mut bf, &roster, id).unwrap();

        let count = |tag| actions.iter().filter(|a| a.kind.tag() == tag).count();
        assert_eq!(count(ActionTag::Shoot), 1);
        assert!(count(ActionTag::Move) > 0);
        assert_eq!(count(ActionTag::SnapShot), count(ActionTag::Move));
        assert_eq!(count(ActionTag::Charge), 0);
        assert!(actions
            .iter()
            .all(|a| a.destination() != Some(Position::new(0, 2))));
        assert!(actions
            .iter()
            .filter_map(|a| a.destination())
            .all(|p| p.x <= 3));
    }

    #[test]
    fn test_heavy_weapon_has_no_snap_shots() {
        let mut bf = open(12, 5);
        let (roster, id) = skirmish(profile(Some(heavy())), (0, 2), (11, 2));
        let actions = generate_unit_actions(&mut bf, &roster, id).unwrap();
        assert!(actions.iter().any(|a| a.kind.tag() == ActionTag::Shoot));
        assert!(actions.iter().all(|a| a.kind.tag() != ActionTag::SnapShot));
    }

    #[test]
    fn test_charge_when_reachable_square_touches_enemy() {
        let mut bf = open(10, 3);
        let (roster, id) = skirmish(profile(None), (0, 1), (3, 1));
        let actions = generate_unit_actions(&mut bf, &roster, id).unwrap();
        let charges: Vec<_> = actions
            .iter()
            .filter(|a| a.kind.tag() == ActionTag::Charge)
            .collect();
        assert!(!charges.is_empty());
        for charge in &charges {
            let dest = charge.destination().unwrap();
            assert_eq!(dest.chebyshev(Position::new(3, 1)), 1);
            assert!(charge.hit_probability.unwrap() > 0.5);
        }
        // No plain move ends next to the enemy
        assert!(actions
            .iter()
            .filter(|a| a.kind.tag() == ActionTag::Move)
            .all(|a| a.destination().unwrap().chebyshev(Position::new(3, 1)) > 1));
    }

    #[test]
    fn test_occupied_squares_not_entered() {
        let mut bf = open(5, 1);
        let mut roster = Roster::new("Red", "Blue");
        let id = roster
            .spawn(TeamId::One, profile(None), Position::new(0, 0))
            .unwrap();
        roster
            .spawn(TeamId::One, profile(None), Position::new(1, 0))
            .unwrap();
        roster
            .spawn(TeamId::Two, profile(None), Position::new(4, 0))
            .unwrap();
        assert!(generate_unit_actions(&mut bf, &roster, id).unwrap().is_empty());
    }

    #[test]
    fn test_activated_unit_has_no_actions() {
        let mut bf = open(10, 10);
        let (mut roster, id) = skirmish(profile(Some(rifle())), (0, 0), (9, 9));
        roster.get_mut(id).unwrap().status = UnitStatus::Activated;
        assert!(generate_unit_actions(&mut bf, &roster, id).unwrap().is_empty());
    }

    #[test]
    fn test_features_counts() {
        let mut bf = open(10, 3);
        let (roster, id) = skirmish(profile(Some(rifle())), (0, 1), (4, 1));
        let unit = roster.get(id).unwrap();
        let enemy = roster.get(UnitId(1)).unwrap();
        let enemies = vec![(enemy, Position::new(4, 1))];
        let blocked = roster.occupied(Some(id));

        let near = evaluate_position(&mut bf, unit, &enemies, &blocked, Position::new(1, 1));
        assert_eq!(near.shootable_targets, 1);
        assert_eq!(near.can_shoot_back, 1);
        assert_eq!(near.chargeable_targets, 1);
        assert_eq!(near.can_charge_back, 1);

        let far = evaluate_position(&mut bf, unit, &enemies, &blocked, Position::new(0, 1));
        assert_eq!(far.chargeable_targets, 0);
    }

    #[test]
    fn test_team_actions_cover_ready_units() {
        let mut bf = open(10, 10);
        let mut roster = Roster::new("Red", "Blue");
        let a = roster.spawn(TeamId::One, profile(None), Position::new(0, 0)).unwrap();
        let b = roster.spawn(TeamId::One, profile(None), Position::new(0, 9)).unwrap();
        roster.spawn(TeamId::Two, profile(None), Position::new(9, 5)).unwrap();
        roster.get_mut(b).unwrap().status = UnitStatus::Activated;

        let actions = generate_team_actions(&mut bf, &roster, TeamId::One).unwrap();
        assert!(!actions.is_empty());
        assert!(actions.iter().all(|act| act.unit == a));
    }
}
