//! Turn orchestration.
//!
//! Each turn every living unit is readied, then the teams take steps in
//! alternation starting with team one. In a step the team's policy picks
//! one action from the candidates of all its ready units; the action is
//! resolved and committed before anything else is generated. A team with
//! no candidates passes. Two passes in a row end the turn.
//!
//! After every turn the game is over if a team has been wiped out or the
//! turn limit is reached. The stronger team (total remaining health) wins;
//! equal strength is a draw.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind};
use crate::battlefield::{Battlefield, CacheStats, DEFAULT_CACHE_CAPACITY};
use crate::combat::{resolve_melee, resolve_ranged, CombatOutcome, ShotContext};
use crate::error::{GameError, Result};
use crate::generator::{generate_team_actions, generate_unit_actions};
use crate::grid::Position;
use crate::policy::DecisionPolicy;
use crate::replay::{TurnObserver, UnitSnapshot};
use crate::unit::{Roster, TeamId, UnitId, UnitProfile, UnitStatus};

/// Per-game settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Turns played before the game is decided on strength.
    pub max_turns: u32,
    /// Seed for combat rolls.
    pub seed: u64,
    /// Entries per spatial cache before it is cleared.
    pub cache_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_turns: 12,
            seed: 0,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl GameConfig {
    /// Same settings with a different seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Same settings with a different turn limit.
    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Parse from RON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ConfigParse`] on malformed input.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::ConfigParse(e.to_string()))
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// One team came out stronger.
    Victory(TeamId),
    /// Equal strength at the end.
    Draw,
}

/// Final numbers of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    /// Combat seed.
    pub seed: u64,
    /// Outcome.
    pub result: GameResult,
    /// Turns played.
    pub turns: u32,
    /// Actions resolved over the whole game.
    pub actions: u64,
    /// Remaining health per team.
    pub strength: [u32; 2],
    /// Living units per team.
    pub survivors: [usize; 2],
    /// Final [`Game::state_hash`].
    pub state_hash: u64,
    /// Spatial cache counters.
    pub cache: CacheStats,
}

/// Place two squads in the default deployment: team one down the left
/// edge from the top, team two up the right edge from the bottom.
///
/// # Errors
///
/// Returns [`GameError::OutOfBounds`] if a squad is longer than the
/// battlefield is high, [`GameError::InvalidTerrain`] if a deployment square
/// is impassable, [`GameError::InvalidMoveDestination`] if the two squads
/// overlap on a narrow battlefield, or [`GameError::InvalidProfile`] for a
/// bad profile.
pub fn deploy(
    battlefield: &Battlefield,
    names: [&str; 2],
    squads: [&[UnitProfile]; 2],
) -> Result<Roster> {
    let mut roster = Roster::new(names[0], names[1]);
    let (width, height) = (battlefield.width(), battlefield.height());
    for team in TeamId::ALL {
        for (i, profile) in squads[team.index()].iter().enumerate() {
            let i = i as i32;
            let pos = match team {
                TeamId::One => Position::new(0, i),
                TeamId::Two => Position::new(width - 1, height - 1 - i),
            };
            if !battlefield.contains(pos) {
                return Err(GameError::OutOfBounds(pos));
            }
            if !battlefield.terrain().is_passable(pos) {
                return Err(GameError::InvalidTerrain {
                    position: pos,
                    reason: "deployment square is impassable".into(),
                });
            }
            roster.spawn(team, profile.clone(), pos)?;
        }
    }
    Ok(roster)
}

/// One skirmish: battlefield, units, the two policies and the dice.
pub struct Game {
    battlefield: Battlefield,
    roster: Roster,
    policies: [Box<dyn DecisionPolicy>; 2],
    rng: ChaCha8Rng,
    config: GameConfig,
    turn: u32,
    actions: u64,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("turn", &self.turn)
            .field("actions", &self.actions)
            .field("policies", &[self.policies[0].name(), self.policies[1].name()])
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Set up a game. Policies are indexed by [`TeamId::index`].
    #[must_use]
    pub fn new(
        battlefield: Battlefield,
        roster: Roster,
        policies: [Box<dyn DecisionPolicy>; 2],
        config: GameConfig,
    ) -> Self {
        Self {
            battlefield: battlefield.with_cache_capacity(config.cache_capacity),
            roster,
            policies,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            turn: 0,
            actions: 0,
        }
    }

    /// The battlefield, for read-only queries.
    #[must_use]
    pub const fn battlefield(&self) -> &Battlefield {
        &self.battlefield
    }

    /// All units.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Turns completed so far.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Actions resolved so far.
    #[must_use]
    pub const fn actions_resolved(&self) -> u64 {
        self.actions
    }

    /// Candidates for one unit in the current state, for previews.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownUnit`] for a handle not in the roster.
    pub fn legal_actions(&mut self, unit: UnitId) -> Result<Vec<Action>> {
        generate_unit_actions(&mut self.battlefield, &self.roster, unit)
    }

    /// The outcome, once the game is over.
    #[must_use]
    pub fn result(&self) -> Option<GameResult> {
        let wiped = TeamId::ALL.iter().any(|&t| self.roster.is_eliminated(t));
        if !wiped && self.turn < self.config.max_turns {
            return None;
        }
        let one = self.roster.strength(TeamId::One);
        let two = self.roster.strength(TeamId::Two);
        Some(match one.cmp(&two) {
            std::cmp::Ordering::Greater => GameResult::Victory(TeamId::One),
            std::cmp::Ordering::Less => GameResult::Victory(TeamId::Two),
            std::cmp::Ordering::Equal => GameResult::Draw,
        })
    }

    /// Play until decided.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Game::play_turn`].
    pub fn run(&mut self) -> Result<GameSummary> {
        self.run_observed(&mut ())
    }

    /// Play until decided, reporting every action to `observer`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Game::play_turn`].
    pub fn run_observed(&mut self, observer: &mut dyn TurnObserver) -> Result<GameSummary> {
        tracing::info!(
            seed = self.config.seed,
            units = self.roster.len(),
            width = self.battlefield.width(),
            height = self.battlefield.height(),
            "Game start"
        );
        let result = loop {
            if let Some(result) = self.result() {
                break result;
            }
            self.play_turn(observer)?;
        };
        let summary = self.summary(result);
        tracing::info!(
            seed = summary.seed,
            result = ?summary.result,
            turns = summary.turns,
            actions = summary.actions,
            "Game over"
        );
        Ok(summary)
    }

    /// Play one full turn and return how many actions were resolved.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidPolicyChoice`] if a policy picks outside
    /// the candidate list, or any error from applying the chosen action.
    pub fn play_turn(&mut self, observer: &mut dyn TurnObserver) -> Result<u32> {
        self.roster.ready_up();
        tracing::debug!(turn = self.turn, "Turn start");

        let mut team = TeamId::One;
        let mut passes = 0;
        let mut resolved = 0;
        while passes < 2 {
            let candidates = generate_team_actions(&mut self.battlefield, &self.roster, team)?;
            if candidates.is_empty() {
                passes += 1;
            } else {
                passes = 0;
                let index = self.policies[team.index()].select(&candidates);
                let action = candidates.get(index).ok_or(GameError::InvalidPolicyChoice {
                    index,
                    candidates: candidates.len(),
                })?;
                self.apply_action(action)?;
                self.policies[team.opponent().index()].observe_opponent_action(action);
                observer.on_action(self.turn, action, &self.roster.snapshots());
                resolved += 1;

                if self.roster.is_eliminated(team.opponent()) {
                    tracing::debug!(turn = self.turn, team = %team.opponent(), "Team eliminated");
                    break;
                }
            }
            team = team.opponent();
        }

        self.actions += u64::from(resolved);
        observer.on_turn_end(self.turn, &self.roster.snapshots());
        tracing::debug!(turn = self.turn, actions = resolved, "Turn end");
        self.turn += 1;
        Ok(resolved)
    }

    /// Resolve one action and spend the unit's activation.
    ///
    /// Returns the combat outcome for attacks, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if the unit is not ready,
    /// [`GameError::OutOfBounds`] or [`GameError::InvalidMoveDestination`]
    /// for a bad destination, or [`GameError::UnknownUnit`] for a bad handle.
    pub fn apply_action(&mut self, action: &Action) -> Result<Option<CombatOutcome>> {
        let id = action.unit;
        if !self.roster.get(id)?.is_ready() {
            return Err(GameError::InvalidState(format!("unit {id} is not ready to act")));
        }

        let outcome = match action.kind {
            ActionKind::NoAction => None,
            ActionKind::Move { destination, .. } => {
                self.move_unit(id, destination)?;
                None
            }
            ActionKind::Shoot { target, sightline } => {
                let ctx = ShotContext::stationary(sightline);
                Some(resolve_ranged(&mut self.roster, id, target, &ctx, &mut self.rng)?)
            }
            ActionKind::Melee { target } => {
                Some(resolve_melee(&mut self.roster, id, target, false, &mut self.rng)?)
            }
            ActionKind::SnapShot {
                destination,
                cost,
                target,
                sightline,
            } => {
                self.move_unit(id, destination)?;
                let ctx = ShotContext::after_move(cost, sightline);
                Some(resolve_ranged(&mut self.roster, id, target, &ctx, &mut self.rng)?)
            }
            ActionKind::Charge {
                destination, target, ..
            } => {
                self.move_unit(id, destination)?;
                Some(resolve_melee(&mut self.roster, id, target, true, &mut self.rng)?)
            }
        };

        let unit = self.roster.get_mut(id)?;
        if unit.is_alive() {
            unit.status = UnitStatus::Activated;
        }
        tracing::trace!(unit = %id, kind = ?action.kind.tag(), "Action applied");
        Ok(outcome)
    }

    fn move_unit(&mut self, id: UnitId, destination: Position) -> Result<()> {
        if !self.battlefield.contains(destination) {
            return Err(GameError::OutOfBounds(destination));
        }
        if !self.battlefield.terrain().is_passable(destination) {
            return Err(GameError::InvalidMoveDestination {
                unit: id,
                destination,
                reason: "impassable".into(),
            });
        }
        if let Some(other) = self.roster.unit_at(destination).filter(|&o| o != id) {
            return Err(GameError::InvalidMoveDestination {
                unit: id,
                destination,
                reason: format!("occupied by {other}"),
            });
        }
        self.roster.get_mut(id)?.position = Some(destination);
        Ok(())
    }

    /// Every unit's current state.
    #[must_use]
    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.roster.snapshots()
    }

    /// Put units back to a recorded state and set the turn counter.
    ///
    /// # Errors
    ///
    /// See [`Roster::restore`].
    pub fn restore_snapshots(&mut self, turn: u32, snapshots: &[UnitSnapshot]) -> Result<()> {
        self.roster.restore(snapshots)?;
        self.turn = turn;
        Ok(())
    }

    /// Hash of the turn counter and every unit's state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.turn.hash(&mut hasher);
        for snapshot in self.roster.snapshots() {
            snapshot.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn summary(&self, result: GameResult) -> GameSummary {
        GameSummary {
            seed: self.config.seed,
            result,
            turns: self.turn,
            actions: self.actions,
            strength: TeamId::ALL.map(|t| self.roster.strength(t)),
            survivors: TeamId::ALL.map(|t| self.roster.living(t).count()),
            state_hash: self.state_hash(),
            cache: self.battlefield.cache_stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionTag, SituationalFeatures};
    use crate::policy::{FirstChoicePolicy, RandomPolicy};
    use crate::terrain::TerrainCell;
    use crate::weapon::{DamageRange, Weapon, WeaponCategory};

    fn trooper() -> UnitProfile {
        UnitProfile {
            name: "Trooper".into(),
            movement: 6,
            ranged_skill: 55,
            ranged_consistency: 15,
            melee_skill: 45,
            melee_consistency: 15,
            dodge: 50,
            armor: 1,
            max_health: 6,
            melee_weapon: Weapon::melee("Knife", 1, DamageRange::new(2, 3)),
            ranged_weapon: Some(Weapon::ranged(
                "Rifle",
                WeaponCategory::Standard,
                12,
                2,
                0,
                DamageRange::new(3, 4),
            )),
        }
    }

    fn open(width: i32, height: i32) -> Battlefield {
        Battlefield::build(width, height, |_, _| TerrainCell::OPEN).unwrap()
    }

    fn game(seed: u64) -> Game {
        let bf = open(12, 8);
        let squad = vec![trooper(); 3];
        let roster = deploy(&bf, ["Red", "Blue"], [&squad, &squad]).unwrap();
        Game::new(
            bf,
            roster,
            [Box::new(RandomPolicy::new(seed)), Box::new(RandomPolicy::new(seed + 1))],
            GameConfig::default().with_seed(seed),
        )
    }

    #[test]
    fn test_deploy_positions() {
        let bf = open(10, 6);
        let squad = vec![trooper(); 2];
        let roster = deploy(&bf, ["Red", "Blue"], [&squad, &squad]).unwrap();
        let positions: Vec<_> = roster.units().map(|u| u.position.unwrap()).collect();
        assert_eq!(
            positions,
            vec![
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(9, 5),
                Position::new(9, 4)
            ]
        );
    }

    #[test]
    fn test_deploy_too_many_units() {
        let bf = open(10, 2);
        let squad = vec![trooper(); 3];
        assert!(matches!(
            deploy(&bf, ["Red", "Blue"], [&squad, &[]]),
            Err(GameError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_deploy_rejects_overlapping_squads() {
        // One column wide: both teams deploy down the same edge
        let bf = open(1, 2);
        let squad = vec![trooper(); 2];
        assert!(matches!(
            deploy(&bf, ["Red", "Blue"], [&squad, &squad]),
            Err(GameError::InvalidMoveDestination { .. })
        ));

        let single = vec![trooper()];
        let roster = deploy(&bf, ["Red", "Blue"], [&single, &single]).unwrap();
        assert_eq!(roster.occupied(None).len(), 2);
    }

    #[test]
    fn test_config_from_ron() {
        let config = GameConfig::from_ron("(max_turns: 5, seed: 9)").unwrap();
        assert_eq!(config.max_turns, 5);
        assert_eq!(config.seed, 9);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert!(matches!(
            GameConfig::from_ron("(max_turns: )"),
            Err(GameError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_every_unit_acts_at_most_once_per_turn() {
        let mut game = game(4);
        let resolved = game.play_turn(&mut ()).unwrap();
        assert!(resolved >= 1);
        assert!(resolved <= 6);
        assert_eq!(game.turn(), 1);
        for unit in game.roster().units() {
            assert_ne!(unit.status, UnitStatus::Ready);
        }
    }

    #[test]
    fn test_run_finishes() {
        let mut game = game(7);
        let summary = game.run().unwrap();
        assert!(summary.turns <= 12);
        assert!(game.result().is_some());
        if summary.turns < 12 {
            assert!(summary.survivors.contains(&0));
        }
        let expected = match summary.strength[0].cmp(&summary.strength[1]) {
            std::cmp::Ordering::Greater => GameResult::Victory(TeamId::One),
            std::cmp::Ordering::Less => GameResult::Victory(TeamId::Two),
            std::cmp::Ordering::Equal => GameResult::Draw,
        };
        assert_eq!(summary.result, expected);
    }

    #[test]
    fn test_same_seed_same_game() {
        let a = game(21).run().unwrap();
        let b = game(21).run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_policy_index() {
        struct OutOfRange;
        impl DecisionPolicy for OutOfRange {
            fn select(&mut self, candidates: &[Action]) -> usize {
                candidates.len()
            }
            fn name(&self) -> &str {
                "broken"
            }
        }
        let bf = open(6, 3);
        let squad = vec![trooper()];
        let roster = deploy(&bf, ["Red", "Blue"], [&squad, &squad]).unwrap();
        let mut game = Game::new(
            bf,
            roster,
            [Box::new(OutOfRange), Box::new(FirstChoicePolicy)],
            GameConfig::default(),
        );
        assert!(matches!(
            game.play_turn(&mut ()),
            Err(GameError::InvalidPolicyChoice { .. })
        ));
    }

    #[test]
    fn test_move_into_occupied_square_rejected() {
        let mut game = game(1);
        let action = Action {
            unit: UnitId(0),
            kind: ActionKind::Move {
                destination: Position::new(0, 1),
                cost: crate::math::Fixed::ONE,
            },
            hit_probability: None,
            expected_damage: 0.0,
            target_health: None,
            features: SituationalFeatures::default(),
        };
        assert!(matches!(
            game.apply_action(&action),
            Err(GameError::InvalidMoveDestination { .. })
        ));
    }

    #[test]
    fn test_hold_spends_activation() {
        let mut game = game(1);
        let hold = Action::hold(UnitId(0), SituationalFeatures::default());
        assert_eq!(hold.kind.tag(), ActionTag::NoAction);
        assert!(game.apply_action(&hold).unwrap().is_none());
        assert_eq!(game.roster().get(UnitId(0)).unwrap().status, UnitStatus::Activated);
        assert!(matches!(
            game.apply_action(&hold),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_restore_snapshots() {
        let mut game = game(5);
        let start = game.snapshots();
        let start_hash = game.state_hash();
        game.play_turn(&mut ()).unwrap();
        game.restore_snapshots(0, &start).unwrap();
        assert_eq!(game.state_hash(), start_hash);
    }
}
