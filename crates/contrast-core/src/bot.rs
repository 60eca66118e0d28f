//! AI opponent for Contrast.
//!
//! Monte-Carlo search: every simulation picks a root action by UCB1, plays
//! the rest of the game out with random legal actions and scores the result
//! from the searching side's point of view (win 1, draw 0, loss -1).

use crate::board::Player;
use crate::codec::ActionId;
use crate::game::ContrastGame;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Tunable search parameters, loadable from the engine's model file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// UCB1 exploration constant
    pub exploration: f64,
    /// Rollouts that run longer than this many plies count as a draw
    pub rollout_limit: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            exploration: 1.4,
            rollout_limit: 200,
        }
    }
}

/// Chosen action with the searcher's evaluation in `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub action: ActionId,
    /// Expected result for the side that searched (1 = certain win)
    pub value: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ArmStats {
    visits: u32,
    total: f64,
}

impl ArmStats {
    fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total / self.visits as f64
        }
    }

    fn ucb1(&self, exploration: f64, parent_visits: u32) -> f64 {
        if self.visits == 0 {
            return f64::INFINITY;
        }
        let explore = exploration * ((parent_visits as f64).ln() / self.visits as f64).sqrt();
        self.mean() + explore
    }
}

/// A bot that searches the current position
pub struct Searcher {
    pub params: SearchParams,
    rng: StdRng,
}

impl Searcher {
    pub fn new(params: SearchParams) -> Self {
        Self {
            params,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(params: SearchParams, seed: u64) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Search with `simulations` rollouts. `None` when the side to move has
    /// no legal action.
    pub fn search(&mut self, game: &ContrastGame, simulations: u32) -> Option<SearchOutcome> {
        let actions = game.legal_actions();
        if actions.is_empty() {
            return None;
        }
        let me = game.current_player();

        // Take an immediate win without searching
        for &action in &actions {
            let mut next = game.clone();
            next.apply_unchecked(action);
            if next.is_finished() && next.winner() == Some(me) {
                return Some(SearchOutcome { action, value: 1.0 });
            }
        }

        let mut arms = vec![ArmStats::default(); actions.len()];
        let budget = simulations.max(1);
        for played in 1..=budget {
            let pick = self.select_arm(&arms, played);
            let mut rollout = game.clone();
            rollout.apply_unchecked(actions[pick]);
            let reward = self.playout(rollout, me);
            arms[pick].visits += 1;
            arms[pick].total += reward;
        }

        // Most visited arm, ties broken by mean reward
        let (best, stats) = arms
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.visits
                    .cmp(&b.visits)
                    .then(a.mean().total_cmp(&b.mean()))
            })?;

        Some(SearchOutcome {
            action: actions[best],
            value: stats.mean().clamp(-1.0, 1.0) as f32,
        })
    }

    fn select_arm(&mut self, arms: &[ArmStats], parent_visits: u32) -> usize {
        let unvisited: Vec<usize> = arms
            .iter()
            .enumerate()
            .filter(|(_, arm)| arm.visits == 0)
            .map(|(i, _)| i)
            .collect();
        if let Some(&pick) = unvisited.choose(&mut self.rng) {
            return pick;
        }

        let exploration = self.params.exploration;
        arms.iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.ucb1(exploration, parent_visits)
                    .total_cmp(&b.ucb1(exploration, parent_visits))
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn playout(&mut self, mut game: ContrastGame, me: Player) -> f64 {
        let mut plies = 0;
        while !game.is_finished() && plies < self.params.rollout_limit {
            let actions = game.legal_actions();
            let Some(&action) = actions.choose(&mut self.rng) else {
                break;
            };
            game.apply_unchecked(action);
            plies += 1;
        }

        match game.winner() {
            Some(winner) if game.is_finished() && winner == me => 1.0,
            Some(_) if game.is_finished() => -1.0,
            _ => 0.0,
        }
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(SearchParams::default())
    }
}
