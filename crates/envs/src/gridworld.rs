//! Deterministic gridworlds and the hand-drawn reward family used to
//! illustrate which rewards are equivalent.

use crate::env::Env;
use canon::tabular::{grid_to_3d, shape};
use canon::{EnvSpec, Result, RewardModel, Space, TabularReward};
use ndarray::{arr2, Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stay, up, down, left, right.
pub const N_ACTIONS: usize = 5;

const MOVES: [(isize, isize); N_ACTIONS] = [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)];

/// `height x width` grid, states numbered row-major. Moves into a wall
/// leave the agent in place.
#[derive(Debug, Clone)]
pub struct Gridworld {
    width: usize,
    height: usize,
    spec: EnvSpec,
}

impl Gridworld {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            width,
            height,
            spec: EnvSpec::tabular(width * height, N_ACTIONS),
        }
    }

    pub fn n_states(&self) -> usize {
        self.width * self.height
    }

    pub fn state(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    pub fn coords(&self, state: usize) -> (usize, usize) {
        (state / self.width, state % self.width)
    }

    pub fn next_state(&self, state: usize, action: usize) -> usize {
        let (row, col) = self.coords(state);
        let (dr, dc) = MOVES[action % N_ACTIONS];
        let row = row.saturating_add_signed(dr).min(self.height - 1);
        let col = col.saturating_add_signed(dc).min(self.width - 1);
        self.state(row, col)
    }

    /// One-hot `T[s, a, s']`.
    pub fn dynamics(&self) -> Array3<f64> {
        let n = self.n_states();
        let mut t = Array3::zeros((n, N_ACTIONS, n));
        for s in 0..n {
            for a in 0..N_ACTIONS {
                t[[s, a, self.next_state(s, a)]] = 1.0;
            }
        }
        t
    }
}

impl Env for Gridworld {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn initial_state(&self, _rng: &mut fastrand::Rng) -> Vec<f64> {
        Space::point(0)
    }

    fn sample_state(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        Space::point(rng.usize(..self.n_states()))
    }

    fn sample_action(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        Space::point(rng.usize(..N_ACTIONS))
    }

    fn transition(&self, state: &[f64], action: &[f64], _rng: &mut fastrand::Rng) -> (Vec<f64>, bool) {
        let s = state[0] as usize;
        let a = action[0] as usize;
        (Space::point(self.next_state(s, a)), false)
    }

    fn transition_table(&self) -> Option<Array3<f64>> {
        let mass = 1.0 / (self.n_states() * N_ACTIONS) as f64;
        Some(self.dynamics().mapv(|p| p * mass))
    }
}

/// State-only reward drawn on the grid, shaped by a grid potential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridReward {
    pub state_reward: Array2<f64>,
    pub potential: Array2<f64>,
}

impl GridReward {
    pub fn unshaped(state_reward: Array2<f64>) -> Self {
        let potential = Array2::zeros(state_reward.dim());
        Self {
            state_reward,
            potential,
        }
    }

    /// `R[s, a, s']` under the given discount.
    pub fn table(&self, discount: f64) -> Result<Array3<f64>> {
        let base = grid_to_3d(&self.state_reward, N_ACTIONS);
        let potential: Array1<f64> = self.potential.iter().copied().collect();
        shape(&base, &potential, discount)
    }

    pub fn model(&self, discount: f64) -> Result<Arc<dyn RewardModel>> {
        Ok(Arc::new(TabularReward::new(self.table(discount)?)?))
    }
}

fn distance_to_corner() -> Array2<f64> {
    Array2::from_shape_fn((3, 3), |(r, c)| ((2 - r) + (2 - c)) as f64)
}

/// Rewards on a 3x3 grid with the goal in the bottom-right corner.
///
/// `sparse_goal`, `dense_goal` and `transformed_goal` are equivalent; the
/// others are not.
pub fn named_rewards() -> Vec<(&'static str, GridReward)> {
    let goal = arr2(&[[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
    vec![
        ("all_zero", GridReward::unshaped(Array2::zeros((3, 3)))),
        ("sparse_goal", GridReward::unshaped(goal.clone())),
        (
            "dense_goal",
            GridReward {
                state_reward: goal.clone(),
                potential: distance_to_corner().mapv(|d| -d),
            },
        ),
        (
            "transformed_goal",
            GridReward {
                state_reward: goal.mapv(|g| 10.0 * g - 1.0),
                potential: distance_to_corner().mapv(|d| -5.0 * d),
            },
        ),
        (
            "center_goal",
            GridReward::unshaped(arr2(&[[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]])),
        ),
        ("sparse_penalty", GridReward::unshaped(goal.mapv(|g| -g))),
        (
            "dirt_path",
            GridReward::unshaped(arr2(&[[0.0, 0.0, 0.0], [-0.5, -0.5, 0.0], [-0.5, -0.5, 1.0]])),
        ),
        (
            "cliff_walk",
            GridReward::unshaped(arr2(&[[0.0, 0.0, 0.0], [-4.0, -4.0, 0.0], [0.0, 0.0, 1.0]])),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walls_block_moves() {
        let g = Gridworld::new(3, 3);
        assert_eq!(g.next_state(0, 1), 0);
        assert_eq!(g.next_state(0, 3), 0);
        assert_eq!(g.next_state(0, 4), 1);
        assert_eq!(g.next_state(0, 2), 3);
        assert_eq!(g.next_state(8, 2), 8);
        assert_eq!(g.next_state(4, 0), 4);
    }

    #[test]
    fn dynamics_rows_are_distributions() {
        let t = Gridworld::new(2, 3).dynamics();
        for s in 0..6 {
            for a in 0..N_ACTIONS {
                let row: f64 = (0..6).map(|n| t[[s, a, n]]).sum();
                assert!((row - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn grid_rewards_round_trip_through_json() {
        let (_, reward) = named_rewards().swap_remove(2);
        let text = serde_json::to_string(&reward).unwrap();
        let back: GridReward = serde_json::from_str(&text).unwrap();
        assert_eq!(back, reward);
    }
}
