use crate::env::{categorical, Env};
use canon::{EnvSpec, Result, Space, TableSampler, TabularReward};
use ndarray::{Array1, Array2, Array3};

/// Finite MDP with random sparse dynamics.
#[derive(Debug, Clone)]
pub struct RandomMdp {
    spec: EnvSpec,
    dynamics: Array3<f64>,
    initial: Array1<f64>,
}

impl RandomMdp {
    /// Each `(s, a)` leads to at most `branching` successors with random
    /// probabilities.
    pub fn new(n_states: usize, n_actions: usize, branching: usize, rng: &mut fastrand::Rng) -> Self {
        let branching = branching.clamp(1, n_states);
        let mut dynamics = Array3::zeros((n_states, n_actions, n_states));
        for s in 0..n_states {
            for a in 0..n_actions {
                let mut successors: Vec<usize> = (0..n_states).collect();
                rng.shuffle(&mut successors);
                let weights: Vec<f64> = (0..branching).map(|_| rng.f64() + 0.1).collect();
                let total: f64 = weights.iter().sum();
                for (next, w) in successors.iter().zip(&weights) {
                    dynamics[[s, a, *next]] = w / total;
                }
            }
        }
        let initial = Array1::from_shape_fn(n_states, |_| rng.f64() + 0.1);
        let initial = &initial / initial.sum();
        Self {
            spec: EnvSpec::tabular(n_states, n_actions),
            dynamics,
            initial,
        }
    }

    pub fn dynamics(&self) -> &Array3<f64> {
        &self.dynamics
    }

    pub fn n_states(&self) -> usize {
        self.dynamics.dim().0
    }

    pub fn n_actions(&self) -> usize {
        self.dynamics.dim().1
    }

    /// Uniform states and actions pushed through the dynamics.
    pub fn sampler(&self) -> Result<TableSampler> {
        let (n_states, n_actions) = (self.n_states(), self.n_actions());
        let d = Array1::from_elem(n_states, 1.0 / n_states as f64);
        let pi = Array2::from_elem((n_states, n_actions), 1.0 / n_actions as f64);
        TableSampler::from_dynamics(&d, &pi, &self.dynamics)
    }

    /// Reward with independent uniform `[-1, 1)` entries.
    pub fn random_reward(&self, rng: &mut fastrand::Rng) -> Result<TabularReward> {
        let (n_states, n_actions) = (self.n_states(), self.n_actions());
        TabularReward::new(Array3::from_shape_fn((n_states, n_actions, n_states), |_| {
            rng.f64() * 2.0 - 1.0
        }))
    }
}

impl Env for RandomMdp {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn initial_state(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        Space::point(categorical(self.initial.iter().copied(), rng))
    }

    fn sample_state(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        Space::point(rng.usize(..self.n_states()))
    }

    fn sample_action(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        Space::point(rng.usize(..self.n_actions()))
    }

    fn transition(&self, state: &[f64], action: &[f64], rng: &mut fastrand::Rng) -> (Vec<f64>, bool) {
        let (s, a) = (state[0] as usize, action[0] as usize);
        let row = (0..self.n_states()).map(|next| self.dynamics[[s, a, next]]);
        (Space::point(categorical(row, rng)), false)
    }

    fn transition_table(&self) -> Option<Array3<f64>> {
        let (n_states, n_actions) = (self.n_states(), self.n_actions());
        let mass = 1.0 / (n_states * n_actions) as f64;
        Some(self.dynamics.mapv(|p| p * mass))
    }
}
