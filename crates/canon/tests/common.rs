#![allow(dead_code)]

use canon::{
    CanonConfig, EnvSpec, OptimizerConfig, RewardModel, Space, TableSampler, TabularReward,
    Trajectory, TrajectorySampler, Transition, TransitionSampler,
};
use ndarray::{Array1, Array2, Array3};
use std::sync::Arc;

pub fn random_table(n_states: usize, n_actions: usize, rng: &mut fastrand::Rng) -> Array3<f64> {
    Array3::from_shape_fn((n_states, n_actions, n_states), |_| rng.f64() * 2.0 - 1.0)
}

pub fn random_potential(n_states: usize, rng: &mut fastrand::Rng) -> Array1<f64> {
    Array1::from_shape_fn(n_states, |_| rng.f64() * 4.0 - 2.0)
}

pub fn tabular(table: Array3<f64>) -> Arc<dyn RewardModel> {
    Arc::new(TabularReward::new(table).unwrap())
}

/// Action 0 steps left, action 1 steps right; 20% of the time the agent
/// stays put. Uniform start states and policy.
pub fn chain_dynamics(n_states: usize) -> Array3<f64> {
    let mut t = Array3::zeros((n_states, 2, n_states));
    for s in 0..n_states {
        let left = s.saturating_sub(1);
        let right = (s + 1).min(n_states - 1);
        t[[s, 0, left]] += 0.8;
        t[[s, 1, right]] += 0.8;
        t[[s, 0, s]] += 0.2;
        t[[s, 1, s]] += 0.2;
    }
    t
}

pub fn chain_sampler(n_states: usize) -> TableSampler {
    let d = Array1::from_elem(n_states, 1.0 / n_states as f64);
    let pi = Array2::from_elem((n_states, 2), 0.5);
    TableSampler::from_dynamics(&d, &pi, &chain_dynamics(n_states)).unwrap()
}

/// Hides the exact transition table of the wrapped sampler.
pub struct Opaque<S>(pub S);

impl<S: TransitionSampler> TransitionSampler for Opaque<S> {
    fn spec(&self) -> &EnvSpec {
        self.0.spec()
    }

    fn sample(&mut self, batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Transition> {
        self.0.sample(batch_size, rng)
    }
}

/// One-dimensional states in `[-1, 1]`, actions in `[-0.1, 0.1]`, `s' = s + a`.
pub struct LineSampler {
    spec: EnvSpec,
}

impl LineSampler {
    pub fn new() -> Self {
        Self {
            spec: EnvSpec::new(Space::Box { dim: 1 }, Space::Box { dim: 1 }),
        }
    }
}

impl TransitionSampler for LineSampler {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn sample(&mut self, batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Transition> {
        (0..batch_size)
            .map(|_| {
                let s = rng.f64() * 2.0 - 1.0;
                let a = rng.f64() * 0.2 - 0.1;
                Transition::new(vec![s], vec![a], vec![s + a])
            })
            .collect()
    }
}

/// Random walks on the chain that end after `horizon` steps.
pub struct ChainWalks {
    spec: EnvSpec,
    dynamics: Array3<f64>,
    horizon: usize,
}

impl ChainWalks {
    pub fn new(n_states: usize, horizon: usize) -> Self {
        Self {
            spec: EnvSpec::tabular(n_states, 2).episodic(),
            dynamics: chain_dynamics(n_states),
            horizon,
        }
    }
}

impl TrajectorySampler for ChainWalks {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn rollout(&mut self, n_episodes: usize, rng: &mut fastrand::Rng) -> Vec<Trajectory> {
        let n_states = self.dynamics.dim().0;
        (0..n_episodes)
            .map(|_| {
                let mut s = rng.usize(..n_states);
                let mut transitions = Vec::with_capacity(self.horizon);
                for step in 0..self.horizon {
                    let a = rng.usize(..2);
                    let u = rng.f64();
                    let mut acc = 0.0;
                    let mut next = s;
                    for (candidate, p) in self.dynamics.slice(ndarray::s![s, a, ..]).iter().enumerate() {
                        acc += p;
                        if u < acc {
                            next = candidate;
                            break;
                        }
                    }
                    transitions.push(Transition::discrete(s, a, next).with_done(step + 1 == self.horizon));
                    s = next;
                }
                Trajectory { transitions }
            })
            .collect()
    }
}

/// Every chain state is visited, so the unregularized system is solvable.
pub fn config(discount: f64) -> CanonConfig {
    CanonConfig {
        discount,
        sample_size: 2048,
        regularization: 0.0,
        ..CanonConfig::default()
    }
}

pub fn continuous_config(discount: f64) -> CanonConfig {
    CanonConfig {
        discount,
        sample_size: 2048,
        optimizer: OptimizerConfig {
            max_iterations: 4000,
            patience: 400,
            averaging_window: 50,
            tolerance: 1e-7,
            learning_rate: 0.01,
            batch_size: 512,
            hidden_sizes: Vec::new(),
        },
        ..CanonConfig::default()
    }
}

pub fn approx(a: &[f64], b: &[f64], tol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
}
