//! One-dimensional point mass pushed by a bounded force.
//!
//! State is `(position, velocity)`, the action a force in `[-1, 1]`. The
//! dynamics never terminate.

use crate::env::Env;
use canon::{EnvSpec, FnReward, NamedReward, Potential, RewardModel, ShapedReward, Space, Transition};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PointMass {
    spec: EnvSpec,
    /// Integration step.
    pub dt: f64,
    /// Positions are sampled from `[-bound, bound]`.
    pub bound: f64,
    pub max_speed: f64,
}

impl Default for PointMass {
    fn default() -> Self {
        Self {
            spec: EnvSpec::new(Space::Box { dim: 2 }, Space::Box { dim: 1 }),
            dt: 0.05,
            bound: 1.0,
            max_speed: 1.0,
        }
    }
}

impl PointMass {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Env for PointMass {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn initial_state(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        vec![(rng.f64() * 2.0 - 1.0) * self.bound, 0.0]
    }

    fn sample_state(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        vec![
            (rng.f64() * 2.0 - 1.0) * self.bound,
            (rng.f64() * 2.0 - 1.0) * self.max_speed,
        ]
    }

    fn sample_action(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        vec![rng.f64() * 2.0 - 1.0]
    }

    fn transition(&self, state: &[f64], action: &[f64], _rng: &mut fastrand::Rng) -> (Vec<f64>, bool) {
        let force = action[0].clamp(-1.0, 1.0);
        let vel = (state[1] + self.dt * force).clamp(-self.max_speed, self.max_speed);
        let pos = state[0] + self.dt * vel;
        (vec![pos, vel], false)
    }
}

fn reward(spec: EnvSpec, f: impl Fn(&Transition) -> f64 + Send + Sync + 'static) -> Arc<dyn RewardModel> {
    Arc::new(FnReward::new(spec, f))
}

/// Rewards for reaching the origin. `dense_goal` and `shaped_goal` are
/// equivalent under `discount`, and `shaped_goal` only adds a potential that
/// is linear in the state.
pub fn named_rewards(env: &PointMass, discount: f64) -> Vec<NamedReward> {
    let spec = *env.spec();
    let dense = reward(spec, |t| -t.next_obs[0].powi(2));
    let shaped: Arc<dyn RewardModel> = Arc::new(ShapedReward::new(
        Arc::clone(&dense),
        Potential::from_fn(|s| 3.0 * s[0] - s[1]),
        discount,
    ));
    vec![
        ("dense_goal".to_string(), dense),
        ("shaped_goal".to_string(), shaped),
        (
            "effort_penalty".to_string(),
            reward(spec, |t| -t.next_obs[0].powi(2) - 0.5 * t.act[0].powi(2)),
        ),
        (
            "sparse_goal".to_string(),
            reward(spec, |t| if t.next_obs[0].abs() < 0.1 { 1.0 } else { 0.0 }),
        ),
        ("backwards".to_string(), reward(spec, |t| t.next_obs[0].powi(2))),
    ]
}
