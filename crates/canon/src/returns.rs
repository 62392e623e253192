//! Comparing rewards through the discounted returns they assign to whole
//! episodes rather than through individual transitions.

use crate::error::{CanonError, Result};
use crate::model::{evaluate_batch, RewardModel};
use crate::space::{EnvSpec, Transition};
use crate::stats;

/// One episode, in order.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub transitions: Vec<Transition>,
}

/// Source of complete episodes.
pub trait TrajectorySampler {
    fn spec(&self) -> &EnvSpec;

    fn rollout(&mut self, n_episodes: usize, rng: &mut fastrand::Rng) -> Vec<Trajectory>;
}

/// `sum_t gamma^t r_t`.
pub fn discounted_return(rewards: &[f64], discount: f64) -> f64 {
    rewards.iter().rev().fold(0.0, |acc, r| r + discount * acc)
}

/// Discounted return of `model` on every trajectory.
pub fn returns_of_model(
    model: &dyn RewardModel,
    trajectories: &[Trajectory],
    discount: f64,
) -> Result<Vec<f64>> {
    trajectories
        .iter()
        .map(|t| Ok(discounted_return(&evaluate_batch(model, &t.transitions)?, discount)))
        .collect()
}

/// Pearson correlation between the returns of two rewards.
///
/// Returns of equivalent rewards are affinely related up to the potential of
/// the start state, so this is a cheap sanity check rather than a distance.
pub fn return_correlation(
    a: &dyn RewardModel,
    b: &dyn RewardModel,
    trajectories: &[Trajectory],
    discount: f64,
    eps: f64,
) -> Result<f64> {
    let ra = returns_of_model(a, trajectories, discount)?;
    let rb = returns_of_model(b, trajectories, discount)?;
    stats::pearson(&ra, &rb, eps).ok_or(CanonError::DegenerateSample {
        attempts: 1,
        spread: stats::std_dev(&ra).min(stats::std_dev(&rb)),
    })
}

/// Pearson distance `sqrt((1 - rho) / 2)` between the returns of two rewards.
pub fn return_distance(
    a: &dyn RewardModel,
    b: &dyn RewardModel,
    trajectories: &[Trajectory],
    discount: f64,
    eps: f64,
) -> Result<f64> {
    let rho = return_correlation(a, b, trajectories, discount, eps)?;
    Ok(((1.0 - rho) / 2.0).max(0.0).sqrt())
}
