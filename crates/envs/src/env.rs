use canon::EnvSpec;
use ndarray::Array3;

/// Environment dynamics, without a reward.
///
/// Inspired by Gym-style interfaces, but stateless: the caller owns the state
/// and [`transition`] maps a state and an action to a successor. Rewards are
/// supplied separately as [`canon::RewardModel`]s so several of them can be
/// compared over the same dynamics.
///
/// [`transition`]: Env::transition
pub trait Env {
    fn spec(&self) -> &EnvSpec;

    /// Start state of an episode.
    fn initial_state(&self, rng: &mut fastrand::Rng) -> Vec<f64>;

    /// State drawn from the coverage distribution used for comparisons.
    fn sample_state(&self, rng: &mut fastrand::Rng) -> Vec<f64>;

    /// Action of the uniformly random policy.
    fn sample_action(&self, rng: &mut fastrand::Rng) -> Vec<f64>;

    /// Successor of `state` under `action`, and whether the episode ends.
    fn transition(&self, state: &[f64], action: &[f64], rng: &mut fastrand::Rng) -> (Vec<f64>, bool);

    /// `(s, a, s')` weights of [`sample_state`] followed by [`sample_action`]
    /// and [`transition`], for environments that can enumerate them.
    ///
    /// [`sample_state`]: Env::sample_state
    /// [`sample_action`]: Env::sample_action
    /// [`transition`]: Env::transition
    fn transition_table(&self) -> Option<Array3<f64>> {
        None
    }
}

/// Index drawn from an unnormalized categorical distribution.
pub(crate) fn categorical(weights: impl IntoIterator<Item = f64>, rng: &mut fastrand::Rng) -> usize {
    let weights: Vec<f64> = weights.into_iter().collect();
    let total: f64 = weights.iter().sum();
    let u = rng.f64() * total;
    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        if u < acc {
            return i;
        }
    }
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
}
