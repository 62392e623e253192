use crate::error::{CanonError, Result};
use crate::space::{EnvSpec, Transition};
use ndarray::{Array1, Array2, Array3};

/// Source of transitions from the coverage distribution.
///
/// Canonicalization is only meaningful relative to this distribution: two
/// rewards may be equivalent on its support and differ elsewhere.
pub trait TransitionSampler {
    fn spec(&self) -> &EnvSpec;

    /// Draws `batch_size` transitions. All randomness comes from `rng`.
    fn sample(&mut self, batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Transition>;

    /// Exact `(s, a, s')` weights when the sampler knows them. Tabular
    /// canonicalization falls back to an empirical table otherwise.
    fn transition_table(&self) -> Option<Array3<f64>> {
        None
    }
}

/// Counts the transitions of `batch` into an `(s, a, s')` table.
pub fn empirical_table(spec: &EnvSpec, batch: &[Transition]) -> Result<Array3<f64>> {
    let (n_states, n_actions) = spec.tabular_dims().ok_or_else(|| {
        CanonError::ShapeMismatch("an empirical transition table needs discrete spaces".into())
    })?;
    let mut counts = Array3::zeros((n_states, n_actions, n_states));
    for t in batch {
        let s = spec.observation.index(&t.obs)?;
        let a = spec.action.index(&t.act)?;
        let next = spec.observation.index(&t.next_obs)?;
        counts[[s, a, next]] += 1.0;
    }
    Ok(counts)
}

/// Draws discrete transitions proportionally to a weight table.
#[derive(Debug, Clone)]
pub struct TableSampler {
    spec: EnvSpec,
    weights: Array3<f64>,
    cumulative: Vec<f64>,
}

impl TableSampler {
    /// `weights[[s, a, s']]` need not be normalized.
    pub fn new(weights: Array3<f64>) -> Result<Self> {
        let (n_states, n_actions, n_next) = weights.dim();
        if n_states != n_next {
            return Err(CanonError::ShapeMismatch(format!(
                "transition table has {n_states} source and {n_next} successor states"
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CanonError::Config(
                "transition weights must be finite and non-negative".into(),
            ));
        }
        let cumulative: Vec<f64> = weights
            .iter()
            .scan(0.0, |acc, w| {
                *acc += w;
                Some(*acc)
            })
            .collect();
        if cumulative.last().copied().unwrap_or(0.0) <= 0.0 {
            return Err(CanonError::Config("transition table has no mass".into()));
        }
        Ok(Self {
            spec: EnvSpec::tabular(n_states, n_actions),
            weights,
            cumulative,
        })
    }

    /// Weights `d(s) * pi(a | s) * T(s' | s, a)`.
    pub fn from_dynamics(
        state_dist: &Array1<f64>,
        policy: &Array2<f64>,
        dynamics: &Array3<f64>,
    ) -> Result<Self> {
        let (n_states, n_actions, _) = dynamics.dim();
        if state_dist.len() != n_states || policy.dim() != (n_states, n_actions) {
            return Err(CanonError::ShapeMismatch(format!(
                "state distribution {} and policy {:?} do not fit dynamics {:?}",
                state_dist.len(),
                policy.dim(),
                dynamics.dim()
            )));
        }
        let weights = Array3::from_shape_fn(dynamics.dim(), |(s, a, next)| {
            state_dist[s] * policy[[s, a]] * dynamics[[s, a, next]]
        });
        Self::new(weights)
    }

    /// Every `(s, a, s')` triple equally likely.
    pub fn uniform(n_states: usize, n_actions: usize) -> Result<Self> {
        Self::new(Array3::ones((n_states, n_actions, n_states)))
    }

    #[must_use]
    pub fn episodic(mut self) -> Self {
        self.spec.episodic = true;
        self
    }

    fn triple(&self, flat: usize) -> (usize, usize, usize) {
        let (n_states, n_actions, _) = self.weights.dim();
        let next = flat % n_states;
        let a = (flat / n_states) % n_actions;
        let s = flat / (n_states * n_actions);
        (s, a, next)
    }
}

impl TransitionSampler for TableSampler {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn sample(&mut self, batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Transition> {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        let last = self.cumulative.len() - 1;
        (0..batch_size)
            .map(|_| {
                let u = rng.f64() * total;
                let flat = self.cumulative.partition_point(|&c| c <= u).min(last);
                let (s, a, next) = self.triple(flat);
                Transition::discrete(s, a, next)
            })
            .collect()
    }

    fn transition_table(&self) -> Option<Array3<f64>> {
        Some(self.weights.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_follow_the_weights() {
        let mut weights = Array3::zeros((2, 1, 2));
        weights[[0, 0, 1]] = 3.0;
        weights[[1, 0, 0]] = 1.0;
        let mut sampler = TableSampler::new(weights).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        let batch = sampler.sample(4000, &mut rng);
        let table = empirical_table(sampler.spec(), &batch).unwrap();
        assert_eq!(table[[0, 0, 0]] + table[[1, 0, 1]], 0.0);
        let frac = table[[0, 0, 1]] / 4000.0;
        assert!((frac - 0.75).abs() < 0.03, "{frac}");
    }

    #[test]
    fn rejects_empty_and_negative_tables() {
        assert!(TableSampler::new(Array3::zeros((2, 2, 2))).is_err());
        let mut w = Array3::ones((2, 2, 2));
        w[[0, 0, 0]] = -1.0;
        assert!(TableSampler::new(w).is_err());
        assert!(TableSampler::new(Array3::ones((2, 2, 3))).is_err());
    }
}
