use crate::error::{CanonError, Result};
use serde::{Deserialize, Serialize};

/// Observation or action space.
///
/// A discrete point is stored as a single coordinate holding its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Space {
    Discrete { n: usize },
    Box { dim: usize },
}

impl Space {
    /// Number of coordinates in a raw point.
    pub fn dim(&self) -> usize {
        match self {
            Space::Discrete { .. } => 1,
            Space::Box { dim } => *dim,
        }
    }

    /// Width of the encoded features (one-hot for discrete spaces).
    pub fn feature_dim(&self) -> usize {
        match self {
            Space::Discrete { n } => *n,
            Space::Box { dim } => *dim,
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Space::Discrete { .. })
    }

    /// Number of elements of a discrete space.
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            Space::Discrete { n } => Some(*n),
            Space::Box { .. } => None,
        }
    }

    /// Index of a discrete point.
    pub fn index(&self, x: &[f64]) -> Result<usize> {
        let Space::Discrete { n } = self else {
            return Err(CanonError::ShapeMismatch(
                "index lookup on a continuous space".to_string(),
            ));
        };
        let [v] = x else {
            return Err(CanonError::ShapeMismatch(format!(
                "discrete point must have one coordinate, got {}",
                x.len()
            )));
        };
        let rounded = v.round();
        if !(0.0..*n as f64).contains(&rounded) || (rounded - v).abs() > 1e-9 {
            return Err(CanonError::ShapeMismatch(format!(
                "{v} is not an element of a discrete space of size {n}"
            )));
        }
        Ok(rounded as usize)
    }

    /// Raw point for the `i`th element of a discrete space.
    pub fn point(i: usize) -> Vec<f64> {
        vec![i as f64]
    }

    /// Appends the feature encoding of `x` to `out`.
    pub fn encode_into(&self, x: &[f64], out: &mut Vec<f64>) -> Result<()> {
        match self {
            Space::Discrete { n } => {
                let i = self.index(x)?;
                let start = out.len();
                out.resize(start + n, 0.0);
                out[start + i] = 1.0;
            }
            Space::Box { dim } => {
                if x.len() != *dim {
                    return Err(CanonError::ShapeMismatch(format!(
                        "expected a point of dimension {dim}, got {}",
                        x.len()
                    )));
                }
                out.extend_from_slice(x);
            }
        }
        Ok(())
    }

    /// Checks that `x` is a well-formed point of this space.
    pub fn check(&self, x: &[f64]) -> Result<()> {
        match self {
            Space::Discrete { .. } => self.index(x).map(|_| ()),
            Space::Box { dim } if x.len() == *dim => Ok(()),
            Space::Box { dim } => Err(CanonError::ShapeMismatch(format!(
                "expected a point of dimension {dim}, got {}",
                x.len()
            ))),
        }
    }
}

/// Description of the environment a reward model is defined over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    pub observation: Space,
    pub action: Space,
    /// Whether transitions may terminate an episode.
    #[serde(default)]
    pub episodic: bool,
}

impl EnvSpec {
    pub fn new(observation: Space, action: Space) -> Self {
        Self {
            observation,
            action,
            episodic: false,
        }
    }

    #[must_use]
    pub fn episodic(mut self) -> Self {
        self.episodic = true;
        self
    }

    /// Tabular spec with `n_states` states and `n_actions` actions.
    pub fn tabular(n_states: usize, n_actions: usize) -> Self {
        Self::new(
            Space::Discrete { n: n_states },
            Space::Discrete { n: n_actions },
        )
    }

    /// `(n_states, n_actions)` when both spaces are discrete.
    pub fn tabular_dims(&self) -> Option<(usize, usize)> {
        Some((self.observation.cardinality()?, self.action.cardinality()?))
    }

    /// Same observation and action spaces.
    pub fn compatible_with(&self, other: &EnvSpec) -> bool {
        self.observation == other.observation && self.action == other.action
    }

    pub fn ensure_compatible(&self, other: &EnvSpec, what: &str) -> Result<()> {
        if self.compatible_with(other) {
            Ok(())
        } else {
            Err(CanonError::ShapeMismatch(format!(
                "{what}: {:?}/{:?} vs {:?}/{:?}",
                self.observation, self.action, other.observation, other.action
            )))
        }
    }

    /// Validates every point of every transition in `batch`.
    pub fn check_batch(&self, batch: &[Transition]) -> Result<()> {
        for t in batch {
            self.observation.check(&t.obs)?;
            self.action.check(&t.act)?;
            self.observation.check(&t.next_obs)?;
        }
        Ok(())
    }
}

/// One `(s, a, s')` step, with a flag for terminal successor states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub obs: Vec<f64>,
    pub act: Vec<f64>,
    pub next_obs: Vec<f64>,
    #[serde(default)]
    pub done: bool,
}

impl Transition {
    pub fn new(obs: Vec<f64>, act: Vec<f64>, next_obs: Vec<f64>) -> Self {
        Self {
            obs,
            act,
            next_obs,
            done: false,
        }
    }

    /// Transition between discrete states.
    pub fn discrete(s: usize, a: usize, next: usize) -> Self {
        Self::new(Space::point(s), Space::point(a), Space::point(next))
    }

    #[must_use]
    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_encoding() {
        let s = Space::Discrete { n: 4 };
        let mut out = vec![9.0];
        s.encode_into(&[2.0], &mut out).unwrap();
        assert_eq!(out, vec![9.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(s.encode_into(&[4.0], &mut out).is_err());
        assert!(s.encode_into(&[1.5], &mut out).is_err());
    }

    #[test]
    fn box_points_are_checked() {
        let s = Space::Box { dim: 2 };
        assert!(s.check(&[0.1, 0.2]).is_ok());
        assert!(s.check(&[0.1]).is_err());
        assert!(s.index(&[0.0]).is_err());
    }

    #[test]
    fn specs_deserialize() {
        let spec: EnvSpec = serde_json::from_str(
            r#"{"observation":{"kind":"discrete","n":3},"action":{"kind":"box","dim":2}}"#,
        )
        .unwrap();
        assert_eq!(spec.observation, Space::Discrete { n: 3 });
        assert_eq!(spec.action, Space::Box { dim: 2 });
        assert!(!spec.episodic);
        assert_eq!(spec.tabular_dims(), None);
    }
}
