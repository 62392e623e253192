use crate::error::{CanonError, Result};
use crate::model::{copy_parameters, Trainable};
use crate::space::{Space, Transition};
use ml::{Mlp, Recorder, Tensor};
use ndarray::Array1;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type StateFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Neural potential over encoded observations.
///
/// The output layer starts at zero, so a fresh network is the zero potential.
#[derive(Debug, Clone)]
pub struct PotentialNet {
    space: Space,
    net: Mlp,
}

impl PotentialNet {
    pub fn new(space: Space, hidden_sizes: &[usize], rng: &mut fastrand::Rng) -> Self {
        let mut sizes = Vec::with_capacity(hidden_sizes.len() + 2);
        sizes.push(space.feature_dim());
        sizes.extend_from_slice(hidden_sizes);
        sizes.push(1);
        Self {
            space,
            net: Mlp::new(&sizes, rng),
        }
    }

    pub fn space(&self) -> Space {
        self.space
    }

    /// Feature batch `[n, feature_dim]` for the given observations.
    pub fn encode(&self, states: &[&[f64]]) -> Result<Tensor> {
        let mut data = Vec::with_capacity(states.len() * self.space.feature_dim());
        for s in states {
            self.space.encode_into(s, &mut data)?;
        }
        Ok(Tensor::from_vec(
            vec![states.len(), self.space.feature_dim()],
            data,
        ))
    }

    /// Recorded forward pass, `[n, 1]`.
    pub fn forward(
        &self,
        x: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        self.net.forward(x, recorder, tensors)
    }

    pub fn values(&self, states: &[&[f64]]) -> Result<Vec<f64>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.encode(states)?;
        Ok(self.net.predict(&x).data)
    }

    pub fn params(&self) -> Vec<&Tensor> {
        self.net.params()
    }

    pub fn params_mut(&mut self) -> Vec<&mut Tensor> {
        self.net.params_mut()
    }
}

impl Trainable for PotentialNet {
    fn parameters(&self) -> Vec<Tensor> {
        self.net.params().into_iter().cloned().collect()
    }

    fn set_parameters(&mut self, params: &[Tensor]) -> Result<()> {
        copy_parameters(self.net.params_mut(), params)
    }
}

/// A state potential `f`, shaping a reward by `gamma * f(s') - f(s)`.
#[derive(Clone)]
pub enum Potential {
    /// One value per discrete state.
    Table(Array1<f64>),
    Network(PotentialNet),
    Function(StateFn),
}

impl fmt::Debug for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Potential::Table(t) => f.debug_tuple("Table").field(t).finish(),
            Potential::Network(n) => f.debug_tuple("Network").field(n).finish(),
            Potential::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl Potential {
    pub fn from_fn(f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Potential::Function(Arc::new(f))
    }

    pub fn table(&self) -> Option<&Array1<f64>> {
        match self {
            Potential::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn values(&self, space: &Space, states: &[&[f64]]) -> Result<Vec<f64>> {
        match self {
            Potential::Table(table) => states
                .iter()
                .map(|s| {
                    let i = space.index(s)?;
                    table.get(i).copied().ok_or_else(|| {
                        CanonError::ShapeMismatch(format!(
                            "state {i} outside a potential table of {} states",
                            table.len()
                        ))
                    })
                })
                .collect(),
            Potential::Network(net) => net.values(states),
            Potential::Function(f) => Ok(states.iter().map(|s| f(s)).collect()),
        }
    }

    /// `gamma * f(s') - f(s)` per transition, with `f(s') = 0` past a terminal step.
    pub fn shaping(&self, space: &Space, batch: &[Transition], discount: f64) -> Result<Vec<f64>> {
        let current: Vec<&[f64]> = batch.iter().map(|t| t.obs.as_slice()).collect();
        let next: Vec<&[f64]> = batch.iter().map(|t| t.next_obs.as_slice()).collect();
        let f_current = self.values(space, &current)?;
        let f_next = self.values(space, &next)?;
        Ok(batch
            .iter()
            .zip(f_current.iter().zip(&f_next))
            .map(|(t, (f_s, f_n))| {
                let continuing = if t.done { 0.0 } else { 1.0 };
                discount * continuing * f_n - f_s
            })
            .collect())
    }
}
