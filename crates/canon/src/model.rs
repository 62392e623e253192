use crate::error::{CanonError, Result};
use crate::potential::Potential;
use crate::space::{EnvSpec, Transition};
use crate::tabular;
use ml::{Mlp, Tensor};
use ndarray::{Array1, Array3};
use std::sync::Arc;

/// Anything that assigns a scalar reward to each transition.
pub trait RewardModel: Send + Sync {
    fn spec(&self) -> &EnvSpec;

    /// One reward per transition, in batch order.
    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>>;
}

/// Models whose parameters can be snapshotted and restored.
pub trait Trainable {
    fn parameters(&self) -> Vec<Tensor>;

    fn set_parameters(&mut self, params: &[Tensor]) -> Result<()>;
}

/// [`RewardModel::evaluate`] with the one-reward-per-transition contract
/// checked.
pub(crate) fn evaluate_batch(model: &dyn RewardModel, batch: &[Transition]) -> Result<Vec<f64>> {
    let rewards = model.evaluate(batch)?;
    if rewards.len() == batch.len() {
        Ok(rewards)
    } else {
        Err(CanonError::ShapeMismatch(format!(
            "reward model returned {} rewards for {} transitions",
            rewards.len(),
            batch.len()
        )))
    }
}

/// Copies parameter values in place so tensor ids stay stable.
pub(crate) fn copy_parameters(dst: Vec<&mut Tensor>, src: &[Tensor]) -> Result<()> {
    if dst.len() != src.len() {
        return Err(CanonError::ShapeMismatch(format!(
            "expected {} parameter tensors, got {}",
            dst.len(),
            src.len()
        )));
    }
    for (d, s) in dst.into_iter().zip(src) {
        if d.shape != s.shape {
            return Err(CanonError::ShapeMismatch(format!(
                "parameter shape {:?} does not match {:?}",
                s.shape, d.shape
            )));
        }
        d.data.clone_from(&s.data);
        d.grad = None;
    }
    Ok(())
}

/// Reward stored per `(s, a, s')` triple.
#[derive(Debug, Clone)]
pub struct TabularReward {
    spec: EnvSpec,
    table: Array3<f64>,
}

impl TabularReward {
    pub fn new(table: Array3<f64>) -> Result<Self> {
        let (n_states, n_actions, n_next) = table.dim();
        if n_states != n_next {
            return Err(CanonError::ShapeMismatch(format!(
                "reward table has {n_states} source and {n_next} successor states"
            )));
        }
        Ok(Self {
            spec: EnvSpec::tabular(n_states, n_actions),
            table,
        })
    }

    /// Reward that depends only on the current state.
    pub fn from_state_rewards(state_rewards: &Array1<f64>, n_actions: usize) -> Result<Self> {
        Self::new(tabular::state_to_3d(state_rewards, n_actions))
    }

    #[must_use]
    pub fn episodic(mut self) -> Self {
        self.spec.episodic = true;
        self
    }

    pub fn table(&self) -> &Array3<f64> {
        &self.table
    }
}

impl RewardModel for TabularReward {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        batch
            .iter()
            .map(|t| {
                let s = self.spec.observation.index(&t.obs)?;
                let a = self.spec.action.index(&t.act)?;
                let next = self.spec.observation.index(&t.next_obs)?;
                Ok(self.table[[s, a, next]])
            })
            .collect()
    }
}

/// Reward given by a closure over single transitions.
pub struct FnReward<F> {
    spec: EnvSpec,
    f: F,
}

impl<F> FnReward<F>
where
    F: Fn(&Transition) -> f64 + Send + Sync,
{
    pub fn new(spec: EnvSpec, f: F) -> Self {
        Self { spec, f }
    }
}

impl<F> RewardModel for FnReward<F>
where
    F: Fn(&Transition) -> f64 + Send + Sync,
{
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        self.spec.check_batch(batch)?;
        Ok(batch.iter().map(&self.f).collect())
    }
}

/// Learned reward `r(s, a, s')` over concatenated feature encodings.
#[derive(Debug, Clone)]
pub struct MlpReward {
    spec: EnvSpec,
    net: Mlp,
}

impl MlpReward {
    pub fn new(spec: EnvSpec, hidden_sizes: &[usize], rng: &mut fastrand::Rng) -> Self {
        let input = 2 * spec.observation.feature_dim() + spec.action.feature_dim();
        let mut sizes = vec![input];
        sizes.extend_from_slice(hidden_sizes);
        sizes.push(1);
        Self {
            spec,
            net: Mlp::new(&sizes, rng),
        }
    }

    fn features(&self, batch: &[Transition]) -> Result<Tensor> {
        let width = self.net.in_dim();
        let mut data = Vec::with_capacity(batch.len() * width);
        for t in batch {
            self.spec.observation.encode_into(&t.obs, &mut data)?;
            self.spec.action.encode_into(&t.act, &mut data)?;
            self.spec.observation.encode_into(&t.next_obs, &mut data)?;
        }
        Ok(Tensor::from_vec(vec![batch.len(), width], data))
    }
}

impl RewardModel for MlpReward {
    fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.features(batch)?;
        Ok(self.net.predict(&x).data)
    }
}

impl Trainable for MlpReward {
    fn parameters(&self) -> Vec<Tensor> {
        self.net.params().into_iter().cloned().collect()
    }

    fn set_parameters(&mut self, params: &[Tensor]) -> Result<()> {
        copy_parameters(self.net.params_mut(), params)
    }
}

/// `base(s, a, s') + gamma * f(s') - f(s)`.
#[derive(Clone)]
pub struct ShapedReward {
    base: Arc<dyn RewardModel>,
    potential: Potential,
    discount: f64,
}

impl ShapedReward {
    pub fn new(base: Arc<dyn RewardModel>, potential: Potential, discount: f64) -> Self {
        Self {
            base,
            potential,
            discount,
        }
    }
}

impl RewardModel for ShapedReward {
    fn spec(&self) -> &EnvSpec {
        self.base.spec()
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        let base = self.base.evaluate(batch)?;
        let shaping = self
            .potential
            .shaping(&self.spec().observation, batch, self.discount)?;
        Ok(base.iter().zip(&shaping).map(|(r, s)| r + s).collect())
    }
}

/// `scale * base + shift`.
#[derive(Clone)]
pub struct AffineReward {
    base: Arc<dyn RewardModel>,
    scale: f64,
    shift: f64,
}

impl AffineReward {
    pub fn new(base: Arc<dyn RewardModel>, scale: f64, shift: f64) -> Self {
        Self { base, scale, shift }
    }
}

impl RewardModel for AffineReward {
    fn spec(&self) -> &EnvSpec {
        self.base.spec()
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        Ok(self
            .base
            .evaluate(batch)?
            .into_iter()
            .map(|r| self.scale * r + self.shift)
            .collect())
    }
}

/// Sum of several rewards over the same spaces.
#[derive(Clone)]
pub struct SumReward {
    parts: Vec<Arc<dyn RewardModel>>,
}

impl SumReward {
    pub fn new(parts: Vec<Arc<dyn RewardModel>>) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(CanonError::Config("a sum reward needs at least one term".into()));
        };
        for p in &parts[1..] {
            first.spec().ensure_compatible(p.spec(), "summed rewards")?;
        }
        Ok(Self { parts })
    }
}

impl RewardModel for SumReward {
    fn spec(&self) -> &EnvSpec {
        self.parts[0].spec()
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        let mut total = vec![0.0; batch.len()];
        for part in &self.parts {
            for (acc, r) in total.iter_mut().zip(part.evaluate(batch)?) {
                *acc += r;
            }
        }
        Ok(total)
    }
}
