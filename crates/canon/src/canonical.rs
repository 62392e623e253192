use crate::config::{CanonConfig, Normalization, StateSpaceKind};
use crate::continuous::fit_potential_continuous;
use crate::error::{CanonError, NonConvergenceWarning, Result};
use crate::model::{evaluate_batch, RewardModel};
use crate::potential::Potential;
use crate::sampler::{empirical_table, TransitionSampler};
use crate::space::{EnvSpec, Transition};
use crate::stats;
use crate::tabular;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A reward with its fitted shaping removed and an affine normalization
/// applied:
///
/// ```text
/// C(s, a, s') = (R(s, a, s') - gamma * f(s') + f(s) - offset) * multiplier
/// ```
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Clone)]
pub struct CanonicalReward {
    original: Arc<dyn RewardModel>,
    potential: Potential,
    discount: f64,
    offset: f64,
    multiplier: f64,
    kind: StateSpaceKind,
    config: CanonConfig,
    warnings: Vec<NonConvergenceWarning>,
}

impl std::fmt::Debug for CanonicalReward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalReward")
            .field("potential", &self.potential)
            .field("discount", &self.discount)
            .field("offset", &self.offset)
            .field("multiplier", &self.multiplier)
            .field("kind", &self.kind)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl CanonicalReward {
    pub fn original(&self) -> &Arc<dyn RewardModel> {
        &self.original
    }

    pub fn potential(&self) -> &Potential {
        &self.potential
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Value subtracted after potential removal.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Factor applied after the offset.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn kind(&self) -> StateSpaceKind {
        self.kind
    }

    pub fn config(&self) -> &CanonConfig {
        &self.config
    }

    pub fn warnings(&self) -> &[NonConvergenceWarning] {
        &self.warnings
    }

    /// Reward with the potential removed but not yet normalized.
    pub fn deshaped(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        deshaped(&*self.original, &self.potential, self.discount, batch)
    }
}

impl RewardModel for CanonicalReward {
    fn spec(&self) -> &EnvSpec {
        self.original.spec()
    }

    fn evaluate(&self, batch: &[Transition]) -> Result<Vec<f64>> {
        Ok(self
            .deshaped(batch)?
            .into_iter()
            .map(|r| (r - self.offset) * self.multiplier)
            .collect())
    }
}

fn deshaped(
    model: &dyn RewardModel,
    potential: &Potential,
    discount: f64,
    batch: &[Transition],
) -> Result<Vec<f64>> {
    let rewards = evaluate_batch(model, batch)?;
    remove_shaping(model, potential, discount, batch, &rewards)
}

fn remove_shaping(
    model: &dyn RewardModel,
    potential: &Potential,
    discount: f64,
    batch: &[Transition],
    rewards: &[f64],
) -> Result<Vec<f64>> {
    let shaping = potential.shaping(&model.spec().observation, batch, discount)?;
    Ok(rewards.iter().zip(&shaping).map(|(r, s)| r - s).collect())
}

/// Exact potential over the sampler's coverage, or over an empirical table
/// when the sampler cannot report one.
fn tabular_potential(
    model: &dyn RewardModel,
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
    rng: &mut fastrand::Rng,
) -> Result<Potential> {
    let transitions = match sampler.transition_table() {
        Some(table) => table,
        None => {
            let batch = sampler.sample(config.sample_size, rng);
            empirical_table(sampler.spec(), &batch)?
        }
    };
    let reward = tabular::reward_table(model)?;
    let potential =
        tabular::fit_potential_tabular(&reward, &transitions, config.discount, config.regularization)?;
    Ok(Potential::Table(potential))
}

/// `(offset, multiplier)` for the configured normalization, redrawing the
/// sample when it has no spread.
///
/// Spread is measured against the raw reward's own standard deviation (at
/// least one), so a reward that is almost entirely shaping counts as
/// degenerate instead of having its fit residual blown up to unit scale.
fn normalization(
    model: &dyn RewardModel,
    potential: &Potential,
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
    rng: &mut fastrand::Rng,
) -> Result<(f64, f64)> {
    if config.normalization == Normalization::Identity {
        return Ok((0.0, 1.0));
    }
    let attempts = config.degenerate_retries + 1;
    let mut spread = 0.0;
    for attempt in 1..=attempts {
        let batch = sampler.sample(config.sample_size, rng);
        let raw = evaluate_batch(model, &batch)?;
        let values = remove_shaping(model, potential, config.discount, &batch, &raw)?;
        let mean = stats::mean(&values);
        spread = match config.normalization {
            Normalization::Zscore => stats::std_dev(&values),
            _ => stats::range(&values),
        };
        let floor = config.epsilon * stats::std_dev(&raw).max(1.0);
        if spread > floor {
            let multiplier = match config.normalization {
                Normalization::Zscore => 1.0 / spread,
                _ => config.reference_scale / spread,
            };
            return Ok((mean, multiplier));
        }
        warn!(attempt, attempts, spread, "normalization sample is degenerate, redrawing");
    }
    Err(CanonError::DegenerateSample { attempts, spread })
}

/// Removes the potential shaping of `model` over the coverage of `sampler`
/// and normalizes the result.
///
/// Deterministic for a fixed `config.seed` and sampler state.
pub fn canonicalize(
    model: Arc<dyn RewardModel>,
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
    kind: StateSpaceKind,
) -> Result<CanonicalReward> {
    config.validate()?;
    model
        .spec()
        .ensure_compatible(sampler.spec(), "reward model and sampler spaces differ")?;
    config.check_discount(sampler.spec())?;
    if kind == StateSpaceKind::Tabular && model.spec().tabular_dims().is_none() {
        return Err(CanonError::Config(
            "the tabular solver needs discrete observation and action spaces".into(),
        ));
    }

    let mut rng = fastrand::Rng::with_seed(config.seed);
    let (potential, warnings) = match kind {
        StateSpaceKind::Tabular => (
            tabular_potential(&*model, sampler, config, &mut rng)?,
            Vec::new(),
        ),
        StateSpaceKind::Continuous => {
            let fit = fit_potential_continuous(
                &*model,
                sampler,
                config.discount,
                &config.optimizer,
                &mut rng,
            )?;
            debug!(
                iterations = fit.iterations,
                best_loss = fit.best_loss,
                "continuous potential fitted"
            );
            (Potential::Network(fit.potential), fit.warning.into_iter().collect())
        }
    };

    let (offset, multiplier) = normalization(&*model, &potential, sampler, config, &mut rng)?;
    info!(?kind, offset, multiplier, normalization = ?config.normalization, "canonicalized reward");

    Ok(CanonicalReward {
        original: model,
        potential,
        discount: config.discount,
        offset,
        multiplier,
        kind,
        config: config.clone(),
        warnings,
    })
}
