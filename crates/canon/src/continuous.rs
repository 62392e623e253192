//! Gradient-based potential fit for spaces too large to enumerate.
//!
//! Minimizes `E[(R - gamma * f(s') * (1 - done) + f(s))^2]` over minibatches
//! with Adam. Progress is judged on a moving average of the minibatch loss:
//! the fit stops once that average has not improved by more than `tolerance`
//! for `patience` iterations, and the parameters at the best average are kept.

use crate::config::OptimizerConfig;
use crate::error::{CanonError, NonConvergenceWarning, Result};
use crate::model::{evaluate_batch, RewardModel, Trainable};
use crate::potential::PotentialNet;
use crate::sampler::TransitionSampler;
use crate::space::Transition;
use ml::{collect_grads, Adam, Tape, Tensor};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Outcome of [`fit_potential_continuous`].
#[derive(Debug, Clone)]
pub struct PotentialFit {
    pub potential: PotentialNet,
    pub iterations: usize,
    /// Best moving-average loss.
    pub best_loss: f64,
    /// Last minibatch loss.
    pub final_loss: f64,
    pub converged: bool,
    pub warning: Option<NonConvergenceWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Improved,
    Stalled,
    Plateaued,
}

/// Moving-average plateau detector.
#[derive(Debug)]
struct Plateau {
    window: VecDeque<f64>,
    size: usize,
    best: f64,
    since_best: usize,
    patience: usize,
    tolerance: f64,
}

impl Plateau {
    fn new(config: &OptimizerConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.averaging_window),
            size: config.averaging_window,
            best: f64::INFINITY,
            since_best: 0,
            patience: config.patience,
            tolerance: config.tolerance,
        }
    }

    fn observe(&mut self, loss: f64) -> Progress {
        self.window.push_back(loss);
        if self.window.len() > self.size {
            self.window.pop_front();
        }
        let average = self.window.iter().sum::<f64>() / self.window.len() as f64;
        if average < self.best - self.tolerance {
            self.best = average;
            self.since_best = 0;
            Progress::Improved
        } else {
            self.since_best += 1;
            if self.since_best >= self.patience {
                Progress::Plateaued
            } else {
                Progress::Stalled
            }
        }
    }
}

/// Records the loss of `potential` on one minibatch and leaves its gradient
/// on the parameters.
fn loss_and_grads(
    potential: &mut PotentialNet,
    batch: &[Transition],
    rewards: &[f64],
    discount: f64,
) -> Result<f64> {
    let n = batch.len();
    let current: Vec<&[f64]> = batch.iter().map(|t| t.obs.as_slice()).collect();
    let next: Vec<&[f64]> = batch.iter().map(|t| t.next_obs.as_slice()).collect();
    let x = potential.encode(&current)?;
    let x_next = potential.encode(&next)?;
    let mask = Tensor::from_vec(
        vec![n, 1],
        batch
            .iter()
            .map(|t| if t.done { 0.0 } else { discount })
            .collect(),
    );
    let r = Tensor::from_vec(vec![n, 1], rewards.to_vec());

    let mut tape = Tape::new();
    let mut tensors = HashMap::new();
    let f = potential.forward(&x, &mut tape, &mut tensors);
    let f_next = potential.forward(&x_next, &mut tape, &mut tensors);
    let discounted = f_next.mul(&mask, &mut tape, &mut tensors);
    let residual = r
        .sub(&discounted, &mut tape, &mut tensors)
        .add(&f, &mut tape, &mut tensors);
    let loss = residual
        .pow(2.0, &mut tape, &mut tensors)
        .reduce_mean(&mut tape, &mut tensors);

    tape.backward(&loss, &mut tensors)?;
    collect_grads(&tensors, &mut potential.params_mut());
    Ok(loss.data[0])
}

/// Fits a neural potential to `reward` on transitions drawn from `sampler`.
///
/// Hitting `max_iterations` is not an error: the best parameters are kept
/// and the result carries a [`NonConvergenceWarning`].
pub fn fit_potential_continuous(
    reward: &dyn RewardModel,
    sampler: &mut dyn TransitionSampler,
    discount: f64,
    config: &OptimizerConfig,
    rng: &mut fastrand::Rng,
) -> Result<PotentialFit> {
    config.validate()?;
    let space = sampler.spec().observation;
    let mut potential = PotentialNet::new(space, &config.hidden_sizes, rng);
    let mut adam = Adam::new(&potential.params()).with_lr(config.learning_rate);
    let mut plateau = Plateau::new(config);
    let mut best_params = potential.parameters();
    let mut final_loss = f64::NAN;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        let batch = sampler.sample(config.batch_size, rng);
        if batch.is_empty() {
            return Err(CanonError::Config("sampler returned an empty batch".into()));
        }
        let rewards = evaluate_batch(reward, &batch)?;
        let loss = loss_and_grads(&mut potential, &batch, &rewards, discount)?;
        if !loss.is_finite() {
            return Err(CanonError::Diverged {
                iteration: iterations,
                loss,
            });
        }
        iterations += 1;
        final_loss = loss;

        match plateau.observe(loss) {
            Progress::Improved => best_params = potential.parameters(),
            Progress::Stalled => {}
            Progress::Plateaued => {
                converged = true;
                break;
            }
        }
        adam.step(&mut potential.params_mut());

        if iterations % 500 == 0 {
            debug!(iterations, loss, best = plateau.best, "potential fit progress");
        }
    }

    potential.set_parameters(&best_params)?;
    let warning = if converged {
        debug!(iterations, best = plateau.best, "potential fit converged");
        None
    } else {
        let w = NonConvergenceWarning {
            iterations,
            best_loss: plateau.best,
            final_loss,
        };
        warn!(%w, "potential fit stopped at the iteration cap");
        Some(w)
    };

    Ok(PotentialFit {
        potential,
        iterations,
        best_loss: plateau.best,
        final_loss,
        converged,
        warning,
    })
}
