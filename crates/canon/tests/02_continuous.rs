mod common;

use canon::tabular::reward_table;
use canon::{
    canonicalize, compare, compare_canonical, fit_potential_continuous, fit_potential_tabular,
    stats, CanonConfig, CanonError, EnvSpec, FnReward, MlpReward, OptimizerConfig, Potential,
    RewardModel, ShapedReward, Space, StateSpaceKind, Trainable, Transition, TransitionSampler,
};
use common::*;
use std::sync::Arc;

fn line_reward() -> Arc<dyn RewardModel> {
    let spec = *LineSampler::new().spec();
    Arc::new(FnReward::new(spec, |t: &Transition| t.obs[0].powi(2) + t.act[0]))
}

#[test]
fn continuous_solver_agrees_with_tabular_solver() {
    let mut rng = fastrand::Rng::with_seed(21);
    let reward = tabular(random_table(5, 2, &mut rng));
    let mut sampler = chain_sampler(5);
    let config = continuous_config(0.9);

    let exact = canonicalize(reward.clone(), &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    let learned = canonicalize(reward, &mut sampler, &config, StateSpaceKind::Continuous).unwrap();
    assert!(learned.warnings().is_empty());

    let result = compare_canonical(&exact, &learned, &mut sampler, &config).unwrap();
    assert!(result.distance < 0.02, "{}", result.distance);
}

#[test]
fn continuous_shaping_has_small_distance() {
    let base = line_reward();
    let discount = 0.9;
    let shaped: Arc<dyn RewardModel> = Arc::new(ShapedReward::new(
        Arc::clone(&base),
        Potential::from_fn(|s| 2.0 * s[0]),
        discount,
    ));
    let mut sampler = LineSampler::new();
    let result = compare(
        base,
        shaped,
        &mut sampler,
        &continuous_config(discount),
        StateSpaceKind::Continuous,
    )
    .unwrap();
    assert!(result.distance < 0.01, "{}", result.distance);
}

#[test]
fn iteration_cap_yields_a_warning_not_an_error() {
    let mut config = continuous_config(0.9);
    config.optimizer.max_iterations = 5;
    let mut sampler = LineSampler::new();
    let canonical = canonicalize(line_reward(), &mut sampler, &config, StateSpaceKind::Continuous)
        .unwrap();
    assert_eq!(canonical.warnings().len(), 1);
    assert_eq!(canonical.warnings()[0].iterations, 5);

    let result = compare(
        line_reward(),
        line_reward(),
        &mut sampler,
        &config,
        StateSpaceKind::Continuous,
    )
    .unwrap();
    assert_eq!(result.warnings.len(), 2);
    assert!(result.distance < 1e-12);
}

#[test]
fn plateau_stops_the_fit() {
    let spec = *LineSampler::new().spec();
    let zero = FnReward::new(spec, |_: &Transition| 0.0);
    let config = OptimizerConfig {
        patience: 10,
        averaging_window: 5,
        ..OptimizerConfig::default()
    };
    let mut rng = fastrand::Rng::with_seed(0);
    let fit = fit_potential_continuous(&zero, &mut LineSampler::new(), 0.9, &config, &mut rng).unwrap();
    assert!(fit.converged);
    assert!(fit.warning.is_none());
    assert_eq!(fit.iterations, 11);
    assert_eq!(fit.potential.values(&[&[0.5], &[-0.3]]).unwrap(), vec![0.0, 0.0]);
}

#[test]
fn continuous_canonicalization_is_reproducible() {
    let config = CanonConfig {
        seed: 99,
        ..continuous_config(0.9)
    };
    let mut sampler = LineSampler::new();
    let a = canonicalize(line_reward(), &mut sampler, &config, StateSpaceKind::Continuous).unwrap();
    let b = canonicalize(line_reward(), &mut sampler, &config, StateSpaceKind::Continuous).unwrap();
    let batch = sampler.sample(200, &mut fastrand::Rng::with_seed(5));
    assert_eq!(a.evaluate(&batch).unwrap(), b.evaluate(&batch).unwrap());
}

#[test]
fn neural_rewards_canonicalize_with_a_neural_potential() {
    let mut rng = fastrand::Rng::with_seed(31);
    let mut reward = MlpReward::new(*chain_sampler(4).spec(), &[8], &mut rng);
    let mut params = reward.parameters();
    for p in &mut params {
        for v in &mut p.data {
            *v = rng.f64() - 0.5;
        }
    }
    reward.set_parameters(&params).unwrap();

    let mut config = continuous_config(0.9);
    config.optimizer.hidden_sizes = vec![16];
    config.optimizer.learning_rate = 0.005;
    let mut sampler = chain_sampler(4);
    let canonical = canonicalize(Arc::new(reward), &mut sampler, &config, StateSpaceKind::Continuous)
        .unwrap();

    let values = canonical
        .evaluate(&sampler.sample(4000, &mut fastrand::Rng::with_seed(8)))
        .unwrap();
    assert!(stats::mean(&values).abs() < 0.15);
    assert!((stats::std_dev(&values) - 1.0).abs() < 0.15);
}

#[test]
fn tabular_solver_rejects_box_spaces() {
    let mut sampler = LineSampler::new();
    let err = canonicalize(line_reward(), &mut sampler, &continuous_config(0.9), StateSpaceKind::Tabular)
        .unwrap_err();
    assert!(matches!(err, CanonError::Config(_)), "{err}");
}

fn centered(values: &[f64]) -> Vec<f64> {
    let mean = stats::mean(values);
    values.iter().map(|v| v - mean).collect()
}

#[test]
fn continuous_potential_matches_the_exact_potential() {
    let mut rng = fastrand::Rng::with_seed(22);
    let reward = tabular(random_table(5, 2, &mut rng));
    let mut sampler = chain_sampler(5);
    let exact = fit_potential_tabular(
        &reward_table(reward.as_ref()).unwrap(),
        &sampler.transition_table().unwrap(),
        0.9,
        0.0,
    )
    .unwrap();

    let config = continuous_config(0.9);
    let fit = fit_potential_continuous(
        reward.as_ref(),
        &mut sampler,
        0.9,
        &config.optimizer,
        &mut fastrand::Rng::with_seed(0),
    )
    .unwrap();
    let states: Vec<Vec<f64>> = (0..5).map(Space::point).collect();
    let states: Vec<&[f64]> = states.iter().map(Vec::as_slice).collect();
    let learned = fit.potential.values(&states).unwrap();

    let exact = centered(exact.as_slice().unwrap());
    let learned = centered(&learned);
    assert!(approx(&exact, &learned, 0.25), "{exact:?} vs {learned:?}");
}

#[test]
fn non_finite_loss_is_reported_as_divergence() {
    let spec = *LineSampler::new().spec();
    let broken = FnReward::new(spec, |_: &Transition| f64::NAN);
    let mut rng = fastrand::Rng::with_seed(0);
    let err = fit_potential_continuous(
        &broken,
        &mut LineSampler::new(),
        0.9,
        &OptimizerConfig::default(),
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, CanonError::Diverged { iteration: 0, .. }), "{err}");
}

/// Drops the last reward of every batch.
struct Truncating(EnvSpec);

impl RewardModel for Truncating {
    fn spec(&self) -> &EnvSpec {
        &self.0
    }

    fn evaluate(&self, batch: &[Transition]) -> canon::Result<Vec<f64>> {
        Ok(vec![1.0; batch.len().saturating_sub(1)])
    }
}

#[test]
fn short_reward_output_is_a_shape_mismatch_on_both_paths() {
    let mut sampler = chain_sampler(4);
    let model: Arc<dyn RewardModel> = Arc::new(Truncating(*sampler.spec()));
    for kind in [StateSpaceKind::Tabular, StateSpaceKind::Continuous] {
        let err = canonicalize(model.clone(), &mut sampler, &continuous_config(0.9), kind)
            .unwrap_err();
        assert!(matches!(err, CanonError::ShapeMismatch(_)), "{kind:?}: {err}");
    }
}
