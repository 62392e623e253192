mod common;

use canon::tabular::shape;
use canon::{
    canonicalize, compare, fit_potential_tabular, AffineReward, CanonConfig, CanonError,
    Normalization, Potential, RewardModel, ShapedReward, StateSpaceKind, TabularReward,
    TransitionSampler,
};
use common::*;
use ndarray::{Array1, Array3};
use std::sync::Arc;

const N: usize = 6;

fn shaped(base: &Arc<dyn RewardModel>, potential: Array1<f64>, discount: f64) -> Arc<dyn RewardModel> {
    Arc::new(ShapedReward::new(
        Arc::clone(base),
        Potential::Table(potential),
        discount,
    ))
}

#[test]
fn shaped_rewards_share_a_canonical_form() {
    let mut rng = fastrand::Rng::with_seed(1);
    let base = tabular(random_table(N, 2, &mut rng));
    let other = shaped(&base, random_potential(N, &mut rng), 0.9);
    let config = config(0.9);
    let mut sampler = chain_sampler(N);

    let ca = canonicalize(base, &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    let cb = canonicalize(other, &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    let batch = sampler.sample(500, &mut rng);
    let va = ca.evaluate(&batch).unwrap();
    let vb = cb.evaluate(&batch).unwrap();
    assert!(approx(&va, &vb, 1e-5));
}

#[test]
fn shaping_has_zero_distance() {
    let mut rng = fastrand::Rng::with_seed(2);
    let base = tabular(random_table(N, 2, &mut rng));
    let other = shaped(&base, random_potential(N, &mut rng), 0.95);
    let mut sampler = chain_sampler(N);
    let result = compare(base, other, &mut sampler, &config(0.95), StateSpaceKind::Tabular).unwrap();
    assert!(result.distance < 1e-9, "{}", result.distance);
    assert!(result.warnings.is_empty());
}

#[test]
fn canonicalization_is_idempotent() {
    let mut rng = fastrand::Rng::with_seed(3);
    let base = tabular(random_table(N, 2, &mut rng));
    let config = config(0.9);
    let mut sampler = chain_sampler(N);
    let once = Arc::new(canonicalize(base, &mut sampler, &config, StateSpaceKind::Tabular).unwrap());
    let twice = canonicalize(once.clone(), &mut sampler, &config, StateSpaceKind::Tabular).unwrap();

    let batch = sampler.sample(500, &mut rng);
    let v1 = once.evaluate(&batch).unwrap();
    let v2 = twice.evaluate(&batch).unwrap();
    assert!(approx(&v1, &v2, 1e-5));
    assert!((twice.multiplier() - 1.0).abs() < 1e-6);
}

#[test]
fn positive_rescaling_and_shift_are_ignored() {
    let mut rng = fastrand::Rng::with_seed(4);
    let base = tabular(random_table(N, 2, &mut rng));
    let scaled: Arc<dyn RewardModel> = Arc::new(AffineReward::new(
        shaped(&base, random_potential(N, &mut rng), 0.9),
        7.5,
        -3.0,
    ));
    let mut sampler = chain_sampler(N);
    let result = compare(base, scaled, &mut sampler, &config(0.9), StateSpaceKind::Tabular).unwrap();
    assert!(result.distance < 1e-9, "{}", result.distance);
}

#[test]
fn negation_is_maximally_distant() {
    let mut rng = fastrand::Rng::with_seed(5);
    let base = tabular(random_table(N, 2, &mut rng));
    let negated: Arc<dyn RewardModel> = Arc::new(AffineReward::new(Arc::clone(&base), -1.0, 0.0));
    let mut sampler = chain_sampler(N);
    let result = compare(base, negated, &mut sampler, &config(0.9), StateSpaceKind::Tabular).unwrap();
    assert!((result.distance - 1.0).abs() < 1e-9, "{}", result.distance);
}

#[test]
fn comparison_is_symmetric_and_deterministic() {
    let mut rng = fastrand::Rng::with_seed(6);
    let a = tabular(random_table(N, 2, &mut rng));
    let b = tabular(random_table(N, 2, &mut rng));
    let config = config(0.9);
    let mut sampler = chain_sampler(N);

    let ab = compare(a.clone(), b.clone(), &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    let ba = compare(b.clone(), a.clone(), &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    let again = compare(a, b, &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    assert!(ab.distance > 0.05 && ab.distance <= 1.0);
    assert!((ab.distance - ba.distance).abs() < 1e-12);
    assert_eq!(ab.distance.to_bits(), again.distance.to_bits());
}

#[test]
fn empirical_coverage_matches_exact_coverage() {
    let mut rng = fastrand::Rng::with_seed(7);
    let base = tabular(random_table(N, 2, &mut rng));
    let config = CanonConfig {
        sample_size: 20_000,
        ..config(0.9)
    };
    let mut exact = chain_sampler(N);
    let mut opaque = Opaque(chain_sampler(N));
    let ce = canonicalize(base.clone(), &mut exact, &config, StateSpaceKind::Tabular).unwrap();
    let co = canonicalize(base, &mut opaque, &config, StateSpaceKind::Tabular).unwrap();

    let fe = ce.potential().table().unwrap();
    let fo = co.potential().table().unwrap();
    let fe: Vec<f64> = fe.iter().map(|v| v - fe[0]).collect();
    let fo: Vec<f64> = fo.iter().map(|v| v - fo[0]).collect();
    assert!(approx(&fe, &fo, 0.2), "{fe:?} vs {fo:?}");
}

#[test]
fn undiscounted_comparison_needs_episodes() {
    let mut rng = fastrand::Rng::with_seed(8);
    let base = tabular(random_table(N, 2, &mut rng));
    let mut sampler = chain_sampler(N);
    let err = canonicalize(base.clone(), &mut sampler, &config(1.0), StateSpaceKind::Tabular)
        .unwrap_err();
    assert!(matches!(err, CanonError::Config(_)));

    let mut episodic = chain_sampler(N).episodic();
    let other = shaped(&base, random_potential(N, &mut rng), 1.0);
    let config = CanonConfig {
        regularization: 1e-6,
        ..config(1.0)
    };
    let result = compare(base, other, &mut episodic, &config, StateSpaceKind::Tabular).unwrap();
    assert!(result.distance < 1e-6, "{}", result.distance);
}

#[test]
fn constant_rewards_are_degenerate_under_zscore() {
    let constant = tabular(Array3::from_elem((N, 2, N), 2.5));
    let mut sampler = chain_sampler(N);
    let config = CanonConfig {
        degenerate_retries: 2,
        regularization: 0.0,
        ..config(0.9)
    };
    let err = canonicalize(constant.clone(), &mut sampler, &config, StateSpaceKind::Tabular)
        .unwrap_err();
    assert!(matches!(err, CanonError::DegenerateSample { attempts: 3, .. }), "{err}");

    let identity = CanonConfig {
        normalization: Normalization::Identity,
        ..config
    };
    let c = canonicalize(constant, &mut sampler, &identity, StateSpaceKind::Tabular).unwrap();
    let values = c.evaluate(&sampler.sample(100, &mut fastrand::Rng::with_seed(0))).unwrap();
    assert!(values.iter().all(|v| v.abs() < 1e-6));
}

#[test]
fn fixed_scale_sets_the_sample_range() {
    let mut rng = fastrand::Rng::with_seed(9);
    let base = tabular(random_table(N, 2, &mut rng));
    let config = CanonConfig {
        normalization: Normalization::FixedScale,
        reference_scale: 2.0,
        ..config(0.9)
    };
    let mut sampler = chain_sampler(N);
    let c = canonicalize(base, &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
    let values = c.evaluate(&sampler.sample(5000, &mut rng)).unwrap();
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert!(hi - lo <= 2.0 + 1e-9);
    assert!(hi - lo > 1.5);
}

#[test]
fn mismatched_spaces_are_rejected() {
    let mut rng = fastrand::Rng::with_seed(10);
    let small: Arc<dyn RewardModel> =
        Arc::new(TabularReward::new(random_table(N - 1, 2, &mut rng)).unwrap());
    let mut sampler = chain_sampler(N);
    let err = canonicalize(small, &mut sampler, &config(0.9), StateSpaceKind::Tabular).unwrap_err();
    assert!(matches!(err, CanonError::ShapeMismatch(_)));
}

#[test]
fn pure_shaping_is_degenerate() {
    let mut rng = fastrand::Rng::with_seed(12);
    let zero = tabular(Array3::zeros((N, 2, N)));
    let pure = shaped(&zero, random_potential(N, &mut rng).mapv(|v| 50.0 * v), 0.9);
    let config = CanonConfig {
        discount: 0.9,
        ..CanonConfig::default()
    };
    let mut sampler = chain_sampler(N);

    let err = canonicalize(pure.clone(), &mut sampler, &config, StateSpaceKind::Tabular).unwrap_err();
    assert!(matches!(err, CanonError::DegenerateSample { .. }), "{err}");

    let other = tabular(random_table(N, 2, &mut rng));
    let err = compare(pure, other, &mut sampler, &config, StateSpaceKind::Tabular).unwrap_err();
    assert!(matches!(err, CanonError::DegenerateSample { .. }), "{err}");
}

#[test]
fn tabular_fit_recovers_an_injected_potential() {
    let mut rng = fastrand::Rng::with_seed(13);
    let f = random_potential(5, &mut rng);
    let coverage = chain_sampler(5).transition_table().unwrap();

    let pure = shape(&Array3::zeros((5, 2, 5)), &f, 0.9).unwrap();
    let fitted = fit_potential_tabular(&pure, &coverage, 0.9, 0.0).unwrap();
    assert!(approx(fitted.as_slice().unwrap(), f.as_slice().unwrap(), 1e-9), "{fitted} vs {f}");

    let base = random_table(5, 2, &mut rng);
    let with_base = fit_potential_tabular(&base, &coverage, 0.9, 0.0).unwrap();
    let shaped_fit = fit_potential_tabular(&shape(&base, &f, 0.9).unwrap(), &coverage, 0.9, 0.0).unwrap();
    let injected = &shaped_fit - &with_base;
    assert!(approx(injected.as_slice().unwrap(), f.as_slice().unwrap(), 1e-9), "{injected} vs {f}");
}
