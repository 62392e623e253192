use crate::canonical::{canonicalize, CanonicalReward};
use crate::config::{CanonConfig, Metric, StateSpaceKind, Symmetrization};
use crate::error::{CanonError, NonConvergenceWarning, Result};
use crate::model::RewardModel;
use crate::sampler::TransitionSampler;
use crate::stats;
use ndarray::Array2;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Salt separating the held-out distance sample from the fit samples.
const HELD_OUT_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Least-squares map `y ~ scale * x + shift` with `scale >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AffineFit {
    pub scale: f64,
    pub shift: f64,
}

impl AffineFit {
    /// A reward cannot be aligned to another through a sign flip, so negative
    /// slopes are clamped to zero and the shift refitted.
    pub fn fit(x: &[f64], y: &[f64], eps: f64) -> Self {
        let var = stats::variance(x);
        let slope = if var > eps {
            stats::covariance(x, y) / var
        } else {
            0.0
        };
        let scale = slope.max(0.0);
        Self {
            scale,
            shift: stats::mean(y) - scale * stats::mean(x),
        }
    }

    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| self.scale * v + self.shift).collect()
    }
}

/// Outcome of a comparison.
#[derive(Debug, Clone, Serialize)]
pub struct DistanceResult {
    pub distance: f64,
    pub metric: Metric,
    pub sample_size: usize,
    pub affine_aligned: bool,
    /// Fit of the second reward onto the first, then the reverse.
    pub alignment: Option<(AffineFit, AffineFit)>,
    pub warnings: Vec<NonConvergenceWarning>,
}

/// Scale-normalized mean squared difference, in `[0, 1]`.
///
/// Normalized by `2 * (E[a^2] + E[b^2])`, which bounds the value by one for
/// any pair. When both samples are close to zero the squared
/// `reference_scale` is used instead and the result clipped.
pub fn direct_distance(a: &[f64], b: &[f64], reference_scale: f64, eps: f64) -> f64 {
    let msd = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len().max(1) as f64;
    let pooled = 2.0 * (stats::mean_square(a) + stats::mean_square(b));
    if pooled < eps {
        (msd / reference_scale.powi(2)).min(1.0)
    } else {
        (msd / pooled).min(1.0)
    }
}

/// Direct distance after the best non-negative affine map in each direction.
pub fn affine_aligned_distance(
    a: &[f64],
    b: &[f64],
    symmetrization: Symmetrization,
    reference_scale: f64,
    eps: f64,
) -> (f64, AffineFit, AffineFit) {
    let forward = AffineFit::fit(b, a, eps);
    let backward = AffineFit::fit(a, b, eps);
    let d_forward = direct_distance(a, &forward.apply(b), reference_scale, eps);
    let d_backward = direct_distance(b, &backward.apply(a), reference_scale, eps);
    let distance = match symmetrization {
        Symmetrization::Mean => 0.5 * (d_forward + d_backward),
        Symmetrization::Max => d_forward.max(d_backward),
    };
    (distance, forward, backward)
}

/// `sqrt((1 - rho) / 2)` for the Pearson correlation `rho`, in `[0, 1]`.
pub fn pearson_distance(a: &[f64], b: &[f64], eps: f64) -> Result<f64> {
    let rho = stats::pearson(a, b, eps).ok_or_else(|| CanonError::DegenerateSample {
        attempts: 1,
        spread: stats::std_dev(a).min(stats::std_dev(b)),
    })?;
    Ok(((1.0 - rho) / 2.0).max(0.0).sqrt())
}

/// Applies the configured metric to paired reward samples.
pub fn reduce(a: &[f64], b: &[f64], config: &CanonConfig) -> Result<DistanceResult> {
    if a.len() != b.len() {
        return Err(CanonError::ShapeMismatch(format!(
            "paired samples of length {} and {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(CanonError::DegenerateSample {
            attempts: 1,
            spread: 0.0,
        });
    }
    let (distance, alignment) = match config.metric {
        Metric::Direct => (
            direct_distance(a, b, config.reference_scale, config.epsilon),
            None,
        ),
        Metric::AffineAligned => {
            let (d, fwd, bwd) = affine_aligned_distance(
                a,
                b,
                config.symmetrization,
                config.reference_scale,
                config.epsilon,
            );
            (d, Some((fwd, bwd)))
        }
        Metric::Pearson => (pearson_distance(a, b, config.epsilon)?, None),
    };
    Ok(DistanceResult {
        distance,
        metric: config.metric,
        sample_size: a.len(),
        affine_aligned: config.metric == Metric::AffineAligned,
        alignment,
        warnings: Vec::new(),
    })
}

/// Rng for the held-out sample shared by every comparison under `config`.
fn held_out_rng(config: &CanonConfig) -> fastrand::Rng {
    fastrand::Rng::with_seed(config.seed ^ HELD_OUT_SALT)
}

/// Distance between two already canonical rewards on a held-out sample.
pub fn compare_canonical(
    a: &CanonicalReward,
    b: &CanonicalReward,
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
) -> Result<DistanceResult> {
    a.spec()
        .ensure_compatible(b.spec(), "compared rewards have different spaces")?;
    let mut rng = held_out_rng(config);
    let batch = sampler.sample(config.sample_size, &mut rng);
    let ra = a.evaluate(&batch)?;
    let rb = b.evaluate(&batch)?;
    let mut result = reduce(&ra, &rb, config)?;
    result
        .warnings
        .extend(a.warnings().iter().chain(b.warnings()).cloned());
    Ok(result)
}

/// Canonicalizes both rewards and measures the distance between them.
///
/// Symmetric in its arguments and zero for rewards that differ only by
/// potential shaping (and positive rescaling, under normalization).
pub fn compare(
    model_a: Arc<dyn RewardModel>,
    model_b: Arc<dyn RewardModel>,
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
    kind: StateSpaceKind,
) -> Result<DistanceResult> {
    model_a
        .spec()
        .ensure_compatible(model_b.spec(), "compared rewards have different spaces")?;
    let a = canonicalize(model_a, sampler, config, kind)?;
    let b = canonicalize(model_b, sampler, config, kind)?;
    let result = compare_canonical(&a, &b, sampler, config)?;
    info!(
        distance = result.distance,
        metric = ?result.metric,
        samples = result.sample_size,
        "compared rewards"
    );
    Ok(result)
}

/// Pairwise distances between two labelled sets of rewards.
#[derive(Debug, Clone, Serialize)]
pub struct DistanceMatrix {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub values: Array2<f64>,
}

impl DistanceMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.rows.iter().position(|r| r == row)?;
        let j = self.cols.iter().position(|c| c == col)?;
        Some(self.values[[i, j]])
    }
}

impl fmt::Display for DistanceMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .chain(&self.cols)
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(8);
        write!(f, "{:width$}", "")?;
        for c in &self.cols {
            write!(f, " {c:>width$}")?;
        }
        writeln!(f)?;
        for (i, r) in self.rows.iter().enumerate() {
            write!(f, "{r:width$}")?;
            for j in 0..self.cols.len() {
                write!(f, " {:>width$.4}", self.values[[i, j]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub type NamedReward = (String, Arc<dyn RewardModel>);

fn canonicalize_all(
    set: &[NamedReward],
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
    kind: StateSpaceKind,
) -> Result<Vec<CanonicalReward>> {
    set.iter()
        .map(|(_, m)| canonicalize(Arc::clone(m), sampler, config, kind))
        .collect()
}

/// Distance between every pair drawn from `xs` and `ys`.
///
/// Each reward is canonicalized once and every pair is evaluated on the same
/// held-out sample.
pub fn cross_distance(
    xs: &[NamedReward],
    ys: &[NamedReward],
    sampler: &mut dyn TransitionSampler,
    config: &CanonConfig,
    kind: StateSpaceKind,
) -> Result<DistanceMatrix> {
    let cx = canonicalize_all(xs, sampler, config, kind)?;
    let cy = canonicalize_all(ys, sampler, config, kind)?;

    let mut rng = held_out_rng(config);
    let batch = sampler.sample(config.sample_size, &mut rng);
    let evaluate = |set: &[CanonicalReward]| {
        set.iter()
            .map(|c| c.evaluate(&batch))
            .collect::<Result<Vec<_>>>()
    };
    let rx = evaluate(&cx)?;
    let ry = evaluate(&cy)?;

    let mut values = Array2::zeros((xs.len(), ys.len()));
    for (i, a) in rx.iter().enumerate() {
        for (j, b) in ry.iter().enumerate() {
            values[[i, j]] = reduce(a, b, config)?.distance;
        }
    }
    Ok(DistanceMatrix {
        rows: xs.iter().map(|(n, _)| n.clone()).collect(),
        cols: ys.iter().map(|(n, _)| n.clone()).collect(),
        values,
    })
}

/// Percentile bootstrap interval of a distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapInterval {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

/// Resamples the paired values `n_resamples` times and reports the
/// `confidence` interval and the median of the configured metric.
pub fn bootstrap(
    a: &[f64],
    b: &[f64],
    config: &CanonConfig,
    n_resamples: usize,
    confidence: f64,
    rng: &mut fastrand::Rng,
) -> Result<BootstrapInterval> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(CanonError::Config(format!(
            "confidence must lie in (0, 1), got {confidence}"
        )));
    }
    if n_resamples == 0 {
        return Err(CanonError::Config("n_resamples must be at least 1".into()));
    }
    if a.len() != b.len() || a.is_empty() {
        return Err(CanonError::ShapeMismatch(format!(
            "paired samples of length {} and {}",
            a.len(),
            b.len()
        )));
    }
    let n = a.len();
    let mut ra = vec![0.0; n];
    let mut rb = vec![0.0; n];
    let mut estimates = Vec::with_capacity(n_resamples);
    for _ in 0..n_resamples {
        for k in 0..n {
            let i = rng.usize(..n);
            ra[k] = a[i];
            rb[k] = b[i];
        }
        estimates.push(reduce(&ra, &rb, config)?.distance);
    }
    estimates.sort_by(f64::total_cmp);
    let tail = (1.0 - confidence) / 2.0;
    Ok(BootstrapInterval {
        lower: stats::quantile_sorted(&estimates, tail),
        middle: stats::quantile_sorted(&estimates, 0.5),
        upper: stats::quantile_sorted(&estimates, 1.0 - tail),
    })
}
