//! # canon
//!
//! Policy-invariant comparison of reward models.
//!
//! Two rewards that differ by potential shaping, `gamma * f(s') - f(s)`,
//! induce the same optimal policies. This crate removes that freedom by
//! fitting the least-squares potential of a reward over a coverage
//! distribution and subtracting it, then normalizes what is left. Distances
//! between rewards are measured on the resulting canonical representatives,
//! so shaped and positively rescaled copies of a reward are at distance zero.
//!
//! * [`canonicalize`] builds a [`CanonicalReward`] with the exact tabular
//!   solver or the gradient-based continuous solver.
//! * [`compare`] canonicalizes two rewards and reduces them to a single
//!   [`DistanceResult`] on a held-out sample.
//! * [`cross_distance`] and [`bootstrap`] build distance matrices and
//!   confidence intervals on top of the same pieces.
//!
//! ```
//! use canon::{compare, CanonConfig, Potential, ShapedReward, StateSpaceKind, TableSampler, TabularReward};
//! use ndarray::Array1;
//! use std::sync::Arc;
//!
//! let base = Arc::new(TabularReward::from_state_rewards(&Array1::from(vec![0.0, 0.0, 1.0]), 2).unwrap());
//! let shaped = Arc::new(ShapedReward::new(
//!     base.clone(),
//!     Potential::Table(Array1::from(vec![3.0, -1.0, 0.5])),
//!     0.9,
//! ));
//! let mut sampler = TableSampler::uniform(3, 2).unwrap();
//! let config = CanonConfig { discount: 0.9, ..CanonConfig::default() };
//! let result = compare(base, shaped, &mut sampler, &config, StateSpaceKind::Tabular).unwrap();
//! assert!(result.distance < 1e-6);
//! ```

#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::similar_names
)]

pub mod canonical;
pub mod config;
pub mod continuous;
pub mod distance;
pub mod error;
pub mod model;
pub mod potential;
pub mod registry;
pub mod returns;
pub mod sampler;
pub mod space;
pub mod stats;
pub mod tabular;

pub use canonical::{canonicalize, CanonicalReward};
pub use config::{CanonConfig, Metric, Normalization, OptimizerConfig, StateSpaceKind, Symmetrization};
pub use continuous::{fit_potential_continuous, PotentialFit};
pub use distance::{
    bootstrap, compare, compare_canonical, cross_distance, direct_distance, reduce, AffineFit,
    BootstrapInterval, DistanceMatrix, DistanceResult, NamedReward,
};
pub use error::{CanonError, NonConvergenceWarning, Result};
pub use model::{
    AffineReward, FnReward, MlpReward, RewardModel, ShapedReward, SumReward, TabularReward,
    Trainable,
};
pub use potential::{Potential, PotentialNet};
pub use registry::{RewardRegistry, TabularRewardFile};
pub use returns::{Trajectory, TrajectorySampler};
pub use sampler::{empirical_table, TableSampler, TransitionSampler};
pub use space::{EnvSpec, Space, Transition};
pub use tabular::fit_potential_tabular;
