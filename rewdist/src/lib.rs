//! # rewdist
//!
//! Policy-invariant distances between reward models.
//!
//! Rewards that differ by potential shaping or by a positive rescaling lead to
//! the same optimal policies, so comparing them pointwise is misleading. The
//! workspace canonicalizes each reward first and measures distances between
//! the canonical forms.
//!
//! ## The Crates
//!
//! -   **`rewdist`:** This crate. Re-exports the others and hosts the command
//!     line tool.
//! -   **[`canon`]:** Reward model and sampler interfaces, the tabular and
//!     continuous potential solvers, canonicalization and the distance
//!     metrics.
//! -   **[`ml`]:** The small reverse-mode tape, dense layers and optimizers
//!     that the continuous solver trains potentials with.
//! -   **[`envs`]:** Reference environments (gridworld, random finite MDP,
//!     point mass) with coverage samplers and families of named rewards.

pub use canon;
pub use envs;
pub use ml;
