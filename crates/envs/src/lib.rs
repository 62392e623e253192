//! Reference environments for reward comparison.
//!
//! Each environment implements [`Env`], a reward-free transition function.
//! [`EnvSampler`] turns one into the coverage distribution of
//! [`canon::TransitionSampler`], and [`RandomRollout`] into whole episodes.
//! The gridworld and point-mass modules also ship families of named rewards,
//! some of them equivalent by construction.

#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

pub mod chain;
pub mod env;
pub mod gridworld;
pub mod point_mass;
pub mod rollout;

pub use chain::RandomMdp;
pub use env::Env;
pub use gridworld::{GridReward, Gridworld};
pub use point_mass::PointMass;
pub use rollout::{EnvSampler, RandomRollout};
