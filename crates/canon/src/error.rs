//! Error and warning types for canonicalization and comparison.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CanonError>;

#[derive(Error, Debug)]
pub enum CanonError {
    /// Invalid or underspecified configuration. Never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every sampled batch had too little spread to normalize.
    #[error("degenerate sample: reward spread {spread:e} after {attempts} draw(s)")]
    DegenerateSample { attempts: usize, spread: f64 },

    /// Models, samplers or tables defined over incompatible spaces.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The continuous fit produced a non-finite loss, from a learning rate
    /// that is too large or from non-finite rewards.
    #[error("potential fit diverged at iteration {iteration}: loss {loss}")]
    Diverged { iteration: usize, loss: f64 },

    /// Failure inside the autodiff tape.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),

    #[error("failed to load reward model: {0}")]
    Load(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The continuous solver hit `max_iterations` before the loss plateaued.
///
/// Not an error: the best parameters seen are still used, which at worst
/// under-canonicalizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonConvergenceWarning {
    pub iterations: usize,
    pub best_loss: f64,
    pub final_loss: f64,
}

impl fmt::Display for NonConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "potential fit did not converge after {} iterations (best moving-average loss {:.3e}, last {:.3e})",
            self.iterations, self.best_loss, self.final_loss
        )
    }
}
