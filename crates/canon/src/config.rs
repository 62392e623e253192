use crate::error::{CanonError, Result};
use crate::space::EnvSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Affine normalization applied after potential removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Zero mean, unit standard deviation.
    #[default]
    Zscore,
    /// Keep the deshaped reward as is.
    Identity,
    /// Zero mean, sample range rescaled to `reference_scale`.
    FixedScale,
}

/// Distance computed between two canonical rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    #[default]
    Direct,
    AffineAligned,
    Pearson,
}

/// How the two directions of an affine-aligned distance are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symmetrization {
    #[default]
    Mean,
    Max,
}

/// Which potential solver to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateSpaceKind {
    Tabular,
    Continuous,
}

/// Settings of the gradient-based potential fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Iterations without a moving-average improvement before stopping.
    pub patience: usize,
    pub averaging_window: usize,
    /// Minimum decrease of the moving-average loss that counts as progress.
    pub tolerance: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Hidden layer widths of the potential network. Empty means linear.
    pub hidden_sizes: Vec<usize>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5000,
            patience: 200,
            averaging_window: 50,
            tolerance: 1e-6,
            learning_rate: 0.01,
            batch_size: 256,
            hidden_sizes: Vec::new(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_iterations", self.max_iterations),
            ("patience", self.patience),
            ("averaging_window", self.averaging_window),
            ("batch_size", self.batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CanonError::Config(format!("{name} must be at least 1")));
            }
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(CanonError::Config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(CanonError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.hidden_sizes.contains(&0) {
            return Err(CanonError::Config("hidden layer widths must be non-zero".into()));
        }
        Ok(())
    }
}

/// Every knob of canonicalization and comparison.
///
/// Deserializes from JSON with every field optional; the optimizer settings
/// sit at the top level next to the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonConfig {
    pub discount: f64,
    pub normalization: Normalization,
    pub metric: Metric,
    pub symmetrization: Symmetrization,
    #[serde(flatten)]
    pub optimizer: OptimizerConfig,
    pub seed: u64,
    /// Ridge term added to the tabular normal equations.
    pub regularization: f64,
    /// Size of the normalization and distance samples.
    pub sample_size: usize,
    /// Extra draws allowed when a sample has too little spread.
    pub degenerate_retries: usize,
    pub reference_scale: f64,
    pub epsilon: f64,
}

impl Default for CanonConfig {
    fn default() -> Self {
        Self {
            discount: 0.99,
            normalization: Normalization::default(),
            metric: Metric::default(),
            symmetrization: Symmetrization::default(),
            optimizer: OptimizerConfig::default(),
            seed: 0,
            regularization: 1e-8,
            sample_size: 4096,
            degenerate_retries: 3,
            reference_scale: 1.0,
            epsilon: 1e-8,
        }
    }
}

impl CanonConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.discount > 0.0 && self.discount <= 1.0) {
            return Err(CanonError::Config(format!(
                "discount must lie in (0, 1], got {}",
                self.discount
            )));
        }
        if self.sample_size < 2 {
            return Err(CanonError::Config("sample_size must be at least 2".into()));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(CanonError::Config(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if !(self.reference_scale.is_finite() && self.reference_scale > 0.0) {
            return Err(CanonError::Config(format!(
                "reference_scale must be positive, got {}",
                self.reference_scale
            )));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(CanonError::Config(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        self.optimizer.validate()
    }

    /// An undiscounted objective needs episodes that end.
    pub fn check_discount(&self, spec: &EnvSpec) -> Result<()> {
        if self.discount >= 1.0 && !spec.episodic {
            return Err(CanonError::Config(
                "discount of 1 requires an episodic environment".into(),
            ));
        }
        Ok(())
    }
}
