use crate::error::{CanonError, Result};
use crate::model::{RewardModel, TabularReward};
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub type Loader = Box<dyn Fn(&Path) -> Result<Arc<dyn RewardModel>> + Send + Sync>;

/// On-disk tabular reward. Exactly one of `rewards` (flattened
/// `[s, a, s']`, row-major) and `state_rewards` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabularRewardFile {
    pub n_states: usize,
    pub n_actions: usize,
    #[serde(default)]
    pub episodic: bool,
    #[serde(default)]
    pub rewards: Option<Vec<f64>>,
    #[serde(default)]
    pub state_rewards: Option<Vec<f64>>,
}

impl TabularRewardFile {
    pub fn into_model(self) -> Result<TabularReward> {
        let (ns, na) = (self.n_states, self.n_actions);
        let model = match (self.rewards, self.state_rewards) {
            (Some(flat), None) => {
                let table = Array3::from_shape_vec((ns, na, ns), flat)
                    .map_err(|e| CanonError::Load(format!("reward table: {e}")))?;
                TabularReward::new(table)?
            }
            (None, Some(per_state)) if per_state.len() == ns => {
                TabularReward::from_state_rewards(&Array1::from(per_state), na)?
            }
            (None, Some(per_state)) => {
                return Err(CanonError::Load(format!(
                    "{} state rewards for {ns} states",
                    per_state.len()
                )))
            }
            _ => {
                return Err(CanonError::Load(
                    "expected exactly one of `rewards` and `state_rewards`".into(),
                ))
            }
        };
        Ok(if self.episodic { model.episodic() } else { model })
    }
}

pub fn load_tabular_json(path: &Path) -> Result<Arc<dyn RewardModel>> {
    let text = std::fs::read_to_string(path)?;
    let file: TabularRewardFile = serde_json::from_str(&text)?;
    Ok(Arc::new(file.into_model()?))
}

/// Loaders for reward models keyed by format name.
pub struct RewardRegistry {
    loaders: HashMap<String, Loader>,
}

impl Default for RewardRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("tabular-json", Box::new(load_tabular_json));
        registry
    }
}

impl RewardRegistry {
    /// Registry without any loader.
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Replaces any loader already registered under `format`.
    pub fn register(&mut self, format: &str, loader: Loader) {
        self.loaders.insert(format.to_string(), loader);
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn load(&self, format: &str, path: impl AsRef<Path>) -> Result<Arc<dyn RewardModel>> {
        let path = path.as_ref();
        let loader = self.loaders.get(format).ok_or_else(|| {
            CanonError::Load(format!(
                "unknown reward format `{format}` (known: {})",
                self.formats().join(", ")
            ))
        })?;
        debug!(format, path = %path.display(), "loading reward model");
        loader(path)
    }
}
