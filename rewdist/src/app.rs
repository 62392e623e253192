//! Subcommand implementations.
//!
//! Each one sets up logging, resolves the [`CanonConfig`] from the shared
//! flags and hands off to the library.

use crate::CommonArgs;
use anyhow::{bail, Context, Result};
use canon::tabular::{closest_reward, direct_sq_divergence};
use canon::{
    compare, cross_distance, CanonConfig, DistanceMatrix, RewardRegistry, StateSpaceKind,
    TableSampler,
};
use envs::{gridworld, point_mass, Env, EnvSampler, Gridworld, PointMass};
use ndarray::Array2;
use std::path::Path;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_config(args: &CommonArgs) -> Result<CanonConfig> {
    let mut config = match &args.config {
        Some(path) => CanonConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => CanonConfig::default(),
    };
    if let Some(discount) = args.discount {
        config.discount = discount;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

/// Canonical distances between the gridworld rewards, and how far each
/// target lies from the closest member of each source's equivalence class.
pub fn gridworld(args: &CommonArgs, only: &[String]) -> Result<()> {
    init_logging();
    let config = resolve_config(args)?;
    let world = Gridworld::new(3, 3);

    let mut selected = Vec::new();
    for (name, reward) in gridworld::named_rewards() {
        let wanted = if only.is_empty() {
            name != "all_zero"
        } else {
            only.iter().any(|o| o == name)
        };
        if wanted {
            selected.push((name.to_string(), reward));
        }
    }
    if let Some(missing) = only.iter().find(|o| !selected.iter().any(|(n, _)| n == *o)) {
        bail!("unknown gridworld reward `{missing}`");
    }
    tracing::info!(rewards = selected.len(), discount = config.discount, "comparing gridworld rewards");

    let models = selected
        .iter()
        .map(|(name, r)| Ok((name.clone(), r.model(config.discount)?)))
        .collect::<canon::Result<Vec<_>>>()?;
    let mut sampler = EnvSampler::new(world.clone());
    let distances = cross_distance(&models, &models, &mut sampler, &config, StateSpaceKind::Tabular)?;

    let coverage = world
        .transition_table()
        .context("gridworld has no transition table")?;
    let tables = selected
        .iter()
        .map(|(_, r)| r.table(config.discount))
        .collect::<canon::Result<Vec<_>>>()?;
    let n = tables.len();
    let mut values = Array2::zeros((n, n));
    for (i, source) in tables.iter().enumerate() {
        for (j, target) in tables.iter().enumerate() {
            let closest = closest_reward(source, target, &coverage, config.discount, config.regularization)?;
            values[[i, j]] = direct_sq_divergence(&closest.reward, target, Some(&coverage))?;
        }
    }
    let names: Vec<String> = selected.into_iter().map(|(n, _)| n).collect();
    let divergence = DistanceMatrix {
        rows: names.clone(),
        cols: names,
        values,
    };

    if args.json {
        let out = serde_json::json!({
            "config": config,
            "distance": distances,
            "closest_divergence": divergence,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("canonical distance ({:?})\n{distances}", config.metric);
        println!("closest-reward divergence (source rows, target columns)\n{divergence}");
    }
    Ok(())
}

/// Canonical distances between the point-mass rewards.
pub fn point_mass(args: &CommonArgs) -> Result<()> {
    init_logging();
    let config = resolve_config(args)?;
    let env = PointMass::new();
    let rewards = point_mass::named_rewards(&env, config.discount);
    let mut sampler = EnvSampler::new(env);
    let distances = cross_distance(&rewards, &rewards, &mut sampler, &config, StateSpaceKind::Continuous)?;
    if args.json {
        let out = serde_json::json!({ "config": config, "distance": distances });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("canonical distance ({:?})\n{distances}", config.metric);
    }
    Ok(())
}

/// Distance between two reward files under uniform coverage of their
/// state and action spaces.
pub fn compare_files(args: &CommonArgs, format: &str, first: &Path, second: &Path) -> Result<()> {
    init_logging();
    let config = resolve_config(args)?;
    let registry = RewardRegistry::default();
    let a = registry
        .load(format, first)
        .with_context(|| format!("loading {}", first.display()))?;
    let b = registry
        .load(format, second)
        .with_context(|| format!("loading {}", second.display()))?;

    let spec = *a.spec();
    let Some((n_states, n_actions)) = spec.tabular_dims() else {
        bail!("`compare` needs rewards over discrete states and actions");
    };
    let sampler = TableSampler::uniform(n_states, n_actions)?;
    let episodic = spec.episodic || b.spec().episodic;
    let mut sampler = if episodic { sampler.episodic() } else { sampler };

    let result = compare(a, b, &mut sampler, &config, StateSpaceKind::Tabular)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{:.6}", result.distance);
        for warning in &result.warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}
