use std::{fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use physics_stress_core::HarnessConfig;

/// Command-line values that take precedence over the configuration file.
#[derive(Clone, Debug, Default)]
pub(crate) struct ConfigOverrides {
    pub(crate) spawns_per_tick: Option<u32>,
    pub(crate) max_seconds: Option<f32>,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) file_name: Option<String>,
    pub(crate) seed: Option<u64>,
}

/// Loads the harness configuration, falling back to defaults when no file is given.
pub(crate) fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            parse(&contents)
                .with_context(|| format!("failed to parse config at {}", path.display()))?
        }
        None => HarnessConfig::default(),
    };

    apply_overrides(&mut config, overrides);
    validate(&config)?;
    Ok(config)
}

fn parse(contents: &str) -> Result<HarnessConfig> {
    toml::from_str(contents).context("invalid harness config toml")
}

fn apply_overrides(config: &mut HarnessConfig, overrides: &ConfigOverrides) {
    if let Some(spawns_per_tick) = overrides.spawns_per_tick {
        config.grid.spawns_per_tick = spawns_per_tick;
    }
    if let Some(max_seconds) = overrides.max_seconds {
        config.recording.max_seconds = max_seconds;
    }
    if let Some(directory) = &overrides.log_dir {
        config.log.directory.clone_from(directory);
    }
    if let Some(file_name) = &overrides.file_name {
        config.log.file_name.clone_from(file_name);
    }
    if let Some(seed) = overrides.seed {
        config.grid.seed = seed;
    }
}

fn validate(config: &HarnessConfig) -> Result<()> {
    if config.grid.spawns_per_tick == 0 {
        bail!("spawns_per_tick must be at least 1");
    }
    if config.grid.columns == 0 {
        bail!("grid columns must be at least 1");
    }
    if !(config.grid.spacing.is_finite() && config.grid.elevation.is_finite()) {
        bail!(
            "grid spacing and elevation must be finite, got {} and {}",
            config.grid.spacing,
            config.grid.elevation
        );
    }
    if !(config.grid.jitter.is_finite() && config.grid.jitter >= 0.0) {
        bail!("grid jitter must be a finite non-negative distance, got {}", config.grid.jitter);
    }
    if !(config.recording.max_seconds.is_finite() && config.recording.max_seconds > 0.0) {
        bail!(
            "recording window must be a positive number of seconds, got {}",
            config.recording.max_seconds
        );
    }
    if config.log.file_name.trim().is_empty() {
        bail!("log file name must not be empty");
    }
    Ok(())
}

/// Rejects a fixed frame delta that would never advance the recording window.
pub(crate) fn validate_fixed_dt(fixed_dt: Option<f32>) -> Result<()> {
    match fixed_dt {
        Some(delta) if !(delta.is_finite() && delta > 0.0) => {
            bail!("fixed frame delta must be a positive number of seconds, got {delta}")
        }
        _ => Ok(()),
    }
}
