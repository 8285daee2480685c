//! CLI command implementations

use anyhow::{Context, Result};
use sshbox_config::{ConfigFile, DriverConfig};
use sshbox_core::{build_context, Driver, State};
use std::path::Path;

fn load_config(path: &Path) -> Result<DriverConfig> {
    let config = ConfigFile::load_from(path)
        .and_then(ConfigFile::resolve)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

fn load_state(path: &Path) -> Result<State> {
    State::load_from(path).with_context(|| format!("Failed to read state from {}", path.display()))
}

fn save_state(state: &State, path: &Path) -> Result<()> {
    state
        .save_to(path)
        .with_context(|| format!("Failed to write state to {}", path.display()))
}

/// Bring the instance up; progress is saved even when a step fails
pub fn create(config_path: &Path, state_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let mut state = load_state(state_path)?;
    let driver = Driver::connect(config)?;

    let result = driver.create(&mut state);
    save_state(&state, state_path)?;
    result?;

    println!(
        "{} ready at {}@{}:{}",
        driver.config().container_name,
        driver.config().username,
        state.hostname.as_deref().unwrap_or_default(),
        state.port.unwrap_or_default()
    );
    Ok(())
}

/// Tear the instance down
pub fn destroy(config_path: &Path, state_path: &Path) -> Result<()> {
    let mut state = load_state(state_path)?;
    if state.container_id.is_none() {
        println!("No container to destroy");
        return Ok(());
    }

    let config = load_config(config_path)?;
    let driver = Driver::connect(config)?;

    let result = driver.destroy(&mut state);
    save_state(&state, state_path)?;
    result?;

    println!("Container destroyed");
    Ok(())
}

/// Print the build context
pub fn dockerfile(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    print!("{}", build_context(&config)?);
    Ok(())
}

/// Print the recorded state and, when there is a container, its status
pub fn status(config_path: &Path, state_path: &Path) -> Result<()> {
    let state = load_state(state_path)?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    if state.container_id.is_none() {
        println!("No container recorded");
        return Ok(());
    }

    let config = load_config(config_path)?;
    let driver = Driver::connect(config)?;
    match driver.status(&state)? {
        Some(details) => println!("Container {} is {}", details.name, details.status),
        None => println!("Container no longer exists"),
    }
    Ok(())
}
