//! CLI configuration: the shared profile file plus `GlobalOpts` overrides.

use clap::ValueEnum;
use secrecy::SecretString;

use smartzone_config::{Config, Profile, config_path, controller_config, resolve_password};
use smartzone_core::ControllerConfig;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Profile name used when the controller comes from flags alone.
const FLAGS_PROFILE: &str = "default";

pub fn load() -> Result<Config, CliError> {
    Ok(smartzone_config::load_config()?)
}

/// Use `defaults.output` when `--output` was not given.
pub fn apply_output_default(config: &Config, global: &mut GlobalOpts) -> Result<(), CliError> {
    if global.output.is_some() {
        return Ok(());
    }
    let name = &config.defaults.output;
    let format = OutputFormat::from_str(name, true).map_err(|_| CliError::Config {
        message: format!("defaults.output '{name}' is not one of json, yaml, table"),
    })?;
    global.output = Some(format);
    Ok(())
}

/// Build a `ControllerConfig` from the loaded config, profile, and CLI flags.
///
/// Flags override profile values. With no profile at all, `--controller`
/// and `--username` (or their env vars) must be given.
pub fn build_controller_config(
    config: &Config,
    global: &GlobalOpts,
) -> Result<ControllerConfig, CliError> {
    let (name, mut profile) = match config.profile(global.profile.as_deref())? {
        Some((name, profile)) => (name.to_owned(), profile.clone()),
        None => {
            if global.controller.is_none() {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
            (FLAGS_PROFILE.to_owned(), Profile::default())
        }
    };

    apply_overrides(&mut profile, global);
    let flag = global.password.clone().map(SecretString::from);
    let password = resolve_password(&profile, &name, flag)?;
    Ok(controller_config(&profile, &name, &config.defaults, password)?)
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(controller) = &global.controller {
        profile.controller.clone_from(controller);
    }
    if let Some(username) = &global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
}
