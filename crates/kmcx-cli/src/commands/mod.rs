pub mod paths;
pub mod profiles;
pub mod submit;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use kmcx_core::config::{config_path, load_config_from, Config};
use std::path::PathBuf;

/// Configuration as loaded for one command, with the file it came from.
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: Config,
}

pub fn load() -> Result<LoadedConfig, CliError> {
    let path = config_path()?;
    let config = load_config_from(&path)?;
    Ok(LoadedConfig { path, config })
}

pub fn dispatch(cli: Cli) -> Result<(), CliError> {
    let profile = cli.profile.as_deref();
    match cli.command {
        Commands::Validate(args) => validate::handle_validate(args),
        Commands::Paths(args) => paths::handle_paths(args, profile),
        Commands::Submit(args) => submit::handle_submit(args, profile),
        Commands::Profiles => profiles::handle_profiles(profile),
        // Handled before logging is set up.
        Commands::Completions(_) => Ok(()),
    }
}
