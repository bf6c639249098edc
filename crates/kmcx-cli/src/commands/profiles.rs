use super::load;
use crate::error::CliError;
use colored::Colorize;
use kmcx_core::config::ExecutionMode;

pub fn handle_profiles(requested: Option<&str>) -> Result<(), CliError> {
    let loaded = load()?;
    let config = &loaded.config;
    let active = requested.or(config.active_profile.as_deref());

    if config.profiles.is_empty() {
        println!("No submission profiles in {}", loaded.path.display());
        return Ok(());
    }

    for (name, profile) in &config.profiles {
        let marker = if Some(name.as_str()) == active {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        let location = match profile.mode {
            ExecutionMode::Local => String::new(),
            ExecutionMode::Cluster => format!(
                " {}@{}:{}",
                profile.username.as_deref().unwrap_or("?"),
                profile.host.as_deref().unwrap_or("?"),
                profile.port
            ),
        };
        let trust = if profile.host_fingerprint.is_some() {
            " [host key pinned]".dimmed().to_string()
        } else {
            String::new()
        };
        println!("{} {} ({}){}{}", marker, name, profile.mode, location, trust);
    }
    Ok(())
}
