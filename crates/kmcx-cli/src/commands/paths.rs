use super::load;
use crate::cli::PathsArgs;
use crate::error::CliError;
use colored::Colorize;
use kmcx_client::remote::paths::{construct_remote_directory_list, RemoteDirectoryPlan};

fn print_plan(label: &str, plan: &RemoteDirectoryPlan) {
    println!("{} {}", format!("{label}:").bold(), plan.target());
    for dir in plan.iter() {
        println!("  {}", dir);
    }
}

pub fn handle_paths(args: PathsArgs, profile: Option<&str>) -> Result<(), CliError> {
    let loaded = load()?;
    let (name, profile) = loaded.config.profile(profile)?;
    let target = profile.cluster_target(name)?;

    let home = args
        .home
        .unwrap_or_else(|| format!("/home/{}", target.username));
    tracing::debug!("Planning directories for '{}' below {}", name, home);

    let base = construct_remote_directory_list(&home, &target.workspace, &target.job_base_directory);
    let build = construct_remote_directory_list(&home, &target.workspace, &target.build_directory);

    println!(
        "Profile '{}' ({}@{}:{})",
        name.cyan(),
        target.username,
        target.host,
        target.port
    );
    print_plan("Job base", &base);
    print_plan("Build", &build);
    Ok(())
}
