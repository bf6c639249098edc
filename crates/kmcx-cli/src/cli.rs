use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kmcx")]
#[command(
    version,
    about = "Validate and dispatch kinetic Monte Carlo simulation jobs.",
    long_about = "Reads job batches written as TOML, checks them against the simulation engine's \
                  ranges and submits them to a cluster profile over SSH."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        help = "The submission profile to use (must be defined in config.toml)"
    )]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check a job batch file without submitting it")]
    Validate(ValidateArgs),

    #[command(about = "Show the remote directories a profile resolves to")]
    Paths(PathsArgs),

    #[command(about = "Submit a job batch through the selected profile")]
    Submit(SubmitArgs),

    #[command(about = "List configured submission profiles")]
    Profiles,

    #[command(about = "Generate shell completions")]
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(help = "Path to the job batch (TOML)")]
    pub batch: PathBuf,

    #[arg(long, help = "Print the engine input generated for each job")]
    pub render: bool,
}

#[derive(Args)]
pub struct PathsArgs {
    #[arg(
        long,
        help = "Remote home directory (defaults to /home/<username>)"
    )]
    pub home: Option<String>,
}

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(help = "Path to the job batch (TOML)")]
    pub batch: PathBuf,

    #[arg(
        long,
        help = "Trust an unknown host key without asking. A changed key is still refused."
    )]
    pub accept_new_host: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    #[arg(long, help = "Shell to generate completions for")]
    pub shell: Shell,
}
