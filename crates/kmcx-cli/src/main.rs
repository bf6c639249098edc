mod cli;
mod commands;
mod error;
mod prompt;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use colored::Colorize;
use kmcx_core::logging;

fn init_logging(cli: &Cli) {
    if cli.verbose > 0 {
        logging::init_stderr_logger(logging::verbosity_filter(cli.verbose));
        return;
    }

    let logging_config = kmcx_core::config::load_config()
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = logging::init_session_logger(&logging_config) {
        eprintln!(
            "{}",
            format!("[ERROR] Failed to initialize session logger: {}", e).red()
        );
    }
}

fn main() {
    let cli = Cli::parse();

    if let Commands::Completions(args) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(args.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    init_logging(&cli);

    if let Err(e) = commands::dispatch(cli) {
        tracing::error!("{}", e);
        eprintln!("{}", format!("[ERROR] {}", e).red());
        std::process::exit(e.exit_code());
    }
}
