//! `drivetune` command line interface.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use drivetune_core::{ConfigManager, Result};
use tracing::{debug, error};

use commands::Context;
use logging::LoggingConfig;

/// Browse a cloud drive and manage an offline music library.
#[derive(Parser, Debug)]
#[command(name = "drivetune", version, about)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token for the drive API
    #[arg(long, env = "DRIVETUNE_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Show debug output on the console
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a remote folder (the drive root when no id is given)
    Ls {
        folder_id: Option<String>,

        /// Follow paging links and list every item
        #[arg(long)]
        all: bool,

        /// Include hidden folders
        #[arg(long)]
        show_hidden: bool,
    },

    /// Download every audio file below a remote folder
    Sync {
        folder_id: String,

        /// Local folder name for the top level tracks
        folder_name: String,
    },

    /// Show the offline library
    Offline {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a track from the offline library
    Rm { name: String },

    /// Remove every track from the offline library
    Clear,

    /// Hide a folder from listings
    Hide { folder_id: String },

    /// Show a previously hidden folder again
    Unhide { folder_id: String },

    /// Show the tracks that would play after one from the offline library
    Upcoming {
        name: String,

        /// How many tracks to show
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::auto()
    };
    let _guard = match logging::init(&logging_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => ConfigManager::open(path)?,
        None => ConfigManager::new()?,
    };
    debug!("Using config at {}", config.path().display());

    let mut ctx = Context::new(config, cli.token);

    match cli.command {
        Command::Ls {
            folder_id,
            all,
            show_hidden,
        } => commands::list(&ctx, folder_id.as_deref(), all, show_hidden),
        Command::Sync {
            folder_id,
            folder_name,
        } => commands::sync(&ctx, &folder_id, &folder_name),
        Command::Offline { json } => commands::offline(&ctx, json),
        Command::Rm { name } => commands::remove(&ctx, &name),
        Command::Clear => commands::clear(&ctx),
        Command::Hide { folder_id } => commands::hide(&mut ctx, &folder_id),
        Command::Unhide { folder_id } => commands::unhide(&mut ctx, &folder_id),
        Command::Upcoming { name, count } => commands::upcoming(&ctx, &name, count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from(["drivetune", "sync", "F1", "Albums", "-v"]).ok();
        let cli = cli.map(|c| (c.verbose, c.command));
        assert!(matches!(
            cli,
            Some((true, Command::Sync { ref folder_id, ref folder_name }))
                if folder_id == "F1" && folder_name == "Albums"
        ));
    }

    #[test]
    fn test_parse_upcoming_count() {
        let cli = Cli::try_parse_from(["drivetune", "upcoming", "a.mp3", "-n", "3"]).ok();
        assert!(matches!(
            cli.map(|c| c.command),
            Some(Command::Upcoming { count: Some(3), .. })
        ));
    }
}
