//! ollama-dl CLI - Command-line interface
//!
//! Downloads models from an Ollama-compatible registry with resume and
//! bounded parallelism.

mod commands;
mod error;
mod progress;

use clap::{CommandFactory, Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::pull::{PullArgs, PullOptions};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "ollama-dl")]
#[command(version, about = "Resumable, concurrent model downloads from an Ollama registry")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model to pull (same as `ollama-dl pull <NAME>`)
    name: Option<String>,

    #[command(flatten)]
    options: PullOptions,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a model's blobs into a directory
    Pull(PullArgs),

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    match (cli.command, cli.name) {
        (Some(Commands::Pull(args)), _) => commands::pull::run(&args.name, args.options),
        (Some(Commands::Config { command }), _) => commands::config::run(command),
        (None, Some(name)) => commands::pull::run(&name, cli.options),
        (None, None) => {
            Cli::command()
                .print_help()
                .map_err(|e| CliError::Setup(e.to_string()))?;
            Err(CliError::Config("no model name given".to_string()))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
