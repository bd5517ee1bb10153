pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "brewline",
    about = "Brewline operator CLI",
    long_about = "Chat with the coffee-shop agent from a terminal, exercise the deterministic \
                  ranking engine, and inspect runtime readiness and configuration.",
    after_help = "Examples:\n  brewline chat\n  brewline rank --item latte\n  brewline rank --popular --category coffee\n  brewline doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run an interactive dialog session against the full pipeline")]
    Chat {
        #[arg(long, help = "Path to a brewline.toml config file")]
        config: Option<PathBuf>,
    },
    #[command(about = "Rank recommendations from the catalog without any model calls")]
    Rank {
        #[arg(long = "item", help = "Seed item for co-purchase ranking (repeatable)")]
        items: Vec<String>,
        #[arg(long, help = "Rank by overall popularity instead of co-purchase rules")]
        popular: bool,
        #[arg(long = "category", help = "Restrict popularity ranking to a category (repeatable)")]
        categories: Vec<String>,
    },
    #[command(about = "Inspect the effective configuration with secrets redacted")]
    Config,
    #[command(about = "Validate configuration and catalog readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { config } => commands::chat::run(config),
        Command::Rank { items, popular, categories } => {
            commands::rank::run(items, popular, categories)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
