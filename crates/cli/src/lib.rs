pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tendero",
    about = "Tendero operator CLI",
    long_about = "Inspect storefront assistant configuration, readiness, and catalog ranking.",
    after_help = "Examples:\n  tendero doctor --json\n  tendero config\n  tendero rank casco de seguridad --top-k 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credential presence, and catalog reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Fetch the catalog once and print the products ranked for a query")]
    Rank {
        #[arg(required = true, num_args = 1.., help = "Customer query text")]
        query: Vec<String>,
        #[arg(long, help = "Override ranking.top_k for this run")]
        top_k: Option<usize>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::CommandResult::text(commands::config::run()),
        Command::Doctor { json } => commands::CommandResult::text(commands::doctor::run(json)),
        Command::Rank { query, top_k } => commands::rank::run(&query.join(" "), top_k),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
