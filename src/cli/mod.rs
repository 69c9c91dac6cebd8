pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "coachdesk")]
#[command(about = "coachdesk - administration commands for the billing API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create tables and indexes in the configured database")]
    Migrate,

    #[command(about = "Sign a development token for an operator")]
    Token(commands::token::TokenArgs),

    #[command(
        about = "Recompute the overdue list of an operator",
        long_about = "Recompute and store the overdue list of an operator against the configured \
                      PostgreSQL database (DATABASE_URL). STORE_BACKEND=memory is for tests only: \
                      it starts empty, so the list is always empty."
    )]
    Overdue(commands::overdue::OverdueArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Token(args) => commands::token::handle(args, output_format),
        Commands::Overdue(args) => commands::overdue::handle(args, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overdue_help_marks_memory_backend_as_test_only() {
        let cli = Cli::command();
        let overdue = cli.find_subcommand("overdue").unwrap();
        let help = overdue.get_long_about().unwrap().to_string();
        assert!(help.contains("STORE_BACKEND=memory is for tests only"));
    }

    #[test]
    fn parses_overdue_with_timestamp() {
        let cli = Cli::try_parse_from([
            "coachdesk",
            "--json",
            "overdue",
            "--operator",
            "6f1c2a4e-8d2b-4c59-9a53-1f0e6a7b9c10",
            "--at",
            "2025-06-15T12:00:00Z",
        ])
        .unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Overdue(args) => assert!(args.at.is_some()),
            _ => panic!("expected overdue command"),
        }
    }
}
