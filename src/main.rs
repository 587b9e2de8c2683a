use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docs_rag::commands::{ask, clear, feedback_report, ingest, load_config, serve, show_status};
use docs_rag::config::{Config, run_interactive_config, show_config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Retrieval-augmented help assistant over a private document corpus")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model server and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store every .md/.txt file under a directory
    Ingest {
        directory: PathBuf,
    },
    /// Drop all stored chunks
    Clear,
    /// Show knowledge base and model server status
    Status,
    /// Ask the assistant one question
    Ask {
        message: String,
    },
    /// Summarize recent user feedback
    Report {
        /// Number of days to cover
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Start MCP server on stdio
    Serve,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Config { show } => {
            let config_dir = Config::config_dir()?;
            if show {
                show_config(&load_config()?);
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest { directory } => {
            ingest(&load_config()?, &directory).await?;
        }
        Commands::Clear => clear(&load_config()?).await?,
        Commands::Status => show_status(&load_config()?).await?,
        Commands::Ask { message } => ask(&load_config()?, message).await?,
        Commands::Report { days } => feedback_report(&load_config()?, days).await?,
        Commands::Serve => serve(&load_config()?).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ingest_takes_a_directory() {
        let parsed = Cli::try_parse_from(["docs-rag", "ingest", "./docs"]).expect("should parse");

        match parsed.command {
            Commands::Ingest { directory } => assert_eq!(directory, PathBuf::from("./docs")),
            _ => panic!("expected ingest"),
        }
        assert!(!parsed.verbose);
    }

    #[test]
    fn ingest_requires_a_directory() {
        let err = Cli::try_parse_from(["docs-rag", "ingest"])
            .err()
            .expect("should fail without a directory");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn report_days_default_and_override() {
        let default = Cli::try_parse_from(["docs-rag", "report"]).expect("should parse");
        assert!(matches!(default.command, Commands::Report { days: 7 }));

        let custom =
            Cli::try_parse_from(["docs-rag", "report", "--days", "30"]).expect("should parse");
        assert!(matches!(custom.command, Commands::Report { days: 30 }));
    }

    #[test]
    fn verbose_flag_is_global() {
        let parsed =
            Cli::try_parse_from(["docs-rag", "ask", "how do I apply?", "--verbose"]).expect("should parse");
        assert!(parsed.verbose);
        match parsed.command {
            Commands::Ask { message } => assert_eq!(message, "how do I apply?"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn config_show_flag() {
        let parsed = Cli::try_parse_from(["docs-rag", "config", "--show"]).expect("should parse");
        assert!(matches!(parsed.command, Commands::Config { show: true }));
    }

    #[test]
    fn simple_subcommands_parse() {
        for name in ["clear", "status", "serve"] {
            assert!(Cli::try_parse_from(["docs-rag", name]).is_ok(), "{}", name);
        }
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["docs-rag", "crawl"])
            .err()
            .expect("should reject unknown subcommand");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }
}
