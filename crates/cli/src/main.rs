mod commands;
mod config;
mod error;
mod logging;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use caseflow_storage::MemoryStore;

use commands::case::CaseCommands;
use commands::run::RunCommands;
use commands::suite::SuiteCommands;
use commands::Session;
use error::CliError;
use output::{report_error, OutputFormat};

/// Manual test case execution tracker.
#[derive(Parser)]
#[command(name = "caseflow", version, about = "Manual test case execution tracker")]
struct Cli {
    /// Config file (default: ./caseflow.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON store file; overrides the config file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Author and inspect test cases
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },

    /// Group test cases into suites
    Suite {
        #[command(subcommand)]
        command: SuiteCommands,
    },

    /// Manage flow runs and the cases in them
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// Execute a test case step by step, reading commands from stdin
    Exec {
        /// Case id or display id (TC-n)
        case: String,
        /// Execute inside this flow run
        #[arg(long)]
        run: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    logging::init(config.log_level.as_deref(), cli.quiet);

    let session = Session {
        store_path: cli.store.clone().unwrap_or_else(|| config.store.clone()),
        engine: config.engine.clone(),
        output: cli.output,
        quiet: cli.quiet,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(dispatch(cli.command, &session)) {
        tracing::debug!(error = ?e, "command failed");
        report_error(&e.to_string(), session.output, session.quiet);
        process::exit(1);
    }
}

/// Load the store, run one command, and save only if it succeeded and
/// changed something.
async fn dispatch(command: Commands, session: &Session) -> Result<(), CliError> {
    let store = MemoryStore::open(&session.store_path)?;
    let changed = match command {
        Commands::Case { command } => commands::case::run(command, &store, session).await?,
        Commands::Suite { command } => commands::suite::run(command, &store, session).await?,
        Commands::Run { command } => commands::run::run(command, &store, session).await?,
        Commands::Exec { case, run } => {
            commands::exec::run(&case, run.as_deref(), &store, session).await?
        }
    };
    if changed {
        store.save(&session.store_path)?;
    }
    Ok(())
}
