//! TokenGuard CLI - JSON bridge over a token directory
//!
//! Commands: resolve, validate, impact, apply
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure, 1 on any other failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use tokenguard_core::{
    path, EngineConfig, JsonFileChangeLog, LocalDirStore, TokenWorkspace,
};

#[derive(Parser)]
#[command(name = "tokenguard-cli")]
#[command(about = "TokenGuard CLI - Design Token Governance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory of the token repository
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Token directory, relative to the root
    #[arg(short, long, default_value = "tokens")]
    tokens_dir: String,

    /// Engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a token to its terminal value
    Resolve {
        /// Token path (dots or slashes)
        path: String,
    },

    /// Validate one token, or the whole set
    Validate {
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Show which tokens would break if a token were deleted
    Impact {
        path: String,
    },

    /// Apply a pending-change log to the token documents
    Apply {
        /// Change log file
        #[arg(short, long)]
        log: PathBuf,

        /// Write the documents instead of printing the patches
        #[arg(short, long)]
        write: bool,

        #[arg(short, long, default_value = "Update design tokens")]
        message: String,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fail(error: impl std::fmt::Display) -> ExitCode {
    println!("{}", serde_json::json!({ "success": false, "error": error.to_string() }));
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(file) => match EngineConfig::load_from_file(file) {
            Ok(c) => c,
            Err(e) => return fail(e),
        },
        None => EngineConfig::default(),
    };

    let mut remote = LocalDirStore::new(&cli.root);
    let mut workspace = TokenWorkspace::new(config);
    if let Err(e) = workspace.load_from(&remote, &cli.tokens_dir) {
        return fail(format!("Failed to load tokens: {}", e));
    }

    match cli.command {
        Commands::Resolve { path } => match workspace.resolve(&path) {
            Ok(resolved) => emit(&resolved),
            Err(e) => fail(e),
        },

        Commands::Validate { path: Some(p) } => {
            let Some(token) = workspace.store().get(&path::normalize(&p)).cloned() else {
                return fail(format!("Token not found: {}", p));
            };
            let result = workspace.validate_token(&token);
            let code = emit(&result);
            if result.valid { code } else { ExitCode::from(2) }
        }

        Commands::Validate { path: None } => {
            let report = workspace.validate_all();
            let output = serde_json::json!({
                "valid": report.all_valid(),
                "errorCount": report.error_count(),
                "warningCount": report.warning_count(),
                "load": workspace.store().report(),
                "results": report.results,
            });
            let code = emit(&output);
            if report.all_valid() { code } else { ExitCode::from(2) }
        }

        Commands::Impact { path } => emit(&workspace.analyze_deletion(&path)),

        Commands::Apply { log, write, message } => {
            let mut change_log = JsonFileChangeLog::new(log);
            if let Err(e) = workspace.restore_pending(&change_log) {
                return fail(e);
            }

            if !write {
                return match workspace.prepare_commit(&remote) {
                    Ok(patches) => emit(&patches),
                    Err(e) => fail(e),
                };
            }

            match workspace.commit(&mut remote, &message) {
                Ok(commit) => {
                    if let Err(e) = workspace.save_pending(&mut change_log) {
                        return fail(e);
                    }
                    emit(&serde_json::json!({ "success": true, "commit": commit }))
                }
                Err(e) => fail(e),
            }
        }
    }
}
