//! fpsync — keep the F&P assessment platform in line with the SIS roster.
//!
//! # Usage
//!
//! ```text
//! fpsync sync [--dry-run] [--json]
//! fpsync plan [--json]
//! fpsync extract [--force]
//!
//! global: [--config <file>] [--year <id>] [--first-year <id>] [--roster <path>]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{extract::ExtractArgs, plan::PlanArgs, sync::SyncArgs};
use fpsync_core::AppConfig;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "fpsync",
    version,
    about = "Reconcile SIS student enrollments with the F&P assessment platform",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, re-enroll, and transfer students to match the roster.
    Sync(SyncArgs),

    /// Show what `sync` would do for every roster student.
    Plan(PlanArgs),

    /// Download assessment exports and class lists and upload them to storage.
    Extract(ExtractArgs),
}

/// Overrides applied on top of files and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Extra TOML config file, layered above ./fpsync.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote id of the academic year to sync.
    #[arg(long, global = true)]
    pub year: Option<i64>,

    /// Oldest academic year whose enrollments are considered.
    #[arg(long, global = true)]
    pub first_year: Option<i64>,

    /// Roster file (JSON or YAML).
    #[arg(long, global = true)]
    pub roster: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config =
            AppConfig::load_with_dotenv(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(year) = self.year {
            config.sync.current_academic_year = Some(year);
        }
        if let Some(first) = self.first_year {
            config.sync.first_academic_year = Some(first);
        }
        if let Some(roster) = &self.roster {
            config.sync.roster_path = Some(roster.clone());
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(&cli.global),
        Commands::Plan(args) => args.run(&cli.global),
        Commands::Extract(args) => args.run(&cli.global),
    }
}
