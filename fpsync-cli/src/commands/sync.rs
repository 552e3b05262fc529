//! `fpsync sync` — bring the remote directory in line with the roster.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fpsync_core::AppConfig;
use fpsync_sync::notify::{self, Notifier, SYNC_SUBJECT};
use fpsync_sync::{notify_best_effort, pipeline, report, Action, SyncReport};

use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Decide every action but issue no writes.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let notifier = notify::from_settings(&config.notify);

        let result = self.execute(&config, notifier.as_ref());
        if let Err(err) = &result {
            notify_best_effort(notifier.as_ref(), SYNC_SUBJECT, &format!("{err:#}"));
        }
        result
    }

    fn execute(&self, config: &AppConfig, notifier: &dyn Notifier) -> Result<()> {
        let prepared = super::prepare(config, self.dry_run)?;
        let report = pipeline::run(&prepared.client, prepared.roster, &prepared.options)
            .context("sync failed")?;

        if config.notify.each_failure {
            for failure in &report.failures {
                notify_best_effort(
                    notifier,
                    &notify::record_subject(failure),
                    &notify::record_body(failure),
                );
            }
        }

        if let Some(dir) = &config.sync.report_dir {
            match report::save_at(dir, &report) {
                Ok(path) => tracing::info!("report saved to {}", path.display()),
                Err(err) => tracing::warn!("could not save report under {}: {err}", dir.display()),
            }
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_summary(&report);
        }
        Ok(())
    }
}

fn print_summary(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let mark = if report.has_failures() {
        "!".yellow().bold()
    } else {
        "✓".green().bold()
    };
    println!("{mark} {}", report.summary_line());

    for entry in report.entries.iter().filter(|e| e.action.is_write()) {
        let verb = match entry.action {
            Action::Create { .. } => "+",
            Action::ReEnroll { .. } => "↺",
            Action::Transfer { .. } => "→",
            Action::NoOp => "·",
        };
        println!(
            "  {prefix}{verb}  {} {} ({})",
            entry.action.label(),
            entry.name,
            entry.external_id
        );
    }
    for failure in &report.failures {
        println!(
            "  {}  {} ({}): {}",
            "✗".red().bold(),
            failure.name,
            failure.external_id,
            failure.message
        );
    }
}
