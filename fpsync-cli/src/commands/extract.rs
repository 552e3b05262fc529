//! `fpsync extract` — stage and upload the year's assessment exports.

use anyhow::{Context, Result};
use clap::Args;

use fpsync_client::HttpClient;
use fpsync_core::AppConfig;
use fpsync_sync::export::{self, FileStatus};
use fpsync_sync::notify::{self, EXTRACT_SUBJECT};
use fpsync_sync::{notify_best_effort, ExtractOptions, Uploader};

use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Re-upload files even when their content has not changed.
    #[arg(long)]
    pub force: bool,
}

impl ExtractArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let result = self.execute(&config);
        if let Err(err) = &result {
            let notifier = notify::from_settings(&config.notify);
            notify_best_effort(notifier.as_ref(), EXTRACT_SUBJECT, &format!("{err:#}"));
        }
        result
    }

    fn execute(&self, config: &AppConfig) -> Result<()> {
        let options = ExtractOptions::from_config(config, self.force)?;
        let bucket = config.require_bucket()?;
        let remote = config.require_remote()?;

        let client = HttpClient::connect(remote)
            .with_context(|| format!("failed to log in to {}", remote.base_url))?;
        let uploader = Uploader::gcs(bucket, config.extract.prefix.as_str())
            .with_context(|| format!("failed to open bucket {bucket}"))?;

        let report = export::run(&client, &uploader, &options).context("extract failed")?;

        println!(
            "✓ {}: {} uploaded, {} unchanged",
            report.year_name,
            report.uploaded(),
            report.files.len() - report.uploaded()
        );
        for file in &report.files {
            let mark = match file.status {
                FileStatus::Uploaded => "↑",
                FileStatus::Unchanged => "·",
            };
            println!("  {mark}  {}", file.blob);
        }
        Ok(())
    }
}
