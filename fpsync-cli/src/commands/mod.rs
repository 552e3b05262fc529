pub mod extract;
pub mod plan;
pub mod sync;

use anyhow::{Context, Result};

use fpsync_client::HttpClient;
use fpsync_core::{roster, AppConfig, LocalStudentRecord};
use fpsync_sync::SyncOptions;

/// Everything a reconciliation run needs, validated up front.
pub(crate) struct Prepared {
    pub client: HttpClient,
    pub roster: Vec<LocalStudentRecord>,
    pub options: SyncOptions,
}

/// Validate config, load the roster, then log in. A bad roster never
/// reaches the network.
pub(crate) fn prepare(config: &AppConfig, dry_run: bool) -> Result<Prepared> {
    let options = SyncOptions::from_config(config, dry_run)?;
    let roster_path = config.roster_path()?;
    let remote = config.require_remote()?;

    let roster = roster::load_at(roster_path, options.school_year_id)
        .with_context(|| format!("failed to load roster {}", roster_path.display()))?;
    tracing::info!("loaded {} roster students", roster.len());

    let client = HttpClient::connect(remote)
        .with_context(|| format!("failed to log in to {}", remote.base_url))?;

    Ok(Prepared {
        client,
        roster,
        options,
    })
}
