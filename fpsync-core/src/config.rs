//! Layered run configuration.
//!
//! Sources, highest priority first:
//! 1. `FPSYNC_*` environment variables, `__` separating sections
//!    (`FPSYNC_SYNC__CURRENT_ACADEMIC_YEAR` -> `sync.current_academic_year`)
//! 2. The deployment variables the sync job has always been run with
//!    (`CURRENT_ACADEMIC_YEAR`, `FPODMS_USERNAME`, ...)
//! 3. An explicit `--config` file, if given
//! 4. `./fpsync.toml`
//! 5. `<config_dir>/fpsync/config.toml`
//! 6. Built-in defaults
//!
//! The resolved [`AppConfig`] is handed to each component explicitly.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::SchoolYearId;

/// Deployment environment variables and the config keys they feed.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("CURRENT_ACADEMIC_YEAR", "sync.current_academic_year"),
    ("FIRST_ACADEMIC_YEAR", "sync.first_academic_year"),
    ("ROSTER_FILEPATH", "sync.roster_path"),
    ("FPODMS_USERNAME", "fpodms.email"),
    ("FPODMS_PASSWORD", "fpodms.password"),
    ("GCS_BUCKET_NAME", "extract.bucket"),
];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fpodms: RemoteConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub extract: ExtractSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

/// Connection settings for the assessment platform.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    String::from("https://fpdms.heinemann.com")
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            email: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.email.is_empty() && !self.password.is_empty()
    }
}

/// Roster reconciliation settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Remote id of the year being synced.
    #[serde(default)]
    pub current_academic_year: Option<i64>,
    /// Oldest year whose enrollments are fetched; all years when unset.
    #[serde(default)]
    pub first_academic_year: Option<i64>,
    #[serde(default)]
    pub roster_path: Option<PathBuf>,
    /// Where run reports are saved; reports are not persisted when unset.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

/// Assessment export settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_exports")]
    pub exports: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_prefix() -> String {
    String::from("fpodms")
}

fn default_exports() -> Vec<String> {
    vec![String::from("bas_assessments"), String::from("lli_assessments")]
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bucket: String::new(),
            prefix: default_prefix(),
            exports: default_exports(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifySettings {
    /// Failure notices are POSTed here; they are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Also send a notice for every per-record failure, not just fatal ones.
    #[serde(default)]
    pub each_failure: bool,
}

impl AppConfig {
    /// Load configuration from files and environment.
    pub fn load(extra_file: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(extra_file).extract()?)
    }

    /// Load `.env` from the working directory first, then [`AppConfig::load`].
    pub fn load_with_dotenv(extra_file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!("ignoring unreadable .env file: {err}");
            }
        }
        Self::load(extra_file)
    }

    /// Build the provider chain. Public so tests can layer on top.
    pub fn figment(extra_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global) = dirs::config_dir().map(|p| p.join("fpsync").join("config.toml")) {
            if global.exists() {
                figment = figment.merge(Toml::file(global));
            }
        }

        let local = PathBuf::from("fpsync.toml");
        if local.exists() {
            figment = figment.merge(Toml::file(local));
        }

        if let Some(path) = extra_file {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(legacy_env())
            .merge(Env::prefixed("FPSYNC_").split("__"))
    }

    /// The year being synced. Required by every command.
    pub fn target_year(&self) -> Result<SchoolYearId, ConfigError> {
        self.sync
            .current_academic_year
            .map(SchoolYearId)
            .ok_or(ConfigError::NotConfigured {
                field: "sync.current_academic_year",
            })
    }

    /// Lower bound on fetched years, validated against the target year.
    pub fn first_year(&self) -> Result<Option<SchoolYearId>, ConfigError> {
        let target = self.target_year()?;
        match self.sync.first_academic_year.map(SchoolYearId) {
            Some(first) if first > target => Err(ConfigError::InvalidValue {
                field: "sync.first_academic_year",
                reason: format!("{first} is after the current academic year {target}"),
            }),
            first => Ok(first),
        }
    }

    pub fn roster_path(&self) -> Result<&Path, ConfigError> {
        self.sync
            .roster_path
            .as_deref()
            .ok_or(ConfigError::NotConfigured {
                field: "sync.roster_path",
            })
    }

    /// Fail early when the platform credentials are incomplete.
    pub fn require_remote(&self) -> Result<&RemoteConfig, ConfigError> {
        if self.fpodms.email.is_empty() {
            return Err(ConfigError::NotConfigured {
                field: "fpodms.email",
            });
        }
        if self.fpodms.password.is_empty() {
            return Err(ConfigError::NotConfigured {
                field: "fpodms.password",
            });
        }
        if !self.fpodms.base_url.starts_with("http://") && !self.fpodms.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "fpodms.base_url",
                reason: format!("'{}' is not an http(s) URL", self.fpodms.base_url),
            });
        }
        Ok(&self.fpodms)
    }

    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        if self.extract.bucket.is_empty() {
            return Err(ConfigError::NotConfigured {
                field: "extract.bucket",
            });
        }
        Ok(&self.extract.bucket)
    }
}

fn legacy_env() -> Env {
    let keys: Vec<&str> = LEGACY_ENV.iter().map(|(env, _)| *env).collect();
    Env::raw().only(&keys).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
            .map_or_else(|| key.as_str().to_owned(), |(_, path)| (*path).to_owned())
            .into()
    })
}
