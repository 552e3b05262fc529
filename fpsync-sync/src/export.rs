//! Assessment export: download, stage under the data directory, upload.
//!
//! Staged files live at `<data_dir>/<relative>` and are uploaded to
//! `<prefix>/<relative>`. A file whose digest matches the one recorded at
//! its last upload is skipped unless forced. Any error aborts the run; files
//! uploaded before the error keep their recorded digests.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::Serialize;
use serde_json::Value;

use fpsync_client::{DirectoryClient, ExportClient};
use fpsync_core::{AppConfig, School, SchoolYearId};

use crate::error::{fetch_err, io_err, SyncError};
use crate::hash_store;
use crate::writer::{atomic_write, WriteResult};

/// Directory (and blob folder) for per-school class files.
pub const CLASSES_DIR: &str = "bas_classes";

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

/// Blocking facade over an [`ObjectStore`].
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    runtime: tokio::runtime::Runtime,
    prefix: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Result<Self, SyncError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SyncError::Runtime)?;
        Ok(Self {
            store,
            runtime,
            prefix: prefix.into(),
        })
    }

    /// Google Cloud Storage, with credentials taken from the environment.
    pub fn gcs(bucket: &str, prefix: impl Into<String>) -> Result<Self, SyncError> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|source| SyncError::Storage {
                key: bucket.to_string(),
                source,
            })?;
        Self::new(Arc::new(store), prefix)
    }

    /// Blob name for a path relative to the data directory.
    pub fn blob_name(&self, relative: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{prefix}/{relative}")
        }
    }

    pub fn upload(&self, relative: &str, bytes: Vec<u8>) -> Result<String, SyncError> {
        let blob = self.blob_name(relative);
        let location = ObjectPath::from(blob.as_str());
        self.runtime
            .block_on(self.store.put(&location, PutPayload::from(bytes)))
            .map_err(|source| SyncError::Storage {
                key: blob.clone(),
                source,
            })?;
        tracing::info!("uploaded {blob}");
        Ok(blob)
    }
}

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub school_year_id: SchoolYearId,
    pub data_dir: PathBuf,
    pub exports: Vec<String>,
    pub force: bool,
}

impl ExtractOptions {
    pub fn from_config(config: &AppConfig, force: bool) -> Result<Self, SyncError> {
        Ok(Self {
            school_year_id: config.target_year()?,
            data_dir: config.extract.data_dir.clone(),
            exports: config.extract.exports.clone(),
            force,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub blob: String,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub year_name: String,
    pub files: Vec<ExtractedFile>,
}

impl ExtractReport {
    pub fn uploaded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Uploaded)
            .count()
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run<C>(client: &C, uploader: &Uploader, options: &ExtractOptions) -> Result<ExtractReport, SyncError>
where
    C: DirectoryClient + ExportClient + ?Sized,
{
    let year = options.school_year_id;
    let year_name = client
        .list_years()
        .map_err(|e| fetch_err("list years", e))?
        .into_iter()
        .find(|y| y.id == year)
        .map(|y| y.name)
        .ok_or(SyncError::UnknownYear(year))?;
    tracing::info!("extracting {year_name}");

    let mut stage = Stage {
        uploader,
        options,
        store: hash_store::load_at(&options.data_dir)?,
        files: Vec::new(),
    };

    for kind in &options.exports {
        let export = client
            .fetch_export(kind, year)
            .map_err(|e| fetch_err(format!("fetch export {kind}"), e))?;
        stage.put(&format!("{kind}/{}", export.filename), export.data.into_bytes())?;
    }

    let schools = client
        .list_schools(year)
        .map_err(|e| fetch_err(format!("list schools for year {year}"), e))?;
    for school in &schools {
        let classes = client.list_classes(school.id, year).map_err(|e| {
            fetch_err(format!("list classes for school {} year {year}", school.id), e)
        })?;
        tracing::debug!("{}: {} classes", school.name, classes.len());
        let bytes = gzip_json(&annotate_classes(classes, &year_name, school))
            .map_err(|e| io_err(&options.data_dir, e))?;
        let relative = format!("{CLASSES_DIR}/{CLASSES_DIR}_{}_{year}.json.gz", school.id);
        stage.put(&relative, bytes)?;
    }

    let report = ExtractReport {
        year_name,
        files: stage.files,
    };
    tracing::info!(
        "uploaded {} of {} files",
        report.uploaded(),
        report.files.len()
    );
    Ok(report)
}

struct Stage<'a> {
    uploader: &'a Uploader,
    options: &'a ExtractOptions,
    store: hash_store::HashStoreFile,
    files: Vec<ExtractedFile>,
}

impl Stage<'_> {
    fn put(&mut self, relative: &str, bytes: Vec<u8>) -> Result<(), SyncError> {
        let path = self.options.data_dir.join(relative);
        let recorded = self.store.files.get(relative).map(String::as_str);
        match atomic_write(&path, &bytes, recorded, self.options.force)? {
            WriteResult::Unchanged { path } => {
                self.files.push(ExtractedFile {
                    path,
                    blob: self.uploader.blob_name(relative),
                    status: FileStatus::Unchanged,
                });
            }
            WriteResult::Written { path, digest } => {
                let blob = self.uploader.upload(relative, bytes)?;
                self.store.files.insert(relative.to_string(), digest);
                self.store.synced_at = chrono::Utc::now();
                hash_store::save_at(&self.options.data_dir, &self.store)?;
                self.files.push(ExtractedFile {
                    path,
                    blob,
                    status: FileStatus::Uploaded,
                });
            }
        }
        Ok(())
    }
}

/// Tag every class object with the year's display name and its school.
fn annotate_classes(
    classes: Vec<serde_json::Map<String, Value>>,
    year_name: &str,
    school: &School,
) -> Vec<serde_json::Map<String, Value>> {
    classes
        .into_iter()
        .map(|mut class| {
            class.insert("schoolYear".into(), Value::from(year_name));
            class.insert("schoolName".into(), Value::from(school.name.as_str()));
            class
        })
        .collect()
}

fn gzip_json<T: Serialize>(value: &T) -> std::io::Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    encoder.finish()
}
