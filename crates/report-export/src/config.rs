use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::dates::DateSpec;

#[derive(Debug, Parser)]
#[command(name = "report-export")]
#[command(about = "Exports unsampled Google Analytics reports to CSV and Cloud Storage")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub export: ExportArgs,

    /// Emit logs as JSON lines instead of human readable text.
    #[arg(long, env = "REPORT_LOG_JSON", global = true, default_value_t = false)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Analytics view to report on.
    #[arg(long, env = "GA_VIEW_ID")]
    pub view_id: String,

    /// Service account key file. Ambient Google credentials are used if unset.
    #[arg(long, env = "GA_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// JSON catalog of categories to export.
    #[arg(long, env = "REPORT_CATALOG")]
    pub catalog: PathBuf,

    /// Directory CSV files are written to. Defaults to the system temp dir.
    #[arg(long, env = "REPORT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Cloud Storage bucket to upload to. Files stay local if unset.
    #[arg(long, env = "REPORT_BUCKET")]
    pub bucket: Option<String>,

    /// Object name prefix inside the bucket.
    #[arg(long, env = "REPORT_PREFIX")]
    pub prefix: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export one date range.
    Run {
        #[arg(long, default_value = "yesterday")]
        start: DateSpec,
        #[arg(long, default_value = "yesterday")]
        end: DateSpec,
        /// Categories to export, every catalog category if none are given.
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Export consecutive windows walking back from `end`, newest first.
    Backfill {
        #[arg(long)]
        end: DateSpec,
        #[arg(long)]
        window_days: u32,
        #[arg(long)]
        windows: u32,
        /// Seconds to wait between windows.
        #[arg(long, default_value_t = 3)]
        pause_secs: u64,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
}

/// Validated export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub view_id: Box<str>,
    pub key_file: Option<PathBuf>,
    pub catalog: PathBuf,
    pub output_dir: PathBuf,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub bucket: Box<str>,
    pub prefix: Option<Box<str>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a view id is required")]
    MissingViewId,
    #[error("bucket name '{0}' is invalid")]
    InvalidBucket(Box<str>),
}

impl ExportArgs {
    pub fn into_config(self) -> Result<ExportConfig, ConfigError> {
        let view_id = self.view_id.trim();
        if view_id.is_empty() {
            return Err(ConfigError::MissingViewId);
        }

        let upload = match self.bucket.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(bucket) if bucket.contains('/') => {
                return Err(ConfigError::InvalidBucket(bucket.into()));
            }
            Some(bucket) => Some(UploadConfig {
                bucket: bucket.into(),
                prefix: self
                    .prefix
                    .filter(|prefix| !prefix.trim().is_empty())
                    .map(String::into_boxed_str),
            }),
        };

        Ok(ExportConfig {
            view_id: view_id.into(),
            key_file: self.key_file,
            catalog: self.catalog,
            output_dir: self.output_dir.unwrap_or_else(std::env::temp_dir),
            upload,
        })
    }
}

impl Command {
    pub fn pause(&self) -> Duration {
        match self {
            Self::Backfill { pause_secs, .. } => Duration::from_secs(*pause_secs),
            Self::Run { .. } => Duration::ZERO,
        }
    }
}
