//! Where assembled tables end up: CSV files on disk, optionally uploaded to Cloud Storage.

use std::future::Future;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use analytics_reporting::ReportTable;
use bytes::Bytes;
use gcp_auth::TokenProvider;
use net_utils::backoff::{Backoff, BackoffConfig};
use net_utils::transient::is_transient_status;
use reqwest::header::{self, HeaderValue};

/// Upload endpoint for simple media uploads, the bucket name is appended as a path segment
/// followed by `o`.
const UPLOAD_URL: &str = "https://storage.googleapis.com/upload/storage/v1/b";

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Auth(#[from] gcp_auth::Error),
    #[error(transparent)]
    InvalidHeader(#[from] header::InvalidHeaderValue),
    #[error("upload failed ({status}): {message}")]
    Upload { status: u16, message: Box<str> },
}

/// Names a stored report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub category: Box<str>,
    pub end_date: Box<str>,
}

impl Destination {
    pub fn new(category: impl Into<Box<str>>, end_date: impl Into<Box<str>>) -> Self {
        Self {
            category: category.into(),
            end_date: end_date.into(),
        }
    }

    /// `<category>_<end_date>.csv`
    pub fn file_name(&self) -> String {
        format!("{}_{}.csv", self.category, self.end_date)
    }
}

/// Where a report was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    File(PathBuf),
    Object { bucket: Box<str>, name: Box<str> },
}

impl fmt::Display for Stored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Object { bucket, name } => write!(f, "gs://{bucket}/{name}"),
        }
    }
}

pub trait ReportSink {
    fn store(
        &self,
        table: &ReportTable,
        destination: &Destination,
    ) -> impl Future<Output = Result<Stored, SinkError>> + Send;
}

/// Encodes a table as CSV: a header row in column order, then one record per row with
/// empty cells for columns the row doesn't have.
pub fn encode_csv(table: &ReportTable) -> Result<Vec<u8>, SinkError> {
    let mut writer = csv::Writer::from_writer(Vec::with_capacity(table.len() * 64));

    writer.write_record(table.columns().iter().map(|column| column.as_bytes()))?;

    for row in table.rows() {
        writer.write_record(
            table
                .aligned_row(row)
                .map(|cell| cell.map(ToString::to_string).unwrap_or_default()),
        )?;
    }

    writer.into_inner().map_err(|err| err.into_error().into())
}

/// Writes `<dir>/<category>_<end_date>.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFileSink {
    dir: PathBuf,
}

impl CsvFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn write(&self, table: &ReportTable, destination: &Destination) -> Result<PathBuf, SinkError> {
        let bytes = encode_csv(table)?;
        self.write_encoded(&bytes, table.len(), destination).await
    }

    /// Writes CSV that was already encoded with [`encode_csv`].
    pub async fn write_encoded(
        &self,
        bytes: &[u8],
        rows: usize,
        destination: &Destination,
    ) -> Result<PathBuf, SinkError> {
        let path = self.dir.join(destination.file_name());

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;

        info!(
            message = "wrote report",
            path = %path.display(),
            rows,
        );

        Ok(path)
    }
}

impl ReportSink for CsvFileSink {
    async fn store(&self, table: &ReportTable, destination: &Destination) -> Result<Stored, SinkError> {
        self.write(table, destination).await.map(Stored::File)
    }
}

/// Writes the CSV locally, then uploads it to a Cloud Storage bucket.
pub struct GcsSink {
    csv: CsvFileSink,
    client: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    bucket: Box<str>,
    prefix: Option<Box<str>>,
    backoff: BackoffConfig,
}

impl fmt::Debug for GcsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsSink")
            .field("csv", &self.csv)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, serde::Deserialize)]
struct UploadedObject {
    name: Box<str>,
    #[serde(default)]
    size: Option<Box<str>>,
}

impl GcsSink {
    pub fn new(
        csv: CsvFileSink,
        auth: Arc<dyn TokenProvider>,
        bucket: impl Into<Box<str>>,
        prefix: Option<Box<str>>,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .user_agent("report-export-rs")
            .build()?;

        Ok(Self {
            csv,
            client,
            auth,
            bucket: bucket.into(),
            prefix,
            backoff: BackoffConfig::default(),
        })
    }

    /// Object name for `destination`, under the configured prefix if there is one.
    pub fn object_name(&self, destination: &Destination) -> String {
        match self.prefix.as_deref().map(|prefix| prefix.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{}", destination.file_name()),
            _ => destination.file_name(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{UPLOAD_URL}/{}/o", self.bucket)
    }

    async fn auth_header(&self) -> Result<HeaderValue, SinkError> {
        let token = self.auth.token(&[STORAGE_SCOPE]).await?;
        let mut header = HeaderValue::try_from(format!("Bearer {}", token.as_str()))?;
        header.set_sensitive(true);
        Ok(header)
    }

    /// Uploads with `uploadType=media`, backing off on 429s and 5XX errors.
    async fn upload(&self, name: &str, body: Bytes) -> Result<UploadedObject, SinkError> {
        let url = self.upload_url();
        let mut backoff: Backoff = self.backoff.make_backoff();

        loop {
            let response = self
                .client
                .post(&url)
                .query(&[("uploadType", "media"), ("name", name)])
                .header(header::AUTHORIZATION, self.auth_header().await?)
                .header(header::CONTENT_TYPE, "text/csv")
                .body(body.clone())
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return response.json().await.map_err(SinkError::from);
            }

            if is_transient_status(status.as_u16()) {
                if let Some(once) = backoff.backoff_once() {
                    warn!(
                        message = "upload failed, retrying",
                        status = status.as_u16(),
                        attempt = once.attempt() + 1,
                        waiting = ?once.waiting(),
                    );
                    once.await;
                    continue;
                }
            }

            let message = response.text().await?;
            return Err(SinkError::Upload {
                status: status.as_u16(),
                message: message.into_boxed_str(),
            });
        }
    }
}

impl ReportSink for GcsSink {
    async fn store(&self, table: &ReportTable, destination: &Destination) -> Result<Stored, SinkError> {
        let body = Bytes::from(encode_csv(table)?);
        self.csv.write_encoded(&body, table.len(), destination).await?;

        let name = self.object_name(destination);
        let object = self.upload(&name, body).await?;

        info!(
            message = "uploaded report",
            bucket = %self.bucket,
            object = %object.name,
            size = object.size.as_deref(),
        );

        Ok(Stored::Object {
            bucket: self.bucket.clone(),
            name: object.name,
        })
    }
}

/// The sink picked by configuration.
#[derive(Debug)]
pub enum ConfiguredSink {
    Csv(CsvFileSink),
    Gcs(GcsSink),
}

impl ReportSink for ConfiguredSink {
    async fn store(&self, table: &ReportTable, destination: &Destination) -> Result<Stored, SinkError> {
        match self {
            Self::Csv(csv) => csv.store(table, destination).await,
            Self::Gcs(gcs) => gcs.store(table, destination).await,
        }
    }
}
