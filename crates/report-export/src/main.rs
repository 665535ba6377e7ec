//! `report-export`: pulls unsampled Google Analytics reports for each catalog category and
//! writes them out as CSV, optionally uploading them to Cloud Storage.

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use analytics_reporting::{ReportingClient, ReportingConfig};
use anyhow::Context;
use clap::Parser;
use gcp_auth::TokenProvider;

mod catalog;
mod config;
mod dates;
mod export;
mod logging;
mod sink;

use catalog::Catalog;
use config::{Cli, Command, ExportConfig};
use dates::Window;
use export::Exporter;
use sink::{ConfiguredSink, CsvFileSink, GcsSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs)?;

    let config = cli.export.into_config()?;
    let catalog = Catalog::from_path(&config.catalog)
        .await
        .with_context(|| format!("loading catalog {}", config.catalog.display()))?;

    let auth = load_auth(&config).await?;
    let client = ReportingClient::new_from_auth(
        Arc::clone(&auth),
        ReportingConfig::new(config.view_id.clone())?,
    )?;

    let csv = CsvFileSink::new(config.output_dir.clone());
    let sink = match config.upload {
        Some(upload) => ConfiguredSink::Gcs(GcsSink::new(csv, auth, upload.bucket, upload.prefix)?),
        None => ConfiguredSink::Csv(csv),
    };

    let pause = cli.command.pause();
    let exporter = Exporter::new(client, sink, catalog);
    let today = dates::today();

    let summary = match cli.command {
        Command::Run {
            start,
            end,
            categories,
        } => {
            let window = Window {
                start: start.resolve(today)?,
                end: end.resolve(today)?,
            };
            anyhow::ensure!(
                window.start <= window.end,
                "start date {} is after end date {}",
                window.start_str(),
                window.end_str(),
            );

            let categories = exporter.select_categories(&categories)?;
            exporter.export_window(&categories, window).await?
        }
        Command::Backfill {
            end,
            window_days,
            windows,
            categories,
            ..
        } => {
            anyhow::ensure!(window_days > 0, "--window-days must be at least 1");

            let categories = exporter.select_categories(&categories)?;
            let windows = dates::backfill_windows(end.resolve(today)?, window_days, windows)?;
            exporter.backfill(&categories, &windows, pause).await?
        }
    };

    for stored in summary.stored.iter() {
        debug!(message = "stored report", %stored);
    }

    info!(
        message = "export finished",
        stored = summary.stored.len(),
        sampled = summary.sampled.len(),
    );

    Ok(())
}

async fn load_auth(config: &ExportConfig) -> anyhow::Result<Arc<dyn TokenProvider>> {
    match config.key_file.as_deref() {
        Some(path) => {
            let account = gcp_auth::CustomServiceAccount::from_file(path)
                .with_context(|| format!("loading service account {}", path.display()))?;
            Ok(Arc::new(account))
        }
        None => gcp_auth::provider()
            .await
            .context("no ambient google credentials found"),
    }
}
