//! Runs catalog categories through the retrying pipeline and hands the tables to a sink.

use std::time::Duration;

use analytics_reporting::{ReportFetcher, RetryingRequestWrapper};
use anyhow::Context;

use crate::catalog::Catalog;
use crate::dates::Window;
use crate::sink::{Destination, ReportSink, Stored};

/// What an export produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub stored: Vec<Stored>,
    /// `(category, end_date)` pairs skipped because the report was sampled.
    pub sampled: Vec<(Box<str>, Box<str>)>,
}

impl ExportSummary {
    fn merge(&mut self, other: ExportSummary) {
        self.stored.extend(other.stored);
        self.sampled.extend(other.sampled);
    }
}

pub struct Exporter<F, S> {
    reports: RetryingRequestWrapper<F>,
    sink: S,
    catalog: Catalog,
}

impl<F, S> Exporter<F, S>
where
    F: ReportFetcher,
    S: ReportSink,
{
    pub fn new(fetcher: F, sink: S, catalog: Catalog) -> Self {
        Self {
            reports: RetryingRequestWrapper::new(fetcher),
            sink,
            catalog,
        }
    }

    /// Resolves requested category names, or every catalog category if none were requested.
    pub fn select_categories(&self, requested: &[String]) -> anyhow::Result<Vec<Box<str>>> {
        if requested.is_empty() {
            return Ok(self.catalog.names().map(Box::from).collect());
        }

        requested
            .iter()
            .map(|name| -> anyhow::Result<Box<str>> {
                self.catalog.get(name)?;
                Ok(Box::from(name.as_str()))
            })
            .collect()
    }

    /// Exports every category over one window. Sampled reports are skipped, any other
    /// failure stops the export.
    pub async fn export_window(&self, categories: &[Box<str>], window: Window) -> anyhow::Result<ExportSummary> {
        let start_date = window.start_str();
        let end_date = window.end_str();

        info!(
            message = "exporting window",
            %start_date,
            %end_date,
            categories = categories.len(),
        );

        let mut summary = ExportSummary::default();

        for category in categories {
            let query = self.catalog.query(category, &start_date, &end_date)?;

            let table = match self.reports.with_retry(&query).await {
                Ok(table) => table,
                Err(error) if error.is_sampled() => {
                    warn!(
                        message = "skipping sampled report",
                        %category,
                        %start_date,
                        %end_date,
                    );
                    summary.sampled.push((category.clone(), end_date.as_str().into()));
                    continue;
                }
                Err(error) => {
                    return Err(error).with_context(|| {
                        format!("exporting '{category}' for {start_date} to {end_date}")
                    });
                }
            };

            let destination = Destination::new(category.clone(), end_date.as_str());
            let stored = self
                .sink
                .store(&table, &destination)
                .await
                .with_context(|| format!("storing '{category}' for {end_date}"))?;

            summary.stored.push(stored);
        }

        Ok(summary)
    }

    /// Exports each window in turn, pausing between them.
    pub async fn backfill(
        &self,
        categories: &[Box<str>],
        windows: &[Window],
        pause: Duration,
    ) -> anyhow::Result<ExportSummary> {
        let mut summary = ExportSummary::default();

        for (idx, window) in windows.iter().enumerate() {
            if idx > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            summary.merge(self.export_window(categories, *window).await?);
        }

        info!(
            message = "backfill complete",
            windows = windows.len(),
            stored = summary.stored.len(),
            sampled = summary.sampled.len(),
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::Mutex;

    use analytics_reporting::{ReportPage, ReportQuery};
    use chrono::NaiveDate;

    use super::*;
    use crate::dates::backfill_windows;
    use crate::sink::CsvFileSink;

    const CATALOG: &str = r#"{
        "traffic": {"dimensions": ["ga:date", "ga:source"], "metrics": ["ga:sessions"]},
        "goals": {"dimensions": ["ga:date"], "metrics": ["ga:goalCompletionsAll"]},
        "content": {"dimensions": ["ga:pagePath"], "metrics": ["ga:pageviews"]}
    }"#;

    /// Two rows per query. Queries for `ga:goalCompletionsAll` come back sampled, queries
    /// for `ga:pageviews` fail permanently.
    #[derive(Default)]
    struct FakeFetcher {
        queries: Mutex<Vec<(String, String)>>,
    }

    impl ReportFetcher for FakeFetcher {
        fn fetch(
            &self,
            query: &ReportQuery,
            _page_token: &str,
        ) -> impl Future<Output = analytics_reporting::Result<ReportPage>> + Send {
            self.queries
                .lock()
                .unwrap()
                .push((query.start_date().to_owned(), query.end_date().to_owned()));

            let metric = &*query.metrics()[0];

            let result = if metric == "ga:pageviews" {
                Err(analytics_reporting::Error::Permanent {
                    status: 403,
                    reason: Some("insufficientPermissions".into()),
                    message: "User does not have sufficient permissions for this profile.".into(),
                })
            } else {
                let dimensions = query.dimensions();
                let row = |n: u32| {
                    serde_json::json!({
                        "dimensions": dimensions.iter().map(|_| format!("value-{n}")).collect::<Vec<_>>(),
                        "metrics": [{"values": [n.to_string()]}],
                    })
                };

                let mut data = serde_json::json!({
                    "rows": [row(1), row(2)],
                    "rowCount": 2,
                });
                if metric == "ga:goalCompletionsAll" {
                    data["samplesReadCounts"] = serde_json::json!(["1000"]);
                    data["samplingSpaceSizes"] = serde_json::json!(["5000"]);
                }

                serde_json::from_value(serde_json::json!({
                    "columnHeader": {
                        "dimensions": dimensions,
                        "metricHeader": {"metricHeaderEntries": [{"name": metric, "type": "INTEGER"}]},
                    },
                    "data": data,
                }))
                .map_err(analytics_reporting::Error::from)
            };

            std::future::ready(result)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn exporter(dir: &std::path::Path) -> Exporter<FakeFetcher, CsvFileSink> {
        let catalog = Catalog::from_slice(CATALOG.as_bytes()).unwrap();
        Exporter::new(FakeFetcher::default(), CsvFileSink::new(dir), catalog)
    }

    #[test]
    fn test_select_categories() {
        let exporter = exporter(std::path::Path::new("/tmp"));

        let all = exporter.select_categories(&[]).unwrap();
        let expected: Vec<Box<str>> = vec!["content".into(), "goals".into(), "traffic".into()];
        assert_eq!(all, expected);

        let some = exporter.select_categories(&["traffic".into()]).unwrap();
        assert_eq!(some, vec![Box::<str>::from("traffic")]);

        assert!(exporter.select_categories(&["nope".into()]).is_err());
    }

    #[tokio::test]
    async fn test_export_window_skips_sampled() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let exporter = exporter(dir.path());
        let window = Window {
            start: date(2024, 1, 1),
            end: date(2024, 1, 7),
        };

        let summary = exporter
            .export_window(&["traffic".into(), "goals".into()], window)
            .await?;

        let expected = dir.path().join("traffic_2024-01-07.csv");
        assert_eq!(summary.stored, [Stored::File(expected.clone())]);
        assert_eq!(
            summary.sampled,
            vec![(Box::<str>::from("goals"), Box::<str>::from("2024-01-07"))]
        );

        let written = std::fs::read_to_string(expected)?;
        assert_eq!(written, "date,source,sessions\nvalue-1,value-1,1\nvalue-2,value-2,2\n");

        let queries = exporter.reports.assembler().fetcher().queries.lock().unwrap().clone();
        assert_eq!(queries[0], ("2024-01-01".to_owned(), "2024-01-07".to_owned()));
        Ok(())
    }

    #[tokio::test]
    async fn test_permanent_error_aborts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let exporter = exporter(dir.path());
        let window = Window {
            start: date(2024, 1, 1),
            end: date(2024, 1, 7),
        };

        let err = exporter
            .export_window(&["content".into(), "traffic".into()], window)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exporting 'content'"));
        let source = err.downcast_ref::<analytics_reporting::Error>().unwrap();
        assert_eq!(source.reason(), Some("insufficientPermissions"));

        // nothing after the failing category ran
        assert!(!dir.path().join("traffic_2024-01-07.csv").exists());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let exporter = exporter(dir.path());
        let windows = backfill_windows(date(2024, 1, 31), 7, 3)?;

        let started = tokio::time::Instant::now();
        let summary = exporter
            .backfill(&["traffic".into()], &windows, Duration::from_secs(3))
            .await?;

        assert_eq!(summary.stored.len(), 3);
        assert!(started.elapsed() >= Duration::from_secs(6));

        for end in ["2024-01-31", "2024-01-24", "2024-01-17"] {
            assert!(dir.path().join(format!("traffic_{end}.csv")).exists());
        }
        Ok(())
    }
}
