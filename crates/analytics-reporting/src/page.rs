//! One page of a report, exactly as the service returns it.

use serde::Deserialize;

/// A single report out of a `reports:batchGet` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    #[serde(default)]
    pub column_header: ColumnHeader,
    #[serde(default)]
    pub data: ReportData,
    #[serde(default)]
    pub next_page_token: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    #[serde(default)]
    pub dimensions: Vec<Box<str>>,
    #[serde(default)]
    pub metric_header: MetricHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHeader {
    #[serde(default)]
    pub metric_header_entries: Vec<MetricHeaderEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricHeaderEntry {
    pub name: Box<str>,
    /// `INTEGER`, `FLOAT`, `CURRENCY`, `PERCENT` or `TIME`. Informational only, values
    /// are typed by inspecting them.
    #[serde(rename = "type", default)]
    pub kind: Option<Box<str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(default)]
    pub rows: Vec<RawRow>,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub samples_read_counts: Vec<Box<str>>,
    #[serde(default)]
    pub sampling_space_sizes: Vec<Box<str>>,
    #[serde(default)]
    pub is_data_golden: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub dimensions: Vec<Box<str>>,
    /// One entry per requested date range.
    #[serde(default)]
    pub metrics: Vec<DateRangeValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DateRangeValues {
    #[serde(default)]
    pub values: Vec<Box<str>>,
}

impl ReportPage {
    /// Total rows matching the query, across every page.
    #[inline]
    pub fn row_count(&self) -> u64 {
        self.data.row_count
    }

    /// True if the service estimated this report from a sample.
    #[inline]
    pub fn is_sampled(&self) -> bool {
        !self.data.samples_read_counts.is_empty() || !self.data.sampling_space_sizes.is_empty()
    }

    #[inline]
    pub fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    #[inline]
    pub fn dimension_headers(&self) -> &[Box<str>] {
        &self.column_header.dimensions
    }

    #[inline]
    pub fn metric_headers(&self) -> &[MetricHeaderEntry] {
        &self.column_header.metric_header.metric_header_entries
    }

    #[inline]
    pub fn rows(&self) -> &[RawRow] {
        &self.data.rows
    }
}
