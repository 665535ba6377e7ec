//! Request and error bodies of the `reports:batchGet` endpoint.
//!
//! Response bodies live in [`crate::page`].

use serde::{Deserialize, Serialize};

use crate::ReportQuery;
use crate::page::ReportPage;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetRequest<'a> {
    pub report_requests: [ReportRequest<'a>; 1],
}

impl<'a> BatchGetRequest<'a> {
    pub fn new(view_id: &'a str, query: &'a ReportQuery, page_size: u64, page_token: &'a str) -> Self {
        Self {
            report_requests: [ReportRequest::new(view_id, query, page_size, page_token)],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest<'a> {
    pub view_id: &'a str,
    pub date_ranges: [DateRange<'a>; 1],
    pub dimensions: Vec<Dimension<'a>>,
    pub metrics: Vec<Metric<'a>>,
    pub sampling_level: SamplingLevel,
    pub page_size: u64,
    pub page_token: &'a str,
}

impl<'a> ReportRequest<'a> {
    pub fn new(view_id: &'a str, query: &'a ReportQuery, page_size: u64, page_token: &'a str) -> Self {
        Self {
            view_id,
            date_ranges: [DateRange {
                start_date: query.start_date(),
                end_date: query.end_date(),
            }],
            dimensions: query
                .dimensions()
                .iter()
                .map(|name| Dimension { name: &**name })
                .collect(),
            metrics: query
                .metrics()
                .iter()
                .map(|expression| Metric {
                    expression: &**expression,
                })
                .collect(),
            sampling_level: SamplingLevel::Large,
            page_size,
            page_token,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange<'a> {
    pub start_date: &'a str,
    pub end_date: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Dimension<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metric<'a> {
    pub expression: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingLevel {
    #[default]
    Default,
    Small,
    Large,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetResponse {
    #[serde(default)]
    pub reports: Vec<ReportPage>,
}

impl BatchGetResponse {
    /// We only ever send a single report request, so only the first report matters.
    pub fn into_first_report(self) -> crate::Result<ReportPage> {
        self.reports
            .into_iter()
            .next()
            .ok_or(crate::Error::MissingReport)
    }
}

/// The standard Google JSON error envelope, `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Box<str>,
    #[serde(default)]
    pub status: Option<Box<str>>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: Option<Box<str>>,
    #[serde(default)]
    pub domain: Option<Box<str>>,
    #[serde(default)]
    pub message: Box<str>,
}

impl ErrorBody {
    /// The first reason reported in the `errors` array, if any.
    pub fn reason(&self) -> Option<&str> {
        self.errors.iter().find_map(|err| err.reason.as_deref())
    }
}
