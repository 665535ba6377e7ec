//! Fetches paged Google Analytics Reporting API (v4) reports and assembles them into a
//! single, fully-populated [`ReportTable`].
//!
//! The pipeline, outermost first:
//!
//! - [`RetryingRequestWrapper`] retries a whole assembly on transient service errors.
//! - [`PaginationAssembler`] rejects sampled data, plans page offsets from the
//!   authoritative row count and concatenates every page.
//! - [`ReportFetcher`] issues a single paged request ([`ReportingClient`] over REST).
//! - [`extract_rows`] flattens one [`ReportPage`] into typed [`ReportRow`]s.

#[macro_use]
extern crate tracing;

pub mod assemble;
pub mod client;
mod error;
pub mod extract;
pub mod fetch;
pub mod page;
pub mod query;
pub mod resources;
pub mod retry;
pub mod table;

pub use assemble::{PageOffsets, PaginationAssembler};
pub use client::{ReportingClient, ReportingConfig};
pub use error::Error;
pub use extract::{Extracted, extract_rows};
pub use fetch::ReportFetcher;
pub use page::ReportPage;
pub use query::ReportQuery;
pub use retry::RetryingRequestWrapper;
pub use table::{ReportRow, ReportTable, Value};

/// Type alias to [`core::result::Result<T, Error>`].
pub type Result<T> = core::result::Result<T, Error>;

/// Rows requested per page. The reporting API caps pages at this size.
pub const PAGE_SIZE: u64 = 100_000;

/// Namespace prefix the reporting API puts on every dimension and metric name.
pub const VENDOR_PREFIX: &str = "ga:";
