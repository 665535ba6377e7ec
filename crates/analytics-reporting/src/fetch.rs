use std::future::Future;

use crate::{PAGE_SIZE, ReportPage, ReportQuery, Result};

/// Issues a single paged report request.
///
/// `page_token` is the string form of a row offset (`"0"`, `"100000"`, ...). Implementations
/// must classify failures into [`Error::Transient`] or [`Error::Permanent`] so that
/// [`RetryingRequestWrapper`] knows what to retry.
///
/// [`Error::Transient`]: crate::Error::Transient
/// [`Error::Permanent`]: crate::Error::Permanent
/// [`RetryingRequestWrapper`]: crate::RetryingRequestWrapper
pub trait ReportFetcher {
    fn fetch(
        &self,
        query: &ReportQuery,
        page_token: &str,
    ) -> impl Future<Output = Result<ReportPage>> + Send;

    /// Rows requested per page.
    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }
}

impl<F: ReportFetcher + ?Sized> ReportFetcher for &F {
    fn fetch(
        &self,
        query: &ReportQuery,
        page_token: &str,
    ) -> impl Future<Output = Result<ReportPage>> + Send {
        (**self).fetch(query, page_token)
    }

    fn page_size(&self) -> u64 {
        (**self).page_size()
    }
}
