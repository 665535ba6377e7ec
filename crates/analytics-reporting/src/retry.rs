//! Retries whole report assemblies on transient service errors.

use net_utils::backoff::{Backoff, BackoffConfig, Sleeper, TokioSleeper};
use net_utils::transient::{DefaultTransientReasons, IsTransient};

use crate::{Error, PaginationAssembler, ReportFetcher, ReportQuery, ReportTable, Result};

/// Wraps a [`PaginationAssembler`], retrying it with exponential backoff whenever it fails
/// with an error the classifier considers transient.
///
/// A retry restarts the assembly from the first page, so a report is never stitched together
/// from pages fetched across different attempts.
#[derive(Debug, Clone)]
pub struct RetryingRequestWrapper<F, S = TokioSleeper, C = DefaultTransientReasons> {
    assembler: PaginationAssembler<F>,
    sleeper: S,
    classifier: C,
    config: BackoffConfig,
}

impl<F: ReportFetcher> RetryingRequestWrapper<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            assembler: PaginationAssembler::new(fetcher),
            sleeper: TokioSleeper,
            classifier: DefaultTransientReasons,
            config: BackoffConfig::default(),
        }
    }
}

impl<F, S, C> RetryingRequestWrapper<F, S, C> {
    pub fn sleeper<S2>(self, sleeper: S2) -> RetryingRequestWrapper<F, S2, C> {
        RetryingRequestWrapper {
            assembler: self.assembler,
            sleeper,
            classifier: self.classifier,
            config: self.config,
        }
    }

    pub fn classifier<C2>(self, classifier: C2) -> RetryingRequestWrapper<F, S, C2> {
        RetryingRequestWrapper {
            assembler: self.assembler,
            sleeper: self.sleeper,
            classifier,
            config: self.config,
        }
    }

    pub fn backoff_config(mut self, config: BackoffConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn assembler(&self) -> &PaginationAssembler<F> {
        &self.assembler
    }
}

impl<F, S, C> RetryingRequestWrapper<F, S, C>
where
    F: ReportFetcher,
    S: Sleeper,
    C: IsTransient,
{
    /// Assembles `query`, retrying on transient errors until the attempt ceiling is hit.
    /// Anything else is returned from the attempt that raised it, without sleeping.
    pub async fn with_retry(&self, query: &ReportQuery) -> Result<ReportTable> {
        let mut backoff: Backoff = self.config.make_backoff();

        loop {
            let error = match self.assembler.assemble(query).await {
                Ok(table) => return Ok(table),
                Err(error) if error.is_retryable(&self.classifier) => error,
                Err(error) => return Err(error),
            };

            match backoff.backoff_once() {
                Some(once) => {
                    warn!(
                        message = "report request failed, retrying",
                        reason = error.reason(),
                        attempt = once.attempt() + 1,
                        max_attempts = once.max_attempts(),
                        waiting = ?once.waiting(),
                        ?error,
                    );

                    self.sleeper.sleep(once.waiting()).await;
                }
                None => {
                    error!(
                        message = "report request never succeeded",
                        attempts = backoff.attempts(),
                        ?error,
                    );

                    return Err(Error::RetriesExhausted {
                        attempts: backoff.attempts(),
                        last: Box::new(error),
                    });
                }
            }
        }
    }
}
