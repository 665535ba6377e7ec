use net_utils::IsTransient;
use net_utils::transient::{DefaultTransientReasons, reason_from_status};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rate limiting, quota or server side failures. Retryable.
    #[error("transient reporting error ({status} {reason}): {message}")]
    Transient {
        status: u16,
        reason: Box<str>,
        message: Box<str>,
    },
    /// Malformed queries, auth failures, and anything else the service rejects outright.
    #[error("reporting request rejected ({status}): {message}")]
    Permanent {
        status: u16,
        reason: Option<Box<str>>,
        message: Box<str>,
    },
    #[error("report for {start_date} to {end_date} contains sampled data")]
    Sampled {
        start_date: Box<str>,
        end_date: Box<str>,
    },
    #[error("request never succeeded after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },
    #[error("invalid report query: {0}")]
    InvalidQuery(Box<str>),
    #[error("metric '{metric}' has a non-numeric value '{value}'")]
    InvalidMetricValue { metric: Box<str>, value: Box<str> },
    #[error("reporting response contained no report")]
    MissingReport,
    #[error("invalid reporting client config: {0}")]
    InvalidConfig(Box<str>),
    #[error("access token isn't a valid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error(transparent)]
    Auth(#[from] gcp_auth::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Builds the service error for a non-2XX response. The reason from the error body wins,
    /// falling back to the reason implied by the status.
    pub(crate) fn from_service(status: u16, reason: Option<&str>, message: Box<str>) -> Self {
        match reason.or(reason_from_status(status)) {
            Some(reason) if DefaultTransientReasons.is_transient(reason) => Self::Transient {
                status,
                reason: reason.into(),
                message,
            },
            reason => Self::Permanent {
                status,
                reason: reason.map(Box::from),
                message,
            },
        }
    }

    /// Whether the retry wrapper should try again after this error. Every service error with
    /// a reason is put to `classifier`, so a custom classifier can both narrow and widen the
    /// default set.
    pub fn is_retryable<C: IsTransient + ?Sized>(&self, classifier: &C) -> bool {
        match self {
            Self::Transient { reason, .. } => classifier.is_transient(reason),
            Self::Permanent {
                reason: Some(reason),
                ..
            } => classifier.is_transient(reason),
            _ => false,
        }
    }

    /// The service reason attached to this error, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Transient { reason, .. } => Some(&**reason),
            Self::Permanent { reason, .. } => reason.as_deref(),
            Self::RetriesExhausted { last, .. } => last.reason(),
            _ => None,
        }
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, Self::Sampled { .. })
    }
}
