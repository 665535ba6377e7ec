/// Classifies whether a Google API error reason is transient (i.e should be retried) or not.
pub trait IsTransient {
    fn is_transient(&self, reason: &str) -> bool;
}

impl<S: std::hash::BuildHasher> IsTransient for std::collections::HashSet<&str, S> {
    fn is_transient(&self, reason: &str) -> bool {
        self.contains(reason)
    }
}

/// Default classifier for transient error reasons: rate limiting, quota exhaustion and
/// server side failures. Reasons are the `errors[].reason` values of the Google JSON error
/// envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultTransientReasons;

pub const RATE_LIMIT_EXCEEDED: &str = "rateLimitExceeded";
pub const USER_RATE_LIMIT_EXCEEDED: &str = "userRateLimitExceeded";
pub const QUOTA_EXCEEDED: &str = "quotaExceeded";
pub const INTERNAL_SERVER_ERROR: &str = "internalServerError";
pub const BACKEND_ERROR: &str = "backendError";

impl IsTransient for DefaultTransientReasons {
    fn is_transient(&self, reason: &str) -> bool {
        matches!(
            reason,
            RATE_LIMIT_EXCEEDED
                | USER_RATE_LIMIT_EXCEEDED
                | QUOTA_EXCEEDED
                | INTERNAL_SERVER_ERROR
                | BACKEND_ERROR
        )
    }
}

/// Picks the error reason implied by a bare HTTP status, for responses that carry no
/// parseable error body.
pub const fn reason_from_status(status: u16) -> Option<&'static str> {
    match status {
        429 => Some(RATE_LIMIT_EXCEEDED),
        500 => Some(INTERNAL_SERVER_ERROR),
        502..=504 => Some(BACKEND_ERROR),
        _ => None,
    }
}

/// Whether an HTTP status alone warrants a retry: 429 (too many requests) or any 5XX
/// error on google's end.
pub const fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_default_reasons() {
        for reason in [
            "userRateLimitExceeded",
            "rateLimitExceeded",
            "quotaExceeded",
            "internalServerError",
            "backendError",
        ] {
            assert!(DefaultTransientReasons.is_transient(reason), "{reason}");
        }

        for reason in ["badRequest", "invalidParameter", "forbidden", "notFound", ""] {
            assert!(!DefaultTransientReasons.is_transient(reason), "{reason}");
        }
    }

    #[test]
    fn test_custom_set() {
        let set: HashSet<&str> = HashSet::from(["backendError"]);
        assert!(set.is_transient("backendError"));
        assert!(!set.is_transient("quotaExceeded"));
    }

    #[test]
    fn test_status_fallbacks() {
        assert_eq!(reason_from_status(429), Some(RATE_LIMIT_EXCEEDED));
        assert_eq!(reason_from_status(500), Some(INTERNAL_SERVER_ERROR));
        assert_eq!(reason_from_status(503), Some(BACKEND_ERROR));
        assert_eq!(reason_from_status(400), None);
        assert_eq!(reason_from_status(403), None);

        assert!(is_transient_status(429));
        assert!(is_transient_status(502));
        assert!(!is_transient_status(404));
    }
}
