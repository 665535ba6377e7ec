use std::sync::Arc;

use gcp_auth::TokenProvider;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Response, Url};

use crate::fetch::ReportFetcher;
use crate::resources::{BatchGetRequest, BatchGetResponse, ErrorEnvelope};
use crate::{Error, ReportPage, ReportQuery};

/// The `reports:batchGet` endpoint.
pub const BASE_URL: &str = "https://analyticsreporting.googleapis.com/v4/reports:batchGet";

/// Read-only access is all the reporting endpoint needs.
pub const SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Everything a [`ReportingClient`] needs besides credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingConfig {
    view_id: Box<str>,
    endpoint: Url,
}

impl ReportingConfig {
    pub fn new(view_id: impl Into<Box<str>>) -> Result<Self, Error> {
        Self::with_endpoint(view_id, BASE_URL)
    }

    /// Points the client at a different endpoint, i.e a local stand-in.
    pub fn with_endpoint(view_id: impl Into<Box<str>>, endpoint: &str) -> Result<Self, Error> {
        let view_id = view_id.into();
        if view_id.trim().is_empty() {
            return Err(Error::InvalidConfig("a view id is required".into()));
        }

        let endpoint = Url::parse(endpoint)
            .map_err(|err| Error::InvalidConfig(format!("invalid endpoint '{endpoint}': {err}").into()))?;

        Ok(Self { view_id, endpoint })
    }

    #[inline]
    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// REST client for the reporting API. Cheap to clone.
#[derive(Clone)]
pub struct ReportingClient {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    client: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    config: ReportingConfig,
}

impl std::fmt::Debug for ReportingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportingClient")
            .field("view_id", &self.inner.config.view_id())
            .field("endpoint", &self.inner.config.endpoint().as_str())
            .finish_non_exhaustive()
    }
}

impl ReportingClient {
    pub fn new_from_parts(
        auth: Arc<dyn TokenProvider>,
        client: reqwest::Client,
        config: ReportingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(InnerClient {
                client,
                auth,
                config,
            }),
        }
    }

    pub fn new_from_auth(auth: Arc<dyn TokenProvider>, config: ReportingConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("analytics-reporting-rs")
            .build()?;

        Ok(Self::new_from_parts(auth, client, config))
    }

    #[inline]
    pub fn config(&self) -> &ReportingConfig {
        &self.inner.config
    }
}

impl InnerClient {
    async fn get_auth_header(&self) -> Result<HeaderValue, Error> {
        let token = self.auth.token(&[SCOPE]).await?;

        let mut header = HeaderValue::try_from(format!("Bearer {}", token.as_str()))?;
        header.set_sensitive(true);

        Ok(header)
    }

    async fn batch_get(&self, query: &ReportQuery, page_size: u64, page_token: &str) -> Result<ReportPage, Error> {
        let header = self.get_auth_header().await?;
        let body = BatchGetRequest::new(self.config.view_id(), query, page_size, page_token);

        let response = self
            .client
            .post(self.config.endpoint().clone())
            .header(AUTHORIZATION, header)
            .json(&body)
            .send()
            .await?;

        let response: BatchGetResponse = handle_json_response(response).await?;
        response.into_first_report()
    }
}

impl ReportFetcher for ReportingClient {
    async fn fetch(&self, query: &ReportQuery, page_token: &str) -> crate::Result<ReportPage> {
        self.inner.batch_get(query, self.page_size(), page_token).await
    }
}

pub(crate) async fn handle_error(response: Response) -> Error {
    let status = response.status().as_u16();

    match response.text().await {
        Ok(text) => error_from_body(status, &text),
        Err(error) => error.into(),
    }
}

/// Classifies a non-2XX response body. Falls back to the raw text when the body isn't the
/// usual JSON error envelope.
pub(crate) fn error_from_body(status: u16, text: &str) -> Error {
    if text.trim_start().starts_with('{') {
        match serde_json::from_str::<ErrorEnvelope>(text) {
            Ok(ErrorEnvelope { error }) => {
                let message = error.message.clone();
                return Error::from_service(status, error.reason(), message);
            }
            Err(error) => warn!(
                message = "failed to deserialize error json, falling back to raw text",
                ?error
            ),
        }
    }

    Error::from_service(status, None, text.into())
}

pub(crate) async fn handle_json_response<T>(response: Response) -> crate::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if !response.status().is_success() {
        return Err(handle_error(response).await);
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_envelope() {
        let body = r#"{
            "error": {
                "code": 403,
                "message": "Quota Error: profileId 12345 has exceeded the daily request limit.",
                "status": "PERMISSION_DENIED",
                "errors": [{"reason": "dailyLimitExceeded", "domain": "usageLimits"}]
            }
        }"#;

        let err = error_from_body(403, body);
        assert!(matches!(err, Error::Permanent { status: 403, .. }));
        assert_eq!(err.reason(), Some("dailyLimitExceeded"));

        let body = r#"{"error": {"code": 429, "message": "slow down",
            "errors": [{"reason": "userRateLimitExceeded"}]}}"#;
        let err = error_from_body(429, body);
        assert!(matches!(err, Error::Transient { .. }));
        assert_eq!(err.reason(), Some("userRateLimitExceeded"));
    }

    #[test]
    fn test_error_without_reason() {
        let err = error_from_body(500, r#"{"error": {"code": 500, "message": "oops"}}"#);
        assert_eq!(err.reason(), Some("internalServerError"));
        assert!(matches!(err, Error::Transient { .. }));

        let err = error_from_body(502, "<html>Bad Gateway</html>");
        assert_eq!(err.reason(), Some("backendError"));

        let err = error_from_body(400, "{not json");
        assert!(matches!(err, Error::Permanent { status: 400, reason: None, .. }));
    }

    #[test]
    fn test_config() {
        let config = ReportingConfig::new("12345").unwrap();
        assert_eq!(config.view_id(), "12345");
        assert_eq!(config.endpoint().as_str(), BASE_URL);

        assert!(ReportingConfig::new(" ").is_err());
        assert!(ReportingConfig::with_endpoint("12345", "not a url").is_err());
    }
}
