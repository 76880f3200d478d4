//! Outbound evaluation calls to Flipt.
//!
//! Speaks the Flipt evaluation v1 API only:
//! - `POST /evaluate/v1/boolean` for the status flag
//! - `POST /evaluate/v1/variant` for the variant (color) flag
//!
//! One call per invocation, no retries. Non-success statuses are reported as
//! [`TransportError::Status`] and the body is discarded.

use crate::errors::TransportError;
use crate::types::FlagQuery;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Evaluation endpoint to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Boolean,
    Variant,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Boolean => "/evaluate/v1/boolean",
            Self::Variant => "/evaluate/v1/variant",
        }
    }

    /// Join this endpoint onto a base address.
    pub fn url(self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Raw successful response, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvaluationResult {
    pub status: u16,
    pub body: String,
}

impl RawEvaluationResult {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Something that can carry an evaluation request to Flipt.
pub trait EvaluationTransport: Send + Sync {
    fn evaluate(
        &self,
        base_url: &str,
        endpoint: Endpoint,
        query: &FlagQuery,
    ) -> impl Future<Output = Result<RawEvaluationResult, TransportError>> + Send;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flagwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl EvaluationTransport for HttpTransport {
    async fn evaluate(
        &self,
        base_url: &str,
        endpoint: Endpoint,
        query: &FlagQuery,
    ) -> Result<RawEvaluationResult, TransportError> {
        let url = endpoint.url(base_url);
        debug!(%url, flag_key = %query.flag_key, "Evaluating flag");

        let response = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, &e))?;
        debug!(%url, status = status.as_u16(), bytes = body.len(), "Flag response received");

        Ok(RawEvaluationResult {
            status: status.as_u16(),
            body,
        })
    }
}
