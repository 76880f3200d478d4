//! Scripted flag service for tests.
//!
//! [`MockTransport`] answers evaluation calls from per-endpoint scripts
//! without opening sockets, and records every call it receives.

use crate::errors::TransportError;
use crate::transport::{Endpoint, EvaluationTransport, RawEvaluationResult};
use crate::types::FlagQuery;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Body(RawEvaluationResult),
    Fail(TransportError),
}

impl MockResponse {
    /// A 200 response with the given body.
    pub fn json(body: impl Into<String>) -> Self {
        Self::Body(RawEvaluationResult::ok(body))
    }

    /// Connection refused for the given endpoint.
    pub fn refused() -> Self {
        Self::Fail(TransportError::Connect {
            url: "mock://flipt".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

#[derive(Debug, Clone)]
struct RecordedCall {
    base_url: String,
    endpoint: Endpoint,
    query: FlagQuery,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: HashMap<Endpoint, VecDeque<MockResponse>>,
    calls: Vec<RecordedCall>,
}

/// Cloneable scripted transport; clones share scripts and call history.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue another answer for `endpoint`.
    pub fn push(&self, endpoint: Endpoint, response: MockResponse) {
        let mut state = self.lock();
        state.scripts.entry(endpoint).or_default().push_back(response);
    }

    /// Endpoints called so far, in order.
    pub fn calls(&self) -> Vec<Endpoint> {
        let state = self.lock();
        state.calls.iter().map(|c| c.endpoint).collect()
    }

    pub fn queries(&self) -> Vec<FlagQuery> {
        let state = self.lock();
        state.calls.iter().map(|c| c.query.clone()).collect()
    }

    pub fn base_urls(&self) -> Vec<String> {
        let state = self.lock();
        state.calls.iter().map(|c| c.base_url.clone()).collect()
    }

    /// Next answer for `endpoint`. The last scripted answer repeats; an
    /// endpoint with no script answers 404.
    fn next_response(&self, base_url: &str, endpoint: Endpoint, query: &FlagQuery) -> MockResponse {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            base_url: base_url.to_string(),
            endpoint,
            query: query.clone(),
        });

        let script = state.scripts.entry(endpoint).or_default();
        let response = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        response.unwrap_or_else(|| {
            MockResponse::Fail(TransportError::Status {
                url: endpoint.url(base_url),
                status: 404,
            })
        })
    }
}

impl EvaluationTransport for MockTransport {
    async fn evaluate(
        &self,
        base_url: &str,
        endpoint: Endpoint,
        query: &FlagQuery,
    ) -> Result<RawEvaluationResult, TransportError> {
        match self.next_response(base_url, endpoint, query) {
            MockResponse::Body(raw) => Ok(raw),
            MockResponse::Fail(err) => Err(err),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    scripts: Vec<(Endpoint, MockResponse)>,
}

impl MockTransportBuilder {
    /// Script an answer for the boolean endpoint. Repeated calls queue.
    pub fn boolean(mut self, response: MockResponse) -> Self {
        self.scripts.push((Endpoint::Boolean, response));
        self
    }

    /// Script an answer for the variant endpoint. Repeated calls queue.
    pub fn variant(mut self, response: MockResponse) -> Self {
        self.scripts.push((Endpoint::Variant, response));
        self
    }

    pub fn build(self) -> MockTransport {
        let mock = MockTransport::default();
        for (endpoint, response) in self.scripts {
            mock.push(endpoint, response);
        }
        mock
    }
}
