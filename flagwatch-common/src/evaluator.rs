//! End-to-end evaluation: transport, normalization and fallback.

use crate::errors::EvaluationError;
use crate::fallback;
use crate::normalize::{BooleanOutcome, normalize_boolean, normalize_variant};
use crate::transport::{Endpoint, EvaluationTransport};
use crate::types::{FlagQuery, StatusSnapshot, VariantValue};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What to evaluate and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationSettings {
    pub base_url: String,
    pub namespace: Option<String>,
    pub flag_key: String,
    /// Variant flag supplying the display color. `None` skips the second call.
    pub variant_flag_key: Option<String>,
    pub entity_id: String,
    pub context: BTreeMap<String, String>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://flipt:8080".to_string(),
            namespace: Some("default".to_string()),
            flag_key: "feature_toggle".to_string(),
            variant_flag_key: Some("color_box".to_string()),
            entity_id: "user123".to_string(),
            context: BTreeMap::new(),
        }
    }
}

impl EvaluationSettings {
    pub fn boolean_query(&self) -> FlagQuery {
        self.query(&self.flag_key)
    }

    pub fn variant_query(&self) -> Option<FlagQuery> {
        self.variant_flag_key.as_deref().map(|key| self.query(key))
    }

    fn query(&self, flag_key: &str) -> FlagQuery {
        FlagQuery::new(flag_key, &self.entity_id)
            .with_namespace(self.namespace.clone())
            .with_context(self.context.clone())
    }
}

/// Computes a fresh [`StatusSnapshot`] per call. Holds no per-poll state.
#[derive(Debug, Clone)]
pub struct FlagEvaluator<T> {
    transport: T,
    settings: EvaluationSettings,
}

impl<T: EvaluationTransport> FlagEvaluator<T> {
    pub fn new(transport: T, settings: EvaluationSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Evaluate the status flag and, if that reached the service, the
    /// variant flag. Never fails.
    pub async fn snapshot(&self) -> StatusSnapshot {
        match self.evaluate_boolean().await {
            Ok(outcome) => {
                let variant = self.evaluate_variant().await;
                let snapshot = fallback::resolve(&outcome, variant, Utc::now());
                if let Some(warning) = &snapshot.warning {
                    warn!(flag_key = %self.settings.flag_key, "{}", warning);
                }
                snapshot
            }
            Err(err) => {
                warn!(
                    flag_key = %self.settings.flag_key,
                    unreachable = err.is_unreachable(),
                    "Flag evaluation failed: {}",
                    err
                );
                fallback::on_failure(&err, Utc::now())
            }
        }
    }

    async fn evaluate_boolean(&self) -> Result<BooleanOutcome, EvaluationError> {
        let query = self.settings.boolean_query();
        let raw = self
            .transport
            .evaluate(&self.settings.base_url, Endpoint::Boolean, &query)
            .await?;
        let outcome = normalize_boolean(&raw)?;
        debug!(flag_key = %query.flag_key, ?outcome, "Boolean flag normalized");
        Ok(outcome)
    }

    /// Resolve the variant. Failures degrade to the fallback value.
    async fn evaluate_variant(&self) -> Option<VariantValue> {
        let query = self.settings.variant_query()?;
        let raw = match self
            .transport
            .evaluate(&self.settings.base_url, Endpoint::Variant, &query)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                debug!(flag_key = %query.flag_key, "Variant evaluation failed: {}", err);
                return Some(VariantValue::fallback());
            }
        };

        match normalize_variant(&raw) {
            Ok(variant) => Some(variant),
            Err(err) => {
                debug!(flag_key = %query.flag_key, "Variant response unusable: {}", err);
                Some(VariantValue::fallback())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::mock_flipt::{MockResponse, MockTransport};
    use crate::types::CanonicalFlagState;

    fn evaluator(mock: MockTransport) -> FlagEvaluator<MockTransport> {
        FlagEvaluator::new(mock, EvaluationSettings::default())
    }

    #[tokio::test]
    async fn enabled_with_color() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": true, "reason": "MATCH"}"#))
            .variant(MockResponse::json(r##"{"variantKey": "#ff00ff"}"##))
            .build();
        let snapshot = evaluator(mock.clone()).snapshot().await;

        assert_eq!(snapshot.state, CanonicalFlagState::Enabled);
        assert_eq!(snapshot.color(), "green");
        assert_eq!(snapshot.display_variant().as_str(), "#ff00ff");
        assert!(snapshot.warning.is_none());
        assert_eq!(mock.calls(), vec![Endpoint::Boolean, Endpoint::Variant]);
    }

    #[tokio::test]
    async fn queries_carry_settings() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": false}"#))
            .variant(MockResponse::json(r#"{"variantKey": ""}"#))
            .build();
        evaluator(mock.clone()).snapshot().await;

        let queries = mock.queries();
        assert_eq!(queries[0].flag_key, "feature_toggle");
        assert_eq!(queries[1].flag_key, "color_box");
        assert!(queries.iter().all(|q| q.entity_id == "user123"));
        assert!(queries.iter().all(|q| q.namespace.as_deref() == Some("default")));
        assert!(mock.base_urls().iter().all(|u| u == "http://flipt:8080"));
    }

    #[tokio::test]
    async fn transport_failure_skips_variant() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::Fail(TransportError::Status {
                url: "http://flipt:8080/evaluate/v1/boolean".to_string(),
                status: 503,
            }))
            .build();
        let snapshot = evaluator(mock.clone()).snapshot().await;

        assert_eq!(snapshot.state, CanonicalFlagState::Error);
        assert_eq!(snapshot.color(), "red");
        assert!(!snapshot.warning.unwrap().is_empty());
        assert!(snapshot.variant.unwrap().is_fallback());
        assert_eq!(mock.calls(), vec![Endpoint::Boolean]);
    }

    #[tokio::test]
    async fn malformed_body_is_error() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json("{not json"))
            .build();
        let snapshot = evaluator(mock).snapshot().await;
        assert_eq!(snapshot.state, CanonicalFlagState::Error);
        assert!(snapshot.warning.is_some());
    }

    #[tokio::test]
    async fn variant_failure_keeps_boolean_state() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"enabled": true}"#))
            .variant(MockResponse::Fail(TransportError::Status {
                url: "http://flipt:8080/evaluate/v1/variant".to_string(),
                status: 404,
            }))
            .build();
        let snapshot = evaluator(mock).snapshot().await;

        assert_eq!(snapshot.state, CanonicalFlagState::Enabled);
        assert!(snapshot.warning.is_none());
        assert!(snapshot.display_variant().is_fallback());
    }

    #[tokio::test]
    async fn no_variant_flag_makes_one_call() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"value": "true"}"#))
            .build();
        let settings = EvaluationSettings {
            variant_flag_key: None,
            ..EvaluationSettings::default()
        };
        let snapshot = FlagEvaluator::new(mock.clone(), settings).snapshot().await;

        assert_eq!(snapshot.state, CanonicalFlagState::Enabled);
        assert!(snapshot.variant.is_none());
        assert_eq!(mock.calls(), vec![Endpoint::Boolean]);
    }

    #[tokio::test]
    async fn unexpected_value_is_disabled_with_warning() {
        let mock = MockTransport::builder()
            .boolean(MockResponse::json(r#"{"value": "purple"}"#))
            .variant(MockResponse::json(r#"{"variantKey": "purple"}"#))
            .build();
        let snapshot = evaluator(mock).snapshot().await;

        assert_eq!(snapshot.state, CanonicalFlagState::Disabled);
        assert!(snapshot.warning.unwrap().contains("'purple'"));
    }
}
