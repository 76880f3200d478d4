//! Resolved flagwatch configuration.

use super::env::{EnvError, EnvParser};
use super::source::Sourced;
use crate::evaluator::EvaluationSettings;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_FLIPT_URL: &str = "http://flipt:8080";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_FLAG_KEY: &str = "feature_toggle";
pub const DEFAULT_VARIANT_FLAG_KEY: &str = "color_box";
pub const DEFAULT_ENTITY_ID: &str = "user123";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Everything needed to evaluate the watched flags.
#[derive(Debug, Clone)]
pub struct FlagwatchConfig {
    pub flipt_url: Sourced<String>,
    pub namespace: Sourced<Option<String>>,
    pub flag_key: Sourced<String>,
    pub variant_flag_key: Sourced<Option<String>>,
    pub entity_id: Sourced<String>,
    pub context: Sourced<BTreeMap<String, String>>,
    pub timeout_ms: Sourced<u64>,
}

impl Default for FlagwatchConfig {
    fn default() -> Self {
        Self {
            flipt_url: Sourced::default_value(DEFAULT_FLIPT_URL.to_string()),
            namespace: Sourced::default_value(Some(DEFAULT_NAMESPACE.to_string())),
            flag_key: Sourced::default_value(DEFAULT_FLAG_KEY.to_string()),
            variant_flag_key: Sourced::default_value(Some(DEFAULT_VARIANT_FLAG_KEY.to_string())),
            entity_id: Sourced::default_value(DEFAULT_ENTITY_ID.to_string()),
            context: Sourced::default_value(BTreeMap::new()),
            timeout_ms: Sourced::default_value(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl FlagwatchConfig {
    /// Load from `FLIPT_*` variables.
    ///
    /// Invalid values fall back to their defaults; the problems are returned
    /// alongside the config.
    pub fn from_env() -> (Self, Vec<EnvError>) {
        let mut parser = EnvParser::flipt();
        let config = Self {
            flipt_url: parser.get_url("URL", DEFAULT_FLIPT_URL),
            namespace: parser.get_optional_string("NAMESPACE", Some(DEFAULT_NAMESPACE)),
            flag_key: parser.get_string("FLAG_KEY", DEFAULT_FLAG_KEY),
            variant_flag_key: parser
                .get_optional_string("VARIANT_FLAG_KEY", Some(DEFAULT_VARIANT_FLAG_KEY)),
            entity_id: parser.get_string("ENTITY_ID", DEFAULT_ENTITY_ID),
            context: parser.get_key_values("CONTEXT"),
            timeout_ms: parser.get_u64_range("TIMEOUT_MS", DEFAULT_TIMEOUT_MS, 100, 60_000),
        };
        (config, parser.take_errors())
    }

    /// Replace the base URL (e.g. from a CLI flag).
    pub fn with_flipt_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.flipt_url = Sourced::from_cli(url.trim_end_matches('/').to_string(), "--flipt-url");
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.value)
    }

    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            base_url: self.flipt_url.value.clone(),
            namespace: self.namespace.value.clone(),
            flag_key: self.flag_key.value.clone(),
            variant_flag_key: self.variant_flag_key.value.clone(),
            entity_id: self.entity_id.value.clone(),
            context: self.context.value.clone(),
        }
    }

    /// `(setting, value, origin)` rows for startup logging.
    pub fn describe(&self) -> Vec<(&'static str, String, String)> {
        vec![
            (
                "flipt_url",
                self.flipt_url.value.clone(),
                self.flipt_url.describe_source(),
            ),
            (
                "namespace",
                self.namespace.value.clone().unwrap_or_else(|| "-".to_string()),
                self.namespace.describe_source(),
            ),
            (
                "flag_key",
                self.flag_key.value.clone(),
                self.flag_key.describe_source(),
            ),
            (
                "variant_flag_key",
                self.variant_flag_key
                    .value
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
                self.variant_flag_key.describe_source(),
            ),
            (
                "entity_id",
                self.entity_id.value.clone(),
                self.entity_id.describe_source(),
            ),
            (
                "timeout_ms",
                self.timeout_ms.value.to_string(),
                self.timeout_ms.describe_source(),
            ),
        ]
    }
}
