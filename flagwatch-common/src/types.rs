//! Core data model shared by the daemon and the watcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display color for an enabled flag.
pub const ENABLED_COLOR: &str = "green";
/// Display color for a disabled flag.
pub const DISABLED_COLOR: &str = "gray";
/// Display color when the flag could not be evaluated.
pub const ERROR_COLOR: &str = "red";
/// Variant used whenever the variant flag yields nothing usable.
pub const FALLBACK_VARIANT: &str = "#888888";

/// A single evaluation request sent to Flipt.
///
/// Built fresh for every poll; the wire form is
/// `{namespaceKey?, flagKey, entityId, context}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagQuery {
    #[serde(
        rename = "namespaceKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub namespace: Option<String>,
    #[serde(rename = "flagKey")]
    pub flag_key: String,
    #[serde(rename = "entityId")]
    pub entity_id: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl FlagQuery {
    pub fn new(flag_key: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            namespace: None,
            flag_key: flag_key.into(),
            entity_id: entity_id.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_context(mut self, context: BTreeMap<String, String>) -> Self {
        self.context = context;
        self
    }
}

/// Normalized three-way flag state.
///
/// Nothing the remote service returns reaches consumers except through this
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalFlagState {
    Enabled,
    Disabled,
    Error,
}

impl CanonicalFlagState {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    /// Wire label used in the status document.
    pub fn label(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Error => "ERROR",
        }
    }

    /// Parse a wire label. Unknown labels map to `Error`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "ENABLED" => Self::Enabled,
            "DISABLED" => Self::Disabled,
            _ => Self::Error,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Enabled => ENABLED_COLOR,
            Self::Disabled => DISABLED_COLOR,
            Self::Error => ERROR_COLOR,
        }
    }
}

impl std::fmt::Display for CanonicalFlagState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Value of the variant flag (a color code in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantValue(String);

impl VariantValue {
    /// Wrap a variant key, substituting the fallback for blank input.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::fallback()
        } else {
            Self(value)
        }
    }

    pub fn fallback() -> Self {
        Self(FALLBACK_VARIANT.to_string())
    }

    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_VARIANT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: CanonicalFlagState,
    pub variant: Option<VariantValue>,
    pub warning: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(state: CanonicalFlagState, observed_at: DateTime<Utc>) -> Self {
        Self {
            state,
            variant: None,
            warning: None,
            observed_at,
        }
    }

    pub fn with_variant(mut self, variant: Option<VariantValue>) -> Self {
        self.variant = variant;
        self
    }

    /// Attach a warning. Blank warnings are dropped.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        let warning = warning.into();
        self.warning = if warning.trim().is_empty() {
            None
        } else {
            Some(warning)
        };
        self
    }

    pub fn color(&self) -> &'static str {
        self.state.color()
    }

    /// Variant to display, falling back when none was resolved.
    pub fn display_variant(&self) -> VariantValue {
        self.variant.clone().unwrap_or_else(VariantValue::fallback)
    }
}

/// One row of the transition log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub state: CanonicalFlagState,
}
