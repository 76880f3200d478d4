//! Response normalization.
//!
//! Flipt has answered flag evaluations in several shapes over time:
//!
//! | Shape                  | Body                              |
//! |------------------------|-----------------------------------|
//! | boolean evaluation     | `{"enabled": bool, "reason": ..}` |
//! | generic evaluate       | `{"value": "true" \| "false" \| ..}`  |
//! | variant evaluation     | `{"variantKey": "..."}`           |
//!
//! Boolean bodies are decoded by trying each schema in priority order
//! (`enabled` beats `value`); fields outside the matched schema are ignored.
//! A non-null `enabled` that is not a boolean is unexpected even when a
//! usable `value` is present.

use crate::errors::NormalizeError;
use crate::transport::RawEvaluationResult;
use crate::types::{CanonicalFlagState, VariantValue};
use serde::Deserialize;
use serde_json::Value;

/// Decoded boolean flag response. Variant order is match priority.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BooleanResponse {
    Evaluated {
        enabled: bool,
        #[serde(default)]
        reason: Option<Value>,
    },
    Generic {
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct VariantResponse {
    #[serde(rename = "variantKey", default)]
    variant_key: Option<String>,
}

/// Outcome of normalizing a boolean flag response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanOutcome {
    /// The service gave a recognized boolean answer.
    Decided {
        enabled: bool,
        reason: Option<String>,
    },
    /// The body decoded but the flag value was not a recognized boolean.
    Unexpected { field: &'static str, value: String },
}

impl BooleanOutcome {
    pub fn state(&self) -> CanonicalFlagState {
        match self {
            Self::Decided { enabled, .. } => CanonicalFlagState::from_enabled(*enabled),
            Self::Unexpected { .. } => CanonicalFlagState::Disabled,
        }
    }
}

/// Normalize a boolean flag response.
pub fn normalize_boolean(raw: &RawEvaluationResult) -> Result<BooleanOutcome, NormalizeError> {
    let document = decode_object(&raw.body)?;

    if let Some(enabled) = document.get("enabled").filter(|v| !v.is_null() && !v.is_boolean()) {
        return Ok(BooleanOutcome::Unexpected {
            field: "enabled",
            value: enabled.to_string(),
        });
    }

    match BooleanResponse::deserialize(&document) {
        Ok(BooleanResponse::Evaluated { enabled, reason }) => Ok(BooleanOutcome::Decided {
            enabled,
            reason: reason.and_then(|r| r.as_str().map(str::to_string)),
        }),
        Ok(BooleanResponse::Generic { value }) => Ok(interpret_value(value)),
        Err(_) => classify_mismatch(&document),
    }
}

/// Normalize a variant flag response.
///
/// A missing, null, or empty `variantKey` is not an error; it yields the
/// fallback variant.
pub fn normalize_variant(raw: &RawEvaluationResult) -> Result<VariantValue, NormalizeError> {
    let document = decode_object(&raw.body)?;
    let response = VariantResponse::deserialize(&document)
        .map_err(|e| NormalizeError::Decode(format!("variantKey: {e}")))?;

    Ok(response
        .variant_key
        .map(VariantValue::new)
        .unwrap_or_else(VariantValue::fallback))
}

fn decode_object(body: &str) -> Result<Value, NormalizeError> {
    if body.trim().is_empty() {
        return Err(NormalizeError::Decode("empty response body".to_string()));
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| NormalizeError::Decode(e.to_string()))?;
    if !value.is_object() {
        return Err(NormalizeError::Decode(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    Ok(value)
}

/// The `value` field of the generic evaluate shape.
///
/// Only the exact strings `"true"` and `"false"` count as booleans; anything
/// else (including a variant key) is reported as unexpected.
fn interpret_value(value: String) -> BooleanOutcome {
    match value.as_str() {
        "true" => BooleanOutcome::Decided {
            enabled: true,
            reason: None,
        },
        "false" => BooleanOutcome::Decided {
            enabled: false,
            reason: None,
        },
        _ => BooleanOutcome::Unexpected {
            field: "value",
            value,
        },
    }
}

/// No schema matched. A recognized field with the wrong type is an
/// unexpected value; no recognized field at all is ambiguous.
fn classify_mismatch(document: &Value) -> Result<BooleanOutcome, NormalizeError> {
    for field in ["enabled", "value"] {
        match document.get(field) {
            None | Some(Value::Null) => continue,
            Some(other) => {
                return Ok(BooleanOutcome::Unexpected {
                    field,
                    value: other.to_string(),
                });
            }
        }
    }

    let found = document
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    Err(NormalizeError::AmbiguousResponse {
        expected: "`enabled` nor `value`".to_string(),
        found: if found.is_empty() {
            "none".to_string()
        } else {
            found
        },
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
