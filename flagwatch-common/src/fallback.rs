//! Fallback policy: every evaluation path ends in a [`StatusSnapshot`].

use crate::errors::{EvaluationError, NormalizeError};
use crate::normalize::BooleanOutcome;
use crate::types::{CanonicalFlagState, StatusSnapshot, VariantValue};
use chrono::{DateTime, Utc};

/// Snapshot for a failed evaluation.
///
/// State is `Error`, the variant is the fallback, and the warning embeds the
/// cause.
pub fn on_failure(error: &EvaluationError, observed_at: DateTime<Utc>) -> StatusSnapshot {
    StatusSnapshot::new(CanonicalFlagState::Error, observed_at)
        .with_variant(Some(VariantValue::fallback()))
        .with_warning(failure_warning(error))
}

/// Snapshot for a normalized boolean outcome plus the resolved variant.
pub fn resolve(
    outcome: &BooleanOutcome,
    variant: Option<VariantValue>,
    observed_at: DateTime<Utc>,
) -> StatusSnapshot {
    let snapshot = StatusSnapshot::new(outcome.state(), observed_at).with_variant(variant);
    match outcome {
        BooleanOutcome::Decided { .. } => snapshot,
        BooleanOutcome::Unexpected { field, value } => {
            snapshot.with_warning(unexpected_warning(field, value))
        }
    }
}

fn failure_warning(error: &EvaluationError) -> String {
    match error {
        EvaluationError::Transport(err) if err.is_unreachable() => {
            format!("Flag service unreachable: {err}. Feature status is unknown.")
        }
        EvaluationError::Transport(err) => {
            format!("Flag service request failed: {err}. Feature status is unknown.")
        }
        EvaluationError::Normalize(NormalizeError::AmbiguousResponse { .. }) => {
            format!("Flag service returned an unrecognized response: {error}.")
        }
        EvaluationError::Normalize(err) => {
            format!("Flag service returned an unreadable response: {err}.")
        }
    }
}

fn unexpected_warning(field: &str, value: &str) -> String {
    format!(
        "Flag service returned an unexpected {field}: '{value}' (expected 'true' or 'false'). \
         Feature is treated as DISABLED."
    )
}
