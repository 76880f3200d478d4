//! Change detection between consecutive snapshots.
//!
//! [`reconcile`] is a pure comparison; the caller owns the previous state and
//! threads it through. [`TransitionLog`] is the append-only record kept by
//! whoever presents the snapshots.

use crate::types::{CanonicalFlagState, StatusSnapshot, TransitionLogEntry};

/// Result of comparing a snapshot against the previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub should_log: bool,
    pub updated_previous: CanonicalFlagState,
}

/// Decide whether `snapshot` is a transition from `previous`.
///
/// The first observation (`previous == None`) always logs.
pub fn reconcile(
    previous: Option<CanonicalFlagState>,
    snapshot: &StatusSnapshot,
) -> Reconciliation {
    Reconciliation {
        should_log: previous != Some(snapshot.state),
        updated_previous: snapshot.state,
    }
}

/// Append-only transition history.
///
/// Never holds two consecutive entries with the same state, and timestamps
/// never decrease.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    entries: Vec<TransitionLogEntry>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot, returning the new entry if it was a transition.
    pub fn record(&mut self, snapshot: &StatusSnapshot) -> Option<TransitionLogEntry> {
        let last = self.entries.last().copied();
        let reconciliation = reconcile(last.map(|e| e.state), snapshot);
        if !reconciliation.should_log {
            return None;
        }

        // Clock steps backwards are clamped rather than reordered.
        let timestamp = match last {
            Some(prev) if prev.timestamp > snapshot.observed_at => prev.timestamp,
            _ => snapshot.observed_at,
        };
        let entry = TransitionLogEntry {
            timestamp,
            state: reconciliation.updated_previous,
        };
        self.entries.push(entry);
        Some(entry)
    }

    pub fn entries(&self) -> &[TransitionLogEntry] {
        &self.entries
    }

    pub fn last_state(&self) -> Option<CanonicalFlagState> {
        self.entries.last().map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
