//! Shared flag evaluation and status reconciliation for flagwatch.
//!
//! The pipeline is: [`transport`] issues the outbound evaluation call,
//! [`normalize`] turns the raw body into a canonical state, [`fallback`]
//! absorbs every failure into a [`StatusSnapshot`], and [`reconcile`]
//! decides which snapshots are worth announcing.

pub mod config;
pub mod errors;
pub mod evaluator;
pub mod fallback;
pub mod logging;
pub mod mock_flipt;
pub mod normalize;
pub mod present;
pub mod reconcile;
pub mod transport;
pub mod types;

pub use config::{EnvError, EnvParser, FlagwatchConfig};
pub use errors::{EvaluationError, NormalizeError, TransportError};
pub use evaluator::{EvaluationSettings, FlagEvaluator};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use present::{RenderMode, StatusView};
pub use reconcile::{Reconciliation, TransitionLog, reconcile};
pub use transport::{Endpoint, EvaluationTransport, HttpTransport, RawEvaluationResult};
pub use types::{CanonicalFlagState, FlagQuery, StatusSnapshot, TransitionLogEntry, VariantValue};
