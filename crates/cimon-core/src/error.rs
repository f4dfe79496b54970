//! Pipeline error taxonomy.
//!
//! Sources never propagate errors out of `produce` — source-local failures
//! are logged and become "no records this cycle". The variants here cover
//! the construction-time invariants and the storage seam.

use crate::record::MetricGroup;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A second source was constructed for a group that already has one.
    /// This is a programming error caught at startup, before any event
    /// delivery begins.
    #[error("duplicate data source for group '{0}'")]
    DuplicateSource(MetricGroup),

    /// An operation that needs an active session ran without one.
    #[error("no active collection session")]
    NoSession,

    /// `start_session` was called while a session is already running.
    #[error("a collection session is already active")]
    SessionActive,

    /// The persistent sink reported a failure.
    #[error("storage sink failure: {0}")]
    Sink(String),
}

/// Convenience alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
