//! Decides whether a failed query is worth repeating.

use crate::core::{ErrorKind, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Retrying cannot change the outcome.
    Terminal,
    /// Retrying may succeed.
    Transient,
}

/// Classifies a query failure. Only non-existence and empty answers are
/// terminal; everything else is retried.
pub fn classify(error: &QueryError) -> Classification {
    match error {
        QueryError::NxDomain | QueryError::NoAnswer => Classification::Terminal,
        QueryError::NoNameservers(_) | QueryError::Timeout | QueryError::Other(_) => {
            Classification::Transient
        }
    }
}

/// Maps a query failure onto the error type reported to callers.
pub fn error_kind(error: &QueryError) -> ErrorKind {
    match error {
        QueryError::NxDomain => ErrorKind::NxDomain,
        QueryError::NoAnswer => ErrorKind::NoAnswer,
        QueryError::Timeout => ErrorKind::Timeout,
        QueryError::NoNameservers(_) => ErrorKind::NoNameservers,
        QueryError::Other(_) => ErrorKind::ResolutionError,
    }
}
