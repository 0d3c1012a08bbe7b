//! Failure taxonomy for variant creation.
//!
//! Every failure surfaced by the engine is one of these kinds; none is ever
//! swallowed into a blank result. Only [`Cancelled`](TransformError::Cancelled)
//! and [`Timeout`](TransformError::Timeout) are worth retrying, and the engine
//! itself never retries.

use super::backend::{ActionKind, BackendError};
use super::gate::Interruption;
use super::params::ImageType;
use crate::geometry::ArithmeticOverflow;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    ArithmeticOverflow(#[from] ArithmeticOverflow),
    #[error("Could not determine source dimensions: {0}")]
    DimensionProbeFailed(String),
    #[error("No enabled transformer can {action} a {source_type} image")]
    NoCapableTransformer {
        action: ActionKind,
        source_type: ImageType,
    },
    #[error("Transformer {transformer} failed: {cause}")]
    BackendExecutionFailed {
        transformer: String,
        #[source]
        cause: BackendError,
    },
    #[error("Invalid variant request: {0}")]
    InvalidRequest(String),
    #[error("Transformation cancelled")]
    Cancelled,
    #[error("Transformation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<Interruption> for TransformError {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => TransformError::Cancelled,
            Interruption::TimedOut(after) => TransformError::Timeout(after),
        }
    }
}

impl TransformError {
    /// Wrap a backend failure, keeping interruptions as their own kinds.
    pub fn from_backend(transformer: &str, cause: BackendError) -> Self {
        match cause {
            BackendError::Interrupted(interruption) => interruption.into(),
            cause => TransformError::BackendExecutionFailed {
                transformer: transformer.to_string(),
                cause,
            },
        }
    }

    /// Cancellation and timeouts may succeed when retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransformError::Cancelled | TransformError::Timeout(_))
    }
}
