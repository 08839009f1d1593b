//! Executor error types.
//!
//! Validation, encoding and signature-integrity failures are fatal for the
//! action at hand and are never retried automatically. Submission failures
//! are reported with a `retryable` hint.

use alloy::primitives::Address;
use thiserror::Error;

use crate::signer::SignerError;
use crate::validator::ValidationReport;

/// Canonical encoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Symbol missing from the asset table; never encoded with a guessed index.
    #[error("Unknown asset symbol: {0}")]
    UnknownAsset(String),

    #[error("Action has no orders")]
    EmptyAction,

    #[error("MessagePack serialization failed: {0}")]
    Msgpack(String),

    #[error("JSON serialization failed: {0}")]
    Json(String),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Signature integrity check failed: expected {expected}, recovered {recovered}")]
    SignatureIntegrity { expected: Address, recovered: Address },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Submission failed (retryable: {retryable}): {message}")]
    Submission { message: String, retryable: bool },
}

impl ExecutorError {
    /// Fatal errors must not be retried with the same input.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Submission { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Submission { retryable: true, .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Encoding(_) => "encoding",
            Self::SignatureIntegrity { .. } => "signature_integrity",
            Self::Signing(_) => "signing",
            Self::Submission { .. } => "submission",
        }
    }
}

impl From<SignerError> for ExecutorError {
    fn from(e: SignerError) -> Self {
        match e {
            SignerError::IntegrityMismatch {
                expected,
                recovered,
            } => Self::SignatureIntegrity {
                expected,
                recovered,
            },
            other => Self::Signing(other.to_string()),
        }
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
