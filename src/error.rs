//! Error types for fingerprint-verifier.

use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the verifier's collaborators and plumbing.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The identity key is not in the expected form.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Volatile cache transport or availability failure.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Durable store transport, throttling or decoding failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Scoring engine unreachable or returned an undecodable payload.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Audit sink delivery failure.
    #[error("Audit error: {0}")]
    Audit(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Classification of a terminal verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No reference record for the identity key (404-equivalent).
    NotFound,
    /// The identity key was malformed (400-equivalent).
    InvalidInput,
    /// The store or scoring engine failed (500-equivalent).
    UpstreamUnavailable,
}

impl FailureKind {
    /// HTTP-style status code for this classification.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::InvalidInput => 400,
            Self::UpstreamUnavailable => 500,
        }
    }

    const fn public_message(self) -> &'static str {
        match self {
            Self::NotFound => "reference record not found",
            Self::InvalidInput => "invalid verification request",
            Self::UpstreamUnavailable => "verification backend unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::UpstreamUnavailable => write!(f, "upstream_unavailable"),
        }
    }
}

/// A classified verification failure, correlated by trace id.
#[derive(Debug, Clone, Error)]
#[error("{kind} (trace {trace_id}): {detail}")]
pub struct VerificationError {
    /// Trace id of the failed request.
    pub trace_id: Uuid,
    /// Failure classification.
    pub kind: FailureKind,
    /// Internal detail; only shown to callers when explicitly enabled.
    pub detail: String,
}

impl VerificationError {
    /// Create a new classified failure.
    #[must_use]
    pub fn new(trace_id: Uuid, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            trace_id,
            kind,
            detail: detail.into(),
        }
    }

    /// HTTP-style status code for the failure.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Message safe to return to a caller.
    ///
    /// Internal error text is only included when `expose_details` is set.
    #[must_use]
    pub fn public_message(&self, expose_details: bool) -> String {
        if expose_details {
            format!("{}: {}", self.kind.public_message(), self.detail)
        } else {
            self.kind.public_message().to_string()
        }
    }
}
