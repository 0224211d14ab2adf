//! Scoring dispatch to the remote matching engine.
//!
//! The engine receives exactly two minutiae sets and returns an opaque
//! verdict. An unreachable engine or an undecodable answer is an error,
//! never a negative match.

mod http;

pub use http::{HttpDispatcher, HttpDispatcherConfig};

use crate::error::Result;
use crate::types::{Minutia, VerificationOutcome};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Request body sent to the scoring engine.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringPayload<'a> {
    /// Candidate minutiae supplied by the caller.
    #[serde(rename = "received_minucia")]
    pub candidate: &'a [Minutia],
    /// Reference minutiae resolved from cache or store.
    #[serde(rename = "stored_minucia")]
    pub reference: &'a [Minutia],
}

/// Compares candidate minutiae against a reference.
#[async_trait]
pub trait ScoringDispatcher: Send + Sync {
    /// Submit one comparison.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Dispatch`] if the engine is unreachable or its
    /// answer cannot be decoded.
    async fn compare(
        &self,
        candidate: &[Minutia],
        reference: &[Minutia],
    ) -> Result<VerificationOutcome>;
}

#[async_trait]
impl<D: ScoringDispatcher + ?Sized> ScoringDispatcher for Arc<D> {
    async fn compare(
        &self,
        candidate: &[Minutia],
        reference: &[Minutia],
    ) -> Result<VerificationOutcome> {
        (**self).compare(candidate, reference).await
    }
}
