//! Fingerprint verification orchestrator.
//!
//! Given an identity key and candidate minutiae, the [`Verifier`] resolves the
//! reference record through a volatile cache, falls back to the durable store
//! on a miss, writes the record back into the cache, and submits the
//! comparison to a remote scoring engine.
//!
//! # Architecture
//!
//! ```text
//! verify(request)
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Check cache         │
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!   HIT      MISS / ERROR
//!    │             │
//!    │             ▼
//!    │       Query store
//!    │             │
//!    │      ┌──────┴──────┐
//!    │      │             │
//!    │    FOUND       NOT FOUND
//!    │      │             │
//!    │      ▼             ▼
//!    │  Write back    404, no dispatch
//!    │      │
//!    ▼      ▼
//!  Dispatch to scoring engine
//! ```
//!
//! Every stage transition is reported to an [`audit::AuditSink`] carrying the
//! request's trace id.

pub mod audit;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod service;
pub mod store;
pub mod types;
pub mod verifier;

pub use config::ServiceConfig;
pub use error::{Error, FailureKind, Result, VerificationError};
pub use service::{CacheHealth, HealthReport, Service, ServiceBuilder};
pub use types::{
    CandidateMinutiae, IdentityKey, Minutia, RecordSource, ReferenceRecord, StoreKey,
    TraceContext, VerificationOutcome, VerificationRequest, VerificationResponse,
};
pub use verifier::{KeyScheme, Verifier, VerifierConfig, VerifierStats};
