//! End-to-end tests for fingerprint-verifier.
//!
//! Services are assembled through `ServiceBuilder` with in-process
//! collaborators that count every call, so tests can assert exactly which
//! stages touched the cache, the store and the scoring engine.

mod harness;
mod http_dispatch;
mod verification;

pub use harness::{HarnessConfig, TestHarness};
