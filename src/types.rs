//! Request, record and response types shared by the verifier and its clients.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Prefix of every reference-record cache key.
pub const CACHE_KEY_PREFIX: &str = "fingerprint:";

/// Identifies whose reference record is being looked up.
///
/// The subject identifier is kept as received; [`IdentityKey::subject_number`]
/// validates it before any lookup is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    subject_id: String,
    modality: Option<String>,
}

impl IdentityKey {
    /// Create a new identity key.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, modality: Option<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            modality,
        }
    }

    /// The subject identifier as received.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// The finger/modality selector, if any.
    #[must_use]
    pub fn modality(&self) -> Option<&str> {
        self.modality.as_deref()
    }

    /// Cache key for this identity: `fingerprint:{subject}-{modality}`.
    ///
    /// The subject is written as its parsed number, so identifiers that
    /// differ only in leading zeros share one entry, as they share one
    /// store record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the subject identifier is not a
    /// valid number.
    pub fn cache_key(&self) -> Result<String> {
        let subject = self.subject_number()?;
        Ok(match &self.modality {
            Some(modality) => format!("{CACHE_KEY_PREFIX}{subject}-{modality}"),
            None => format!("{CACHE_KEY_PREFIX}{subject}"),
        })
    }

    /// Parse the subject identifier as an unsigned decimal number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the identifier is empty, contains
    /// anything other than ASCII digits, or overflows `u64`.
    pub fn subject_number(&self) -> Result<u64> {
        let id = self.subject_id.as_str();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "subject identifier {id:?} is not a number"
            )));
        }
        id.parse()
            .map_err(|_| Error::InvalidInput(format!("subject identifier {id:?} is out of range")))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.modality {
            Some(modality) => write!(f, "{}/{modality}", self.subject_id),
            None => write!(f, "{}", self.subject_id),
        }
    }
}

/// Primary key of a reference record in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// Validated subject number.
    pub subject: u64,
    /// Modality, present only when the store is keyed per finger.
    pub modality: Option<String>,
}

/// A single fingerprint minutia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minutia {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// Ridge direction in degrees.
    pub angle: i32,
    /// Minutia type tag (e.g. "ending", "bifurcation").
    #[serde(rename = "type")]
    pub kind: String,
}

impl Minutia {
    /// Create a new minutia.
    #[must_use]
    pub fn new(x: i32, y: i32, angle: i32, kind: impl Into<String>) -> Self {
        Self {
            x,
            y,
            angle,
            kind: kind.into(),
        }
    }
}

/// The durable reference record for an identity.
///
/// Attributes other than the modality and minutiae are carried through as
/// normalized JSON so a cached copy stays field-equivalent to the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Modality the record was enrolled with.
    #[serde(default, alias = "dedo", skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
    /// Ordered reference minutiae.
    #[serde(default)]
    pub minutiae: Vec<Minutia>,
    /// Remaining stored attributes.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ReferenceRecord {
    /// Create a record with no extra attributes.
    #[must_use]
    pub fn new(modality: Option<String>, minutiae: Vec<Minutia>) -> Self {
        Self {
            modality,
            minutiae,
            attributes: Map::new(),
        }
    }

    /// Decode a normalized store document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the document does not have the shape of a
    /// reference record.
    pub fn from_document(document: Value) -> Result<Self> {
        serde_json::from_value(document)
            .map_err(|e| Error::Store(format!("Malformed reference record: {e}")))
    }

    /// Whether the record can be used as a reference for `modality`.
    ///
    /// A record without a modality matches any request; a record with one
    /// must match exactly. Records without minutiae never match.
    #[must_use]
    pub fn matches(&self, modality: Option<&str>) -> bool {
        if self.minutiae.is_empty() {
            return false;
        }
        match (self.modality.as_deref(), modality) {
            (Some(stored), Some(requested)) => stored == requested,
            _ => true,
        }
    }
}

/// Candidate minutiae supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateMinutiae {
    /// One minutiae set.
    Single(Vec<Minutia>),
    /// Several sets, each compared independently.
    Multiple(Vec<Vec<Minutia>>),
}

impl CandidateMinutiae {
    /// The candidate sets in request order.
    #[must_use]
    pub fn sets(&self) -> Vec<&[Minutia]> {
        match self {
            Self::Single(set) => vec![set.as_slice()],
            Self::Multiple(sets) => sets.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Number of candidate sets.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(sets) => sets.len(),
        }
    }

    /// True when no candidate set was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An inbound verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Whose reference to compare against.
    pub key: IdentityKey,
    /// Minutiae to compare.
    pub candidates: CandidateMinutiae,
}

impl VerificationRequest {
    /// Create a new request.
    #[must_use]
    pub fn new(key: IdentityKey, candidates: CandidateMinutiae) -> Self {
        Self { key, candidates }
    }
}

/// Result of one scoring dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Whether the scoring engine accepted the comparison.
    pub success: bool,
    /// Opaque verdict payload.
    pub payload: Value,
}

/// Where the reference record was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// Served from the volatile cache.
    Cache,
    /// Loaded from the durable store.
    Store,
}

impl RecordSource {
    /// Lowercase label, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
        }
    }
}

/// Per-request correlation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: Uuid,
}

impl TraceContext {
    /// Generate a fresh trace context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4(),
        }
    }

    /// The trace id.
    #[must_use]
    pub const fn trace_id(&self) -> Uuid {
        self.trace_id
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trace_id)
    }
}

/// Successful verification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResponse {
    /// Trace id of the request.
    pub trace_id: Uuid,
    /// Where the reference came from.
    pub source: RecordSource,
    /// One outcome per candidate set, in request order.
    pub outcomes: Vec<VerificationOutcome>,
}
