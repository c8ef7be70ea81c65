// ── Engram Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the memory engine, built with `thiserror`.
//
// Design rules:
//   • Validation failures get dedicated variants — they are caller-visible
//     hard failures, never logged-and-defaulted away.
//   • Backend (vector/graph service) failures collapse into one coarse
//     variant and propagate untouched; retry/backoff belongs to the caller.
//   • No variant carries secret material in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Concept type outside the closed 5-member taxonomy.
    #[error("Invalid concept type: {0:?} (expected one of entity, action, property, event, abstract)")]
    InvalidConceptType(String),

    /// Relationship type outside the closed 8-member taxonomy.
    #[error("Invalid relationship type: {0:?}")]
    InvalidRelationshipType(String),

    /// A confidence value outside [0.0, 1.0].
    #[error("Invalid confidence {value} on {field} (must be within [0.0, 1.0])")]
    InvalidConfidence { field: String, value: f32 },

    /// A memory context map is missing a required key.
    #[error("Missing required context field: {0:?}")]
    MissingContextField(String),

    /// A cross-domain write without an approved cross-domain request.
    #[error("Cross-domain access denied: {home} → {requested}")]
    CrossDomainDenied { home: String, requested: String },

    /// Upstream input did not match the expected shape (strict boundary
    /// deserialization fails closed).
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lookup for an id that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vector or graph backend failure (network, timeout, storage).
    /// The engine performs no internal retry.
    #[error("Backend error: {backend}: {message}")]
    Backend { backend: String, message: String },
}

// ── Convenience constructors ───────────────────────────────────────────────

impl MemoryError {
    /// Create a backend error with service name and message.
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend { backend: backend.into(), message: message.into() }
    }

    /// Create a confidence-range error for a named field.
    pub fn confidence(field: impl Into<String>, value: f32) -> Self {
        Self::InvalidConfidence { field: field.into(), value }
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All memory-engine operations return this type.
pub type MemoryResult<T> = Result<T, MemoryError>;
