// ── Engram Atoms: Constants ────────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic strings,
// makes auditing easier, and keeps every layer's code self-documenting.

// ── Concept taxonomy ───────────────────────────────────────────────────────
// Closed set. `validate_concept` rejects anything else with
// `InvalidConceptType`. The placeholder type below is NOT a member — it is
// assigned internally when a relationship references a concept that has not
// been defined yet, and is overwritten by the concept's own upsert.
pub const CONCEPT_TYPES: &[&str] = &["entity", "action", "property", "event", "abstract"];

/// Type assigned to auto-created placeholder concept nodes.
pub const PENDING_CONCEPT_TYPE: &str = "pending";

// ── Relationship taxonomy ──────────────────────────────────────────────────
// Closed set. `validate_relationship` rejects anything else with
// `InvalidRelationshipType`.
pub const RELATIONSHIP_TYPES: &[&str] = &[
    "is_a",
    "has_a",
    "part_of",
    "related_to",
    "causes",
    "implies",
    "precedes",
    "similar_to",
];

// ── Required context keys ──────────────────────────────────────────────────
// Every memory's context map must carry both, enforced at store time.
pub const CONTEXT_DOMAIN_KEY: &str = "domain";
pub const CONTEXT_SOURCE_KEY: &str = "source";

// ── Metadata keys ──────────────────────────────────────────────────────────
/// Optional metadata block carrying a cross-domain approval request.
/// Deserialized strictly into `CrossDomainRequest` — malformed blocks fail.
pub const METADATA_CROSS_DOMAIN_KEY: &str = "cross_domain";

// ── Consolidation defaults ─────────────────────────────────────────────────
// Overridable via `MemoryConfig`; these are the documented defaults.

/// A single unconsolidated memory at or above this importance triggers
/// consolidation on its own.
pub const DEFAULT_HIGH_PRIORITY_THRESHOLD: f32 = 0.8;

/// Unconsolidated backlog size above which consolidation triggers
/// regardless of importance.
pub const DEFAULT_BATCH_THRESHOLD: usize = 10;

/// Max candidates fetched per consolidation pass.
pub const DEFAULT_CANDIDATE_BATCH_SIZE: usize = 200;

/// Fallback domain applied when a write carries no explicit domain scope.
/// Deliberately configurable — see `MemoryConfig::default_domain`.
pub const DEFAULT_DOMAIN: &str = "professional";

// ── Search defaults ────────────────────────────────────────────────────────
/// Default result cap for episodic search when the caller gives no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;
