// ── Engram Atoms: Memory System Types ──────────────────────────────────────
//
// Type definitions for the two-layer memory engine. These are pure data
// types (no DB access, no I/O) — impls are limited to constructors,
// Display/FromStr pairs, and defaults.
//
// Follows the project pattern: structs in atoms/, behavior in engine/.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::atoms::constants::{
    CONTEXT_DOMAIN_KEY, CONTEXT_SOURCE_KEY, DEFAULT_BATCH_THRESHOLD,
    DEFAULT_CANDIDATE_BATCH_SIZE, DEFAULT_DOMAIN, DEFAULT_HIGH_PRIORITY_THRESHOLD,
    DEFAULT_SEARCH_LIMIT, METADATA_CROSS_DOMAIN_KEY,
};
use crate::atoms::error::MemoryResult;

/// Current UTC time as an ISO 8601 string — the canonical timestamp format
/// for every persisted record.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn default_confidence() -> f32 {
    1.0
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Memory Records
// ═══════════════════════════════════════════════════════════════════════════

/// Which layer a memory record belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
}

impl Default for MemoryType {
    fn default() -> Self {
        MemoryType::Episodic
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryType::Episodic => write!(f, "episodic"),
            MemoryType::Semantic => write!(f, "semantic"),
            MemoryType::Procedural => write!(f, "procedural"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// A persisted experience record — the episodic layer's unit of storage.
///
/// The raw material from which semantic knowledge is distilled during
/// consolidation. Created from a `MemoryDraft` by `EpisodicLayer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    /// What happened.
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Creation timestamp (ISO 8601).
    pub timestamp: String,
    /// Importance score (0.0–1.0). Higher = consolidated sooner.
    pub importance: f32,
    /// Must carry `domain` and `source` keys (validated at store time).
    pub context: HashMap<String, String>,
    /// Concepts asserted by this experience.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concepts: Vec<Concept>,
    /// Relationships asserted by this experience.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
    /// Who was involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    /// Free-form metadata. The `cross_domain` key, when present, is
    /// strictly deserialized into a `CrossDomainRequest`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Whether this record has been promoted into the semantic graph.
    #[serde(default)]
    pub consolidated: bool,
}

impl Memory {
    /// The domain this memory belongs to, if its context carries one.
    pub fn domain(&self) -> Option<&str> {
        self.context.get(CONTEXT_DOMAIN_KEY).map(String::as_str)
    }

    /// The source recorded in this memory's context, if any.
    pub fn source(&self) -> Option<&str> {
        self.context.get(CONTEXT_SOURCE_KEY).map(String::as_str)
    }
}

/// Upstream input shape for `store_experience`.
///
/// Strict boundary type: unknown fields fail deserialization closed
/// rather than being silently dropped. Missing collections default to
/// empty and importance defaults to 0.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryDraft {
    pub content: String,
    #[serde(rename = "type", default)]
    pub memory_type: MemoryType,
    #[serde(default)]
    pub importance: f32,
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MemoryDraft {
    /// Minimal draft: content plus the two required context keys.
    pub fn new(content: &str, domain: &str, source: &str) -> Self {
        let mut context = HashMap::new();
        context.insert(CONTEXT_DOMAIN_KEY.to_string(), domain.to_string());
        context.insert(CONTEXT_SOURCE_KEY.to_string(), source.to_string());
        Self { content: content.to_string(), context, ..Default::default() }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Concepts, Relationships, Beliefs
// ═══════════════════════════════════════════════════════════════════════════

/// A concept asserted by a memory. `name` is the dedup key within a domain;
/// `concept_type` must belong to the closed taxonomy (`CONCEPT_TYPES`) —
/// kept as a string so out-of-taxonomy input reaches validation and fails
/// with `InvalidConceptType` rather than an opaque parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Concept {
    pub name: String,
    #[serde(rename = "type")]
    pub concept_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Per-concept domain scope. When absent, the owning memory's
    /// domain context governs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_context: Option<DomainContext>,
}

impl Concept {
    pub fn new(name: &str, concept_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            concept_type: concept_type.to_string(),
            description: description.to_string(),
            confidence: 1.0,
            domain_context: None,
        }
    }
}

/// A typed relationship between two concepts (by name).
///
/// `domains` defaults to the owning memory's domain when empty.
/// `bidirectional = true` materializes two independent edges (A→B and B→A)
/// at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default = "now_iso")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Relationship {
    pub fn new(source: &str, target: &str, rel_type: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            rel_type: rel_type.to_string(),
            confidence: 1.0,
            domains: Vec::new(),
            bidirectional: false,
            created_at: now_iso(),
            last_updated: None,
        }
    }

    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }
}

/// A subject-predicate-object belief with confidence and domain scoping.
/// Stored in the semantic layer, distinct from the concept graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belief {
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    pub source: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Belief {
    pub fn new(subject: &str, predicate: &str, object: &str, confidence: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            confidence,
            domains: Vec::new(),
            context: HashMap::new(),
            source: String::new(),
            created_at: now_iso(),
            last_updated: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Domain Scoping & Cross-Domain Authorization
// ═══════════════════════════════════════════════════════════════════════════

/// A request to write knowledge across domain boundaries.
/// Unapproved requests cause `CrossDomainDenied` at validation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossDomainRequest {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// Validation envelope governing a write: home domain, access domain,
/// write confidence, source attribution, and any cross-domain request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSchema {
    pub domain: String,
    pub access_domain: String,
    pub confidence: f32,
    pub source: String,
    #[serde(default)]
    pub cross_domain: CrossDomainRequest,
}

impl Default for ValidationSchema {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            access_domain: DEFAULT_DOMAIN.to_string(),
            confidence: 1.0,
            source: String::new(),
            cross_domain: CrossDomainRequest::default(),
        }
    }
}

/// The domain context governing a semantic-layer mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainContext {
    pub primary_domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_vertical: Option<String>,
    #[serde(default)]
    pub validation: ValidationSchema,
}

impl DomainContext {
    pub fn new(domain: &str) -> Self {
        Self {
            primary_domain: domain.to_string(),
            knowledge_vertical: None,
            validation: ValidationSchema {
                domain: domain.to_string(),
                access_domain: domain.to_string(),
                ..Default::default()
            },
        }
    }

    /// Derive the governing context for writes originating from a memory.
    ///
    /// Reads `context["domain"]` / `context["source"]` and, when present,
    /// strictly deserializes `metadata["cross_domain"]` — a malformed block
    /// is a hard failure, not a silent default.
    pub fn for_memory(memory: &Memory, config: &MemoryConfig) -> MemoryResult<Self> {
        let domain = memory
            .domain()
            .map(str::to_string)
            .unwrap_or_else(|| config.default_domain.clone());

        let cross_domain = match memory.metadata.get(METADATA_CROSS_DOMAIN_KEY) {
            Some(value) => serde_json::from_value::<CrossDomainRequest>(value.clone())?,
            None => CrossDomainRequest::default(),
        };

        Ok(Self {
            primary_domain: domain.clone(),
            knowledge_vertical: None,
            validation: ValidationSchema {
                domain: domain.clone(),
                access_domain: domain,
                confidence: memory.importance,
                source: memory.source().unwrap_or_default().to_string(),
                cross_domain,
            },
        })
    }

    /// Approve cross-domain writes into `target` (builder, mostly for tests
    /// and upstream agents that own the approval flow).
    pub fn with_cross_domain_approval(mut self, target: &str, justification: &str) -> Self {
        self.validation.cross_domain = CrossDomainRequest {
            approved: true,
            requested: true,
            source_domain: Some(self.primary_domain.clone()),
            target_domain: Some(target.to_string()),
            justification: Some(justification.to_string()),
        };
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Persisted Graph Shapes
// ═══════════════════════════════════════════════════════════════════════════

/// A persisted concept node: label "Concept", dedup key `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptNode {
    pub name: String,
    #[serde(rename = "type")]
    pub concept_type: String,
    pub description: String,
    /// True when this node was written (or last overwritten) by the
    /// consolidation pipeline rather than a direct upsert.
    pub is_consolidation: bool,
}

/// A persisted typed edge between two concept nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub from: String,
    pub to: String,
    pub rel_type: String,
    pub domains: Vec<String>,
    pub confidence: f32,
    pub bidirectional: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Result of a concept upsert — the stable name handle plus whether the
/// node was created (vs. merged into an existing one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptRef {
    pub name: String,
    pub created: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 5: Query Surfaces
// ═══════════════════════════════════════════════════════════════════════════

/// Episodic search request. With `text`, results are similarity-ranked;
/// without, this is a filtered scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodicQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Exact match on top-level fields, plus one level of nested-map
    /// match (e.g. `{"context": {"project": "A"}}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

impl EpisodicQuery {
    pub fn text(query: &str) -> Self {
        Self { text: Some(query.to_string()), ..Default::default() }
    }

    pub fn filter(filter: serde_json::Value) -> Self {
        Self { filter: Some(filter), ..Default::default() }
    }
}

/// Semantic graph query: `{type, pattern}` matched against concept
/// name/label, with `|` alternation (e.g. `"Frontend|Backend"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticQuery {
    /// "concept" (default) — reserved for future match kinds.
    #[serde(rename = "type", default)]
    pub query_type: String,
    /// Name pattern; `|`-separated alternatives, case-insensitive.
    /// An empty (or all-whitespace) pattern matches nothing.
    pub pattern: String,
    /// Optional concept-type filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_type: Option<String>,
}

impl SemanticQuery {
    pub fn concept(pattern: &str) -> Self {
        Self {
            query_type: "concept".to_string(),
            pattern: pattern.to_string(),
            concept_type: None,
        }
    }
}

/// A matched concept with its one-hop neighborhood. Each neighbor also
/// carries its own direct neighbors so callers can detect two-hop and
/// bidirectional patterns without a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMatch {
    pub concept: ConceptNode,
    pub neighbors: Vec<NeighborMatch>,
}

/// One outgoing edge from a matched concept, the neighbor it reaches, and
/// that neighbor's own outgoing edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborMatch {
    pub edge: ConceptEdge,
    pub concept: ConceptNode,
    pub second_hop: Vec<(ConceptEdge, ConceptNode)>,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 6: Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Centralized configuration for the memory engine. Every tunable lives
/// here with a documented default — the engine hardcodes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// One unconsolidated memory at/above this importance triggers
    /// consolidation (spec default 0.8).
    pub high_priority_threshold: f32,
    /// Unconsolidated backlog size above which consolidation triggers.
    pub batch_threshold: usize,
    /// Max candidates per consolidation pass.
    pub candidate_batch_size: usize,
    /// Fallback domain when a write carries no explicit domain scope.
    pub default_domain: String,
    /// Default episodic search result cap.
    pub search_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            high_priority_threshold: DEFAULT_HIGH_PRIORITY_THRESHOLD,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            candidate_batch_size: DEFAULT_CANDIDATE_BATCH_SIZE,
            default_domain: DEFAULT_DOMAIN.to_string(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 7: Consolidation State & Reports
// ═══════════════════════════════════════════════════════════════════════════

/// Per-domain consolidation state machine:
/// IDLE → SHOULD_CONSOLIDATE → CONSOLIDATING → IDLE.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsolidationPhase {
    Idle,
    ShouldConsolidate,
    Consolidating,
}

impl Default for ConsolidationPhase {
    fn default() -> Self {
        ConsolidationPhase::Idle
    }
}

/// Summary of a single consolidation pass.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub candidates_found: usize,
    pub candidates_consolidated: usize,
    /// Candidates skipped because they were already marked consolidated.
    pub already_consolidated: usize,
    pub concepts_upserted: usize,
    pub relationships_created: usize,
}

/// Receipt returned by `store_experience` — the new record's id plus the
/// fast-path consolidation signal evaluated immediately after the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreReceipt {
    pub id: String,
    pub should_consolidate: bool,
}

/// Health metrics across both layers.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub episodic_total: usize,
    pub episodic_unconsolidated: usize,
    pub concept_count: usize,
    pub relationship_count: usize,
    pub belief_count: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
