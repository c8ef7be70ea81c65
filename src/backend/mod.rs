// ── Engram Backend Layer ───────────────────────────────────────────────────
//
// Pluggable storage seam. The engine never talks to a concrete store —
// every layer receives its backend handle explicitly at construction
// (no module-level singletons).
//
//   VectorBackend — the episodic side: a vector-indexed record store
//                   (e.g. Qdrant, pgvector, or the in-memory reference).
//   GraphBackend  — the semantic side: a property-graph store
//                   (e.g. Neo4j, or the in-memory reference).
//
// All operations are async: suspension occurs at every backend call so a
// single-threaded caller is never blocked. Backend failures surface as
// `MemoryError::Backend` and propagate — no internal retry.

pub mod mem;

use async_trait::async_trait;

use crate::atoms::error::MemoryResult;
use crate::atoms::types::{
    Belief, ConceptEdge, ConceptNode, ConceptRef, EpisodicQuery, GraphMatch, Memory,
    SemanticQuery,
};

pub use mem::{MemoryGraph, MemoryVectorIndex};

// ═══════════════════════════════════════════════════════════════════════════
// Traits
// ═══════════════════════════════════════════════════════════════════════════

/// Vector-indexed episodic record store.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, memory: Memory) -> MemoryResult<()>;

    /// Fetch a record by id.
    async fn fetch(&self, id: &str) -> MemoryResult<Option<Memory>>;

    /// Replace an existing record (keyed by id). `NotFound` if absent.
    async fn update(&self, memory: Memory) -> MemoryResult<()>;

    /// Search records. With `query.text`, results are similarity-ranked;
    /// without, this is a filtered scan in insertion order.
    /// `default_limit` applies when the query carries no limit.
    async fn search(&self, query: &EpisodicQuery, default_limit: usize)
        -> MemoryResult<Vec<Memory>>;

    /// Unconsolidated records, importance descending (ties: oldest first).
    async fn scan_unconsolidated(&self, limit: usize) -> MemoryResult<Vec<Memory>>;

    /// `(total, unconsolidated)` record counts.
    async fn count(&self) -> MemoryResult<(usize, usize)>;
}

/// Property-graph store for concepts, relationships, and beliefs.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// MERGE-by-name: insert the node, or overwrite an existing node's
    /// mutable properties (type, description, is_consolidation).
    async fn merge_concept(&self, node: ConceptNode) -> MemoryResult<ConceptRef>;

    /// Fetch a concept node by name.
    async fn get_concept(&self, name: &str) -> MemoryResult<Option<ConceptNode>>;

    /// Create a batch of edges atomically. Missing endpoint concepts are
    /// auto-created as `pending` placeholders; an existing (from, to, type)
    /// edge is updated in place rather than duplicated.
    async fn add_edges(&self, edges: Vec<ConceptEdge>) -> MemoryResult<()>;

    /// Append a belief record.
    async fn add_belief(&self, belief: Belief) -> MemoryResult<()>;

    /// Match concepts by pattern/type and return each match with its
    /// one-hop neighborhood (and each neighbor's own neighbors).
    async fn match_concepts(&self, query: &SemanticQuery) -> MemoryResult<Vec<GraphMatch>>;

    /// Total concept node count.
    async fn count_concepts(&self) -> MemoryResult<usize>;

    /// Total edge count.
    async fn count_edges(&self) -> MemoryResult<usize>;

    /// Total belief count.
    async fn count_beliefs(&self) -> MemoryResult<usize>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Filter Matching
// ═══════════════════════════════════════════════════════════════════════════

/// Does `memory` satisfy `filter`?
///
/// Filter semantics: exact match on top-level fields, plus one level of
/// nested-map match (`{"context": {"project": "A"}}` matches records whose
/// `context.project == "A"`). A filter key with unsupported nesting is a
/// non-match, not an error. Non-object filters match nothing.
pub fn filter_matches(memory: &Memory, filter: &serde_json::Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return false;
    };

    // Compare against the record's serialized form so filters address the
    // same field names the wire format uses.
    let record = match serde_json::to_value(memory) {
        Ok(v) => v,
        Err(_) => return false,
    };

    for (key, expected) in conditions {
        let Some(actual) = record.get(key) else {
            return false;
        };
        match expected {
            serde_json::Value::Object(nested) => {
                // One level of nesting: every nested key must match exactly.
                let Some(actual_map) = actual.as_object() else {
                    return false;
                };
                for (nested_key, nested_expected) in nested {
                    if nested_expected.is_object() || nested_expected.is_array() {
                        // Deeper nesting is unsupported — non-match.
                        return false;
                    }
                    if actual_map.get(nested_key) != Some(nested_expected) {
                        return false;
                    }
                }
            }
            _ => {
                if actual != expected {
                    return false;
                }
            }
        }
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{now_iso, MemoryType};
    use std::collections::HashMap;

    fn make_memory(project: &str) -> Memory {
        Memory {
            id: "m1".into(),
            content: "meeting notes".into(),
            memory_type: MemoryType::Episodic,
            timestamp: now_iso(),
            importance: 0.5,
            context: HashMap::from([
                ("domain".to_string(), "professional".to_string()),
                ("source".to_string(), "calendar".to_string()),
                ("project".to_string(), project.to_string()),
            ]),
            concepts: vec![],
            relationships: vec![],
            participants: vec!["Alice".into()],
            metadata: HashMap::new(),
            consolidated: false,
        }
    }

    #[test]
    fn test_filter_top_level_exact() {
        let mem = make_memory("A");
        assert!(filter_matches(&mem, &serde_json::json!({"id": "m1"})));
        assert!(!filter_matches(&mem, &serde_json::json!({"id": "m2"})));
        assert!(filter_matches(&mem, &serde_json::json!({"consolidated": false})));
    }

    #[test]
    fn test_filter_nested_one_level() {
        let mem = make_memory("A");
        assert!(filter_matches(&mem, &serde_json::json!({"context": {"project": "A"}})));
        assert!(!filter_matches(&mem, &serde_json::json!({"context": {"project": "B"}})));
    }

    #[test]
    fn test_filter_unsupported_nesting_is_non_match() {
        let mem = make_memory("A");
        let filter = serde_json::json!({"context": {"project": {"name": "A"}}});
        assert!(!filter_matches(&mem, &filter));
    }

    #[test]
    fn test_filter_missing_key_is_non_match() {
        let mem = make_memory("A");
        assert!(!filter_matches(&mem, &serde_json::json!({"nonexistent": 1})));
        assert!(!filter_matches(&mem, &serde_json::json!({"context": {"missing": "x"}})));
    }

    #[test]
    fn test_filter_non_object_matches_nothing() {
        let mem = make_memory("A");
        assert!(!filter_matches(&mem, &serde_json::json!("context")));
    }
}
