// ── Engram Backend: In-Memory Reference Stores ─────────────────────────────
//
// Single-process implementations of the backend traits, used by tests and
// embedded deployments. In a multi-process deployment these are replaced
// by an external vector service and graph service; the trait surface is
// designed so that swap is invisible to the engine.
//
// Thread-safe: all internal state is behind parking_lot::RwLock.
// Clone is cheap (Arc clones).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::atoms::constants::PENDING_CONCEPT_TYPE;
use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::{
    Belief, ConceptEdge, ConceptNode, ConceptRef, EpisodicQuery, GraphMatch, Memory,
    NeighborMatch, SemanticQuery,
};
use crate::backend::{filter_matches, GraphBackend, VectorBackend};

// ═══════════════════════════════════════════════════════════════════════════
// Vector Index
// ═══════════════════════════════════════════════════════════════════════════

/// In-memory episodic record store with token-overlap similarity ranking
/// standing in for a real vector index.
#[derive(Clone, Default)]
pub struct MemoryVectorIndex {
    records: Arc<RwLock<Vec<Memory>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Token-overlap similarity between query and content (Jaccard over
/// lowercase word sets). Stand-in for embedding cosine similarity.
fn text_overlap(query: &str, content: &str) -> f32 {
    let q: std::collections::HashSet<String> =
        query.split_whitespace().map(str::to_lowercase).collect();
    let c: std::collections::HashSet<String> =
        content.split_whitespace().map(str::to_lowercase).collect();
    if q.is_empty() || c.is_empty() {
        return 0.0;
    }
    let intersection = q.intersection(&c).count() as f32;
    let union = q.union(&c).count() as f32;
    intersection / union
}

#[async_trait]
impl VectorBackend for MemoryVectorIndex {
    async fn insert(&self, memory: Memory) -> MemoryResult<()> {
        self.records.write().push(memory);
        Ok(())
    }

    async fn fetch(&self, id: &str) -> MemoryResult<Option<Memory>> {
        Ok(self.records.read().iter().find(|m| m.id == id).cloned())
    }

    async fn update(&self, memory: Memory) -> MemoryResult<()> {
        let mut records = self.records.write();
        match records.iter_mut().find(|m| m.id == memory.id) {
            Some(slot) => {
                *slot = memory;
                Ok(())
            }
            None => Err(MemoryError::NotFound(memory.id)),
        }
    }

    async fn search(
        &self,
        query: &EpisodicQuery,
        default_limit: usize,
    ) -> MemoryResult<Vec<Memory>> {
        let records = self.records.read();
        let limit = query.limit.unwrap_or(default_limit);

        let filtered = records
            .iter()
            .filter(|m| match &query.filter {
                Some(f) => filter_matches(m, f),
                None => true,
            })
            .cloned();

        let results = match &query.text {
            Some(text) => {
                // Similarity-ranked path
                let mut scored: Vec<(f32, Memory)> = filtered
                    .map(|m| (text_overlap(text, &m.content), m))
                    .filter(|(score, _)| *score > 0.0)
                    .filter(|(score, _)| {
                        query.score_threshold.map(|t| *score >= t).unwrap_or(true)
                    })
                    .collect();
                scored.sort_by(|a, b| {
                    b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
                });
                scored.into_iter().map(|(_, m)| m).take(limit).collect()
            }
            // Filtered full scan, insertion order
            None => filtered.take(limit).collect(),
        };

        Ok(results)
    }

    async fn scan_unconsolidated(&self, limit: usize) -> MemoryResult<Vec<Memory>> {
        let records = self.records.read();
        let mut pending: Vec<Memory> =
            records.iter().filter(|m| !m.consolidated).cloned().collect();
        // Importance descending; equal importance resolves oldest-first.
        pending.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn count(&self) -> MemoryResult<(usize, usize)> {
        let records = self.records.read();
        let unconsolidated = records.iter().filter(|m| !m.consolidated).count();
        Ok((records.len(), unconsolidated))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Graph Store
// ═══════════════════════════════════════════════════════════════════════════

/// Nodes live in a slab; `names` maps each concept name to its stable
/// index. Upsert mutates in place through the handle instead of aliasing
/// node objects, so MERGE-by-name cannot fork duplicates.
#[derive(Default)]
struct GraphInner {
    names: HashMap<String, usize>,
    nodes: Vec<ConceptNode>,
    edges: Vec<ConceptEdge>,
    beliefs: Vec<Belief>,
}

impl GraphInner {
    /// Index of `name`, creating a pending placeholder node if absent.
    fn ensure_node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.names.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(ConceptNode {
            name: name.to_string(),
            concept_type: PENDING_CONCEPT_TYPE.to_string(),
            description: String::new(),
            is_consolidation: false,
        });
        self.names.insert(name.to_string(), idx);
        idx
    }

    fn outgoing(&self, name: &str) -> Vec<&ConceptEdge> {
        self.edges.iter().filter(|e| e.from == name).collect()
    }
}

/// In-memory property graph for concepts, relationships, and beliefs.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    inner: Arc<RwLock<GraphInner>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphBackend for MemoryGraph {
    async fn merge_concept(&self, node: ConceptNode) -> MemoryResult<ConceptRef> {
        let mut inner = self.inner.write();
        match inner.names.get(&node.name).copied() {
            Some(idx) => {
                // Overwrite mutable properties in place; the name handle
                // stays stable.
                let slot = &mut inner.nodes[idx];
                slot.concept_type = node.concept_type;
                slot.description = node.description;
                slot.is_consolidation = node.is_consolidation;
                Ok(ConceptRef { name: slot.name.clone(), created: false })
            }
            None => {
                let name = node.name.clone();
                let idx = inner.nodes.len();
                inner.nodes.push(node);
                inner.names.insert(name.clone(), idx);
                Ok(ConceptRef { name, created: true })
            }
        }
    }

    async fn get_concept(&self, name: &str) -> MemoryResult<Option<ConceptNode>> {
        let inner = self.inner.read();
        Ok(inner.names.get(name).map(|&idx| inner.nodes[idx].clone()))
    }

    async fn add_edges(&self, edges: Vec<ConceptEdge>) -> MemoryResult<()> {
        // One write lock for the whole batch — a bidirectional pair lands
        // atomically.
        let mut inner = self.inner.write();
        for edge in edges {
            inner.ensure_node(&edge.from);
            inner.ensure_node(&edge.to);
            let existing = inner.edges.iter_mut().find(|e| {
                e.from == edge.from && e.to == edge.to && e.rel_type == edge.rel_type
            });
            match existing {
                Some(slot) => {
                    // MERGE: update properties, keep original created_at.
                    slot.confidence = edge.confidence;
                    slot.domains = edge.domains;
                    slot.bidirectional = edge.bidirectional;
                    slot.last_updated = Some(edge.created_at);
                }
                None => inner.edges.push(edge),
            }
        }
        Ok(())
    }

    async fn add_belief(&self, belief: Belief) -> MemoryResult<()> {
        self.inner.write().beliefs.push(belief);
        Ok(())
    }

    async fn match_concepts(&self, query: &SemanticQuery) -> MemoryResult<Vec<GraphMatch>> {
        let inner = self.inner.read();

        let alternatives: Vec<String> = query
            .pattern
            .split('|')
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        // No usable alternatives means no matches, not match-all.
        if alternatives.is_empty() {
            return Ok(Vec::new());
        }

        let matched: Vec<&ConceptNode> = inner
            .nodes
            .iter()
            .filter(|n| alternatives.contains(&n.name.to_lowercase()))
            .filter(|n| match &query.concept_type {
                Some(t) => n.concept_type.eq_ignore_ascii_case(t),
                None => true,
            })
            .collect();

        let mut results = Vec::with_capacity(matched.len());
        for node in matched {
            let neighbors = inner
                .outgoing(&node.name)
                .into_iter()
                .filter_map(|edge| {
                    let neighbor_idx = *inner.names.get(&edge.to)?;
                    let neighbor = &inner.nodes[neighbor_idx];
                    // Second hop: the neighbor's own direct neighbors, so
                    // callers can see bidirectional/two-hop patterns in
                    // one round trip.
                    let second_hop = inner
                        .outgoing(&neighbor.name)
                        .into_iter()
                        .filter_map(|e2| {
                            let idx = *inner.names.get(&e2.to)?;
                            Some((e2.clone(), inner.nodes[idx].clone()))
                        })
                        .collect();
                    Some(NeighborMatch {
                        edge: edge.clone(),
                        concept: neighbor.clone(),
                        second_hop,
                    })
                })
                .collect();
            results.push(GraphMatch { concept: node.clone(), neighbors });
        }
        Ok(results)
    }

    async fn count_concepts(&self) -> MemoryResult<usize> {
        Ok(self.inner.read().nodes.len())
    }

    async fn count_edges(&self) -> MemoryResult<usize> {
        Ok(self.inner.read().edges.len())
    }

    async fn count_beliefs(&self) -> MemoryResult<usize> {
        Ok(self.inner.read().beliefs.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::now_iso;

    fn node(name: &str, concept_type: &str) -> ConceptNode {
        ConceptNode {
            name: name.to_string(),
            concept_type: concept_type.to_string(),
            description: String::new(),
            is_consolidation: false,
        }
    }

    fn edge(from: &str, to: &str) -> ConceptEdge {
        ConceptEdge {
            from: from.to_string(),
            to: to.to_string(),
            rel_type: "related_to".to_string(),
            domains: vec!["professional".to_string()],
            confidence: 0.9,
            bidirectional: false,
            created_at: now_iso(),
            last_updated: None,
        }
    }

    #[test]
    fn test_text_overlap() {
        assert!(text_overlap("project alpha meeting", "meeting about project alpha") > 0.5);
        assert_eq!(text_overlap("xyz", "completely different words"), 0.0);
        assert_eq!(text_overlap("", "anything"), 0.0);
    }

    #[tokio::test]
    async fn test_merge_concept_no_duplicates() {
        let graph = MemoryGraph::new();
        let first = graph.merge_concept(node("Rust", "entity")).await.unwrap();
        assert!(first.created);
        let second = graph.merge_concept(node("Rust", "abstract")).await.unwrap();
        assert!(!second.created);
        assert_eq!(graph.count_concepts().await.unwrap(), 1);
        let stored = graph.get_concept("Rust").await.unwrap().unwrap();
        assert_eq!(stored.concept_type, "abstract");
    }

    #[tokio::test]
    async fn test_add_edges_auto_creates_placeholders() {
        let graph = MemoryGraph::new();
        graph.add_edges(vec![edge("A", "B")]).await.unwrap();
        let a = graph.get_concept("A").await.unwrap().unwrap();
        assert_eq!(a.concept_type, PENDING_CONCEPT_TYPE);
        assert_eq!(graph.count_edges().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_edges_merges_existing() {
        let graph = MemoryGraph::new();
        graph.add_edges(vec![edge("A", "B")]).await.unwrap();
        let mut updated = edge("A", "B");
        updated.confidence = 0.4;
        graph.add_edges(vec![updated]).await.unwrap();
        assert_eq!(graph.count_edges().await.unwrap(), 1, "same (from,to,type) merges");
        let matches = graph
            .match_concepts(&SemanticQuery::concept("A"))
            .await
            .unwrap();
        assert_eq!(matches[0].neighbors[0].edge.confidence, 0.4);
        assert!(matches[0].neighbors[0].edge.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_match_pattern_alternation_and_second_hop() {
        let graph = MemoryGraph::new();
        graph.merge_concept(node("A", "entity")).await.unwrap();
        graph.merge_concept(node("B", "entity")).await.unwrap();
        graph.merge_concept(node("C", "entity")).await.unwrap();
        graph.add_edges(vec![edge("A", "B"), edge("B", "C")]).await.unwrap();

        let matches = graph
            .match_concepts(&SemanticQuery::concept("a|missing"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1, "case-insensitive alternation");
        let a = &matches[0];
        assert_eq!(a.neighbors.len(), 1);
        assert_eq!(a.neighbors[0].concept.name, "B");
        assert_eq!(a.neighbors[0].second_hop.len(), 1);
        assert_eq!(a.neighbors[0].second_hop[0].1.name, "C");
    }

    #[tokio::test]
    async fn test_match_empty_pattern_matches_nothing() {
        let graph = MemoryGraph::new();
        graph.merge_concept(node("A", "entity")).await.unwrap();
        for pattern in ["", "   ", " | "] {
            let matches = graph
                .match_concepts(&SemanticQuery::concept(pattern))
                .await
                .unwrap();
            assert!(matches.is_empty(), "pattern {:?} must not match all", pattern);
        }
    }

    #[tokio::test]
    async fn test_scan_unconsolidated_ordering() {
        use crate::atoms::types::{MemoryType, Memory};
        use std::collections::HashMap;

        let index = MemoryVectorIndex::new();
        for (id, importance, ts) in [
            ("low", 0.1, "2025-01-03T00:00:00Z"),
            ("high", 0.9, "2025-01-02T00:00:00Z"),
            ("mid-b", 0.5, "2025-01-05T00:00:00Z"),
            ("mid-a", 0.5, "2025-01-04T00:00:00Z"),
        ] {
            index
                .insert(Memory {
                    id: id.to_string(),
                    content: String::new(),
                    memory_type: MemoryType::Episodic,
                    timestamp: ts.to_string(),
                    importance,
                    context: HashMap::new(),
                    concepts: vec![],
                    relationships: vec![],
                    participants: vec![],
                    metadata: HashMap::new(),
                    consolidated: false,
                })
                .await
                .unwrap();
        }
        let pending = index.scan_unconsolidated(10).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid-a", "mid-b", "low"]);
    }
}
