// ── Engram Engine: Memory System Façade ────────────────────────────────────
//
// The single public entry point wiring the two layers and the
// consolidation manager together. Upstream callers (agent loops, command
// handlers) talk to this type only; the layers stay composable for tests.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use crate::atoms::error::MemoryResult;
use crate::atoms::types::{
    Belief, ConsolidationPhase, ConsolidationReport, CrossDomainRequest, DomainContext,
    EpisodicQuery, GraphMatch, Memory, MemoryConfig, MemoryDraft, MemoryStats, SemanticQuery,
    StoreReceipt,
};
use crate::backend::{GraphBackend, MemoryGraph, MemoryVectorIndex, VectorBackend};
use crate::engine::consolidation::ConsolidationManager;
use crate::engine::episodic::EpisodicLayer;
use crate::engine::semantic::SemanticLayer;

/// Two-layer memory system: episodic store + semantic knowledge graph,
/// bridged by domain-scoped consolidation.
pub struct MemorySystem {
    episodic: Arc<EpisodicLayer>,
    semantic: Arc<SemanticLayer>,
    consolidation: ConsolidationManager,
    config: Arc<MemoryConfig>,
}

impl MemorySystem {
    pub fn new(
        vector: Arc<dyn VectorBackend>,
        graph: Arc<dyn GraphBackend>,
        config: MemoryConfig,
    ) -> Self {
        let config = Arc::new(config);
        let episodic = Arc::new(EpisodicLayer::new(vector, config.clone()));
        let semantic = Arc::new(SemanticLayer::new(graph));
        let consolidation =
            ConsolidationManager::new(episodic.clone(), semantic.clone(), config.clone());
        info!(
            "[engram:system] Memory system up (default domain {:?})",
            config.default_domain
        );
        Self { episodic, semantic, consolidation, config }
    }

    /// Fully in-process system over the reference backends.
    pub fn in_memory(config: MemoryConfig) -> Self {
        Self::new(
            Arc::new(MemoryVectorIndex::new()),
            Arc::new(MemoryGraph::new()),
            config,
        )
    }

    // ── Episodic surface ───────────────────────────────────────────────────

    /// Store an experience and evaluate the consolidation trigger.
    ///
    /// The trigger result is advisory: the caller decides when to actually
    /// run `consolidate_memories` (typically from a background task).
    pub async fn store_experience(&self, draft: MemoryDraft) -> MemoryResult<StoreReceipt> {
        let memory = self.episodic.store_memory(draft).await?;
        let should_consolidate = self.consolidation.should_consolidate().await?;
        let domain = memory.domain().unwrap_or(&self.config.default_domain);
        self.consolidation.note_trigger(domain, should_consolidate);
        Ok(StoreReceipt { id: memory.id, should_consolidate })
    }

    /// Strict JSON boundary for `store_experience`: unknown fields in the
    /// payload fail closed instead of being dropped.
    pub async fn store_experience_value(
        &self,
        value: serde_json::Value,
    ) -> MemoryResult<StoreReceipt> {
        let draft: MemoryDraft = serde_json::from_value(value)?;
        self.store_experience(draft).await
    }

    pub async fn get_memory(&self, id: &str) -> MemoryResult<Option<Memory>> {
        self.episodic.get_memory(id).await
    }

    pub async fn query_episodic(&self, query: &EpisodicQuery) -> MemoryResult<Vec<Memory>> {
        self.episodic.search(query).await
    }

    // ── Semantic surface ───────────────────────────────────────────────────

    pub async fn query_semantic(&self, query: &SemanticQuery) -> MemoryResult<Vec<GraphMatch>> {
        self.semantic.query(query).await
    }

    /// Store a belief triple directly (bypasses the episodic layer).
    /// The home domain comes from `context["domain"]` when present,
    /// falling back to the configured default. Foreign domains in
    /// `domains` require an approved `cross_domain` request, the same
    /// transport the memory path carries in `metadata["cross_domain"]`.
    #[allow(clippy::too_many_arguments)]
    pub async fn store_belief(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        confidence: f32,
        domains: Vec<String>,
        context: HashMap<String, String>,
        source: &str,
        cross_domain: Option<CrossDomainRequest>,
    ) -> MemoryResult<Belief> {
        let home = context
            .get(crate::atoms::constants::CONTEXT_DOMAIN_KEY)
            .cloned()
            .unwrap_or_else(|| self.config.default_domain.clone());
        let mut ctx = DomainContext::new(&home);
        if let Some(request) = cross_domain {
            ctx.validation.cross_domain = request;
        }
        self.semantic
            .create_belief(subject, predicate, object, confidence, domains, context, source, &ctx)
            .await
    }

    // ── Consolidation surface ──────────────────────────────────────────────

    /// Run a consolidation pass over all pending candidates.
    pub async fn consolidate_memories(&self) -> MemoryResult<ConsolidationReport> {
        self.consolidation.consolidate().await
    }

    pub async fn should_consolidate(&self) -> MemoryResult<bool> {
        self.consolidation.should_consolidate().await
    }

    pub fn consolidation_phase(&self, domain: &str) -> ConsolidationPhase {
        self.consolidation.phase(domain)
    }

    // ── Health ─────────────────────────────────────────────────────────────

    pub async fn stats(&self) -> MemoryResult<MemoryStats> {
        let (episodic_total, episodic_unconsolidated) = self.episodic.count().await?;
        Ok(MemoryStats {
            episodic_total,
            episodic_unconsolidated,
            concept_count: self.semantic.count_concepts().await?,
            relationship_count: self.semantic.count_relationships().await?,
            belief_count: self.semantic.count_beliefs().await?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::error::MemoryError;
    use crate::atoms::types::{Concept, Relationship};

    fn system() -> MemorySystem {
        MemorySystem::in_memory(MemoryConfig::default())
    }

    fn draft(content: &str, importance: f32) -> MemoryDraft {
        let mut d = MemoryDraft::new(content, "professional", "test");
        d.importance = importance;
        d
    }

    #[tokio::test]
    async fn test_store_receipt_signals_high_priority() {
        let system = system();
        let quiet = system.store_experience(draft("routine note", 0.2)).await.unwrap();
        assert!(!quiet.should_consolidate);
        assert_eq!(
            system.consolidation_phase("professional"),
            ConsolidationPhase::Idle
        );

        let urgent = system.store_experience(draft("incident", 0.95)).await.unwrap();
        assert!(urgent.should_consolidate);
        assert_eq!(
            system.consolidation_phase("professional"),
            ConsolidationPhase::ShouldConsolidate
        );
    }

    #[tokio::test]
    async fn test_json_boundary_rejects_unknown_fields() {
        let system = system();
        let result = system
            .store_experience_value(serde_json::json!({
                "content": "x",
                "context": {"domain": "professional", "source": "test"},
                "priority": "urgent"
            }))
            .await;
        assert!(matches!(result, Err(MemoryError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_consolidation_and_query() {
        let system = system();
        let mut d = draft("The frontend service calls the backend API", 0.9);
        d.concepts = vec![
            Concept::new("Frontend", "entity", "web UI"),
            Concept::new("Backend", "entity", "API service"),
        ];
        d.relationships =
            vec![Relationship::new("Frontend", "Backend", "related_to").bidirectional()];
        let receipt = system.store_experience(d).await.unwrap();
        assert!(receipt.should_consolidate);

        let report = system.consolidate_memories().await.unwrap();
        assert_eq!(report.candidates_consolidated, 1);
        assert_eq!(report.relationships_created, 2);

        // Discoverable from both endpoints.
        for name in ["Frontend", "Backend"] {
            let matches = system
                .query_semantic(&SemanticQuery::concept(name))
                .await
                .unwrap();
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].neighbors.len(), 1);
        }

        // Episodic record survives consolidation, now marked.
        let memory = system.get_memory(&receipt.id).await.unwrap().unwrap();
        assert!(memory.consolidated);

        let stats = system.stats().await.unwrap();
        assert_eq!(stats.episodic_total, 1);
        assert_eq!(stats.episodic_unconsolidated, 0);
        assert_eq!(stats.concept_count, 2);
        assert_eq!(stats.relationship_count, 2);
    }

    #[tokio::test]
    async fn test_store_belief_defaults_domain() {
        let system = system();
        let belief = system
            .store_belief(
                "sky", "has_color", "blue", 0.9, vec![], HashMap::new(), "observation", None,
            )
            .await
            .unwrap();
        assert_eq!(belief.domains, vec!["professional".to_string()]);
        assert_eq!(system.stats().await.unwrap().belief_count, 1);
    }

    #[tokio::test]
    async fn test_store_belief_cross_domain_requires_approval() {
        let system = system();
        let domains = vec!["professional".to_string(), "personal".to_string()];

        let denied = system
            .store_belief(
                "Alice", "works_with", "Bob", 0.9, domains.clone(), HashMap::new(), "chat", None,
            )
            .await;
        assert!(matches!(denied, Err(MemoryError::CrossDomainDenied { .. })));

        let approval = CrossDomainRequest {
            approved: true,
            requested: true,
            ..Default::default()
        };
        let belief = system
            .store_belief(
                "Alice",
                "works_with",
                "Bob",
                0.9,
                domains.clone(),
                HashMap::new(),
                "chat",
                Some(approval),
            )
            .await
            .unwrap();
        assert_eq!(belief.domains, domains);
        assert_eq!(system.stats().await.unwrap().belief_count, 1);
    }

    #[tokio::test]
    async fn test_episodic_retrieval_through_facade() {
        let system = system();
        system.store_experience(draft("sprint planning meeting", 0.3)).await.unwrap();
        system.store_experience(draft("coffee break chat", 0.1)).await.unwrap();
        let results = system
            .query_episodic(&EpisodicQuery::text("sprint planning"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("sprint"));
    }
}
