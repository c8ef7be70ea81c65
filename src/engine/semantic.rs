// ── Engram Engine: Semantic Layer ──────────────────────────────────────────
//
// Thin wrapper over the graph backend. Holds the distilled knowledge:
// concept nodes (MERGE-by-name), typed relationships between them, and
// belief triples stored alongside the concept graph.
//
// Every mutation validates first and runs the cross-domain policy — the
// layer trusts no caller, including the consolidation manager.

use std::sync::Arc;

use log::{debug, info};

use crate::atoms::error::MemoryResult;
use crate::atoms::types::{
    now_iso, Belief, Concept, ConceptEdge, ConceptNode, ConceptRef, DomainContext, GraphMatch,
    Relationship, SemanticQuery,
};
use crate::backend::GraphBackend;
use crate::engine::validation::{
    authorize_domains, validate_concept, validate_confidence, validate_relationship,
};

/// Semantic knowledge store. Cheap to clone; the backend handle is shared.
#[derive(Clone)]
pub struct SemanticLayer {
    backend: Arc<dyn GraphBackend>,
}

impl SemanticLayer {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self { backend }
    }

    /// MERGE-by-name concept upsert.
    ///
    /// Absent → creates the node. Present → overwrites its mutable
    /// properties, which is also how a `pending` placeholder (implicitly
    /// created by an earlier relationship write) gets upgraded to a real
    /// concept. `is_consolidation` records which pipeline wrote the node.
    pub async fn upsert_concept(
        &self,
        concept: &Concept,
        ctx: &DomainContext,
        is_consolidation: bool,
    ) -> MemoryResult<ConceptRef> {
        validate_concept(concept)?;

        // A concept carrying its own domain context is a write into that
        // domain; anything off the home domain needs approval.
        let governing = concept.domain_context.as_ref().unwrap_or(ctx);
        authorize_domains(
            &[governing.primary_domain.clone()],
            &ctx.primary_domain,
            &ctx.validation,
        )?;

        let node = ConceptNode {
            name: concept.name.clone(),
            concept_type: concept.concept_type.clone(),
            description: concept.description.clone(),
            is_consolidation,
        };
        let concept_ref = self.backend.merge_concept(node).await?;
        debug!(
            "[engram:semantic] Upserted concept {:?} ({}) created={}",
            concept_ref.name, concept.concept_type, concept_ref.created
        );
        Ok(concept_ref)
    }

    /// Create the (source → target) edge; endpoints that do not exist yet
    /// are auto-created as placeholders by the backend.
    ///
    /// A bidirectional relationship materializes two independent edges in
    /// the same atomic batch, each validated on its own and each stamped
    /// with its own created_at.
    pub async fn create_relationship(
        &self,
        relationship: &Relationship,
        ctx: &DomainContext,
    ) -> MemoryResult<()> {
        let domains = validate_relationship(relationship, ctx)?;

        let mut edges = vec![ConceptEdge {
            from: relationship.source.clone(),
            to: relationship.target.clone(),
            rel_type: relationship.rel_type.clone(),
            domains: domains.clone(),
            confidence: relationship.confidence,
            bidirectional: relationship.bidirectional,
            created_at: now_iso(),
            last_updated: None,
        }];

        if relationship.bidirectional {
            let mirrored = Relationship {
                source: relationship.target.clone(),
                target: relationship.source.clone(),
                ..relationship.clone()
            };
            let mirrored_domains = validate_relationship(&mirrored, ctx)?;
            edges.push(ConceptEdge {
                from: mirrored.source,
                to: mirrored.target,
                rel_type: relationship.rel_type.clone(),
                domains: mirrored_domains,
                confidence: relationship.confidence,
                bidirectional: true,
                created_at: now_iso(),
                last_updated: None,
            });
        }

        let edge_count = edges.len();
        self.backend.add_edges(edges).await?;
        info!(
            "[engram:semantic] Related {} → {} ({}) bidirectional={} edges={}",
            relationship.source,
            relationship.target,
            relationship.rel_type,
            relationship.bidirectional,
            edge_count
        );
        Ok(())
    }

    /// Append a belief triple. Confidence and domain authorization are
    /// checked here like any other semantic mutation.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_belief(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        confidence: f32,
        domains: Vec<String>,
        context: std::collections::HashMap<String, String>,
        source: &str,
        ctx: &DomainContext,
    ) -> MemoryResult<Belief> {
        validate_confidence(&format!("belief {:?}", subject), confidence)?;
        let domains = if domains.is_empty() {
            vec![ctx.primary_domain.clone()]
        } else {
            domains
        };
        authorize_domains(&domains, &ctx.primary_domain, &ctx.validation)?;

        let mut belief = Belief::new(subject, predicate, object, confidence);
        belief.domains = domains;
        belief.context = context;
        belief.source = source.to_string();
        self.backend.add_belief(belief.clone()).await?;
        info!(
            "[engram:semantic] Belief stored: {} {} {} (confidence {:.2})",
            subject, predicate, object, confidence
        );
        Ok(belief)
    }

    /// Pattern query over concepts with one-hop traversal (each neighbor
    /// carries its own direct neighbors).
    pub async fn query(&self, query: &SemanticQuery) -> MemoryResult<Vec<GraphMatch>> {
        self.backend.match_concepts(query).await
    }

    /// Total edge count — health/consolidation metric.
    pub async fn count_relationships(&self) -> MemoryResult<usize> {
        self.backend.count_edges().await
    }

    /// Total concept node count.
    pub async fn count_concepts(&self) -> MemoryResult<usize> {
        self.backend.count_concepts().await
    }

    /// Total belief count.
    pub async fn count_beliefs(&self) -> MemoryResult<usize> {
        self.backend.count_beliefs().await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::constants::PENDING_CONCEPT_TYPE;
    use crate::atoms::error::MemoryError;
    use crate::backend::MemoryGraph;
    use std::collections::HashMap;

    fn layer() -> SemanticLayer {
        SemanticLayer::new(Arc::new(MemoryGraph::new()))
    }

    fn ctx() -> DomainContext {
        DomainContext::new("professional")
    }

    #[tokio::test]
    async fn test_upsert_merges_by_name() {
        let layer = layer();
        let first = layer
            .upsert_concept(&Concept::new("Rust", "entity", "a language"), &ctx(), false)
            .await
            .unwrap();
        assert!(first.created);
        let second = layer
            .upsert_concept(&Concept::new("Rust", "abstract", "updated"), &ctx(), true)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(layer.count_concepts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_placeholder_upgraded_by_upsert() {
        let layer = layer();
        // Relationship first: endpoints become pending placeholders.
        layer
            .create_relationship(&Relationship::new("Frontend", "Backend", "related_to"), &ctx())
            .await
            .unwrap();
        let matches = layer.query(&SemanticQuery::concept("Frontend")).await.unwrap();
        assert_eq!(matches[0].concept.concept_type, PENDING_CONCEPT_TYPE);

        // Explicit upsert upgrades the placeholder in place.
        layer
            .upsert_concept(&Concept::new("Frontend", "entity", "the UI"), &ctx(), true)
            .await
            .unwrap();
        let matches = layer.query(&SemanticQuery::concept("Frontend")).await.unwrap();
        assert_eq!(matches[0].concept.concept_type, "entity");
        assert_eq!(layer.count_concepts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bidirectional_creates_two_edges() {
        let layer = layer();
        layer
            .create_relationship(
                &Relationship::new("A", "B", "related_to").bidirectional(),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(layer.count_relationships().await.unwrap(), 2);

        let a = layer.query(&SemanticQuery::concept("A")).await.unwrap();
        assert_eq!(a[0].neighbors.len(), 1);
        assert_eq!(a[0].neighbors[0].concept.name, "B");
        let b = layer.query(&SemanticQuery::concept("B")).await.unwrap();
        assert_eq!(b[0].neighbors.len(), 1);
        assert_eq!(b[0].neighbors[0].concept.name, "A");
    }

    #[tokio::test]
    async fn test_relationship_rejects_cross_domain() {
        let layer = layer();
        let mut rel = Relationship::new("A", "B", "related_to");
        rel.domains = vec!["personal".to_string()];
        assert!(matches!(
            layer.create_relationship(&rel, &ctx()).await,
            Err(MemoryError::CrossDomainDenied { .. })
        ));
        assert_eq!(layer.count_relationships().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_belief_confidence_bounds() {
        let layer = layer();
        let err = layer
            .create_belief("sky", "has_color", "blue", 1.2, vec![], HashMap::new(), "obs", &ctx())
            .await;
        assert!(matches!(err, Err(MemoryError::InvalidConfidence { .. })));

        let ok = layer
            .create_belief("sky", "has_color", "blue", 0.95, vec![], HashMap::new(), "obs", &ctx())
            .await
            .unwrap();
        assert_eq!(ok.domains, vec!["professional".to_string()]);
        assert_eq!(layer.count_beliefs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concept_type_filter_in_query() {
        let layer = layer();
        layer
            .upsert_concept(&Concept::new("Deploy", "action", ""), &ctx(), false)
            .await
            .unwrap();
        layer
            .upsert_concept(&Concept::new("Server", "entity", ""), &ctx(), false)
            .await
            .unwrap();
        let mut q = SemanticQuery::concept("Deploy|Server");
        q.concept_type = Some("action".to_string());
        let matches = layer.query(&q).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].concept.name, "Deploy");
    }
}
