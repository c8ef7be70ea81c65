// ── Engram Engine: Episodic Layer ──────────────────────────────────────────
//
// Thin wrapper over the vector-indexed backend. Stores and retrieves raw,
// timestamped experience records — the raw material consolidation later
// distills into the semantic graph.
//
// Responsibilities:
//   - Canonicalize upstream drafts into `Memory` records (id, timestamp,
//     collection defaults, relationship domain defaulting)
//   - Validate at the mutation boundary (context, concepts, relationships)
//   - Similarity search / filtered scan
//   - Consolidation candidate selection (importance-ordered)
//   - Idempotent consolidation marking

use std::sync::Arc;

use log::{debug, info};

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::{
    now_iso, DomainContext, EpisodicQuery, Memory, MemoryConfig, MemoryDraft,
};
use crate::backend::VectorBackend;
use crate::engine::validation::{
    effective_domains, validate_concept, validate_confidence, validate_context,
    validate_relationship,
};

/// Episodic record store. Cheap to clone; the backend handle is shared.
#[derive(Clone)]
pub struct EpisodicLayer {
    backend: Arc<dyn VectorBackend>,
    config: Arc<MemoryConfig>,
}

impl EpisodicLayer {
    pub fn new(backend: Arc<dyn VectorBackend>, config: Arc<MemoryConfig>) -> Self {
        Self { backend, config }
    }

    /// Canonicalize, validate, and persist an experience record.
    ///
    /// The draft's relationships inherit the memory's domain when they
    /// declare none (so the persisted record is self-describing), and every
    /// embedded concept/relationship is validated now — invalid input never
    /// reaches the store.
    pub async fn store_memory(&self, draft: MemoryDraft) -> MemoryResult<Memory> {
        validate_context(&draft.context)?;
        validate_confidence("memory.importance", draft.importance)?;

        let mut memory = Memory {
            id: uuid::Uuid::new_v4().to_string(),
            content: draft.content,
            memory_type: draft.memory_type,
            timestamp: now_iso(),
            importance: draft.importance,
            context: draft.context,
            concepts: draft.concepts,
            relationships: draft.relationships,
            participants: draft.participants,
            metadata: draft.metadata,
            consolidated: false,
        };

        let ctx = DomainContext::for_memory(&memory, &self.config)?;
        for concept in &memory.concepts {
            validate_concept(concept)?;
        }
        for relationship in &mut memory.relationships {
            relationship.domains = effective_domains(relationship, &ctx.primary_domain);
        }
        for relationship in &memory.relationships {
            validate_relationship(relationship, &ctx)?;
        }

        self.backend.insert(memory.clone()).await?;
        info!(
            "[engram:episodic] Stored memory {} domain={} importance={:.2} concepts={} relationships={}",
            memory.id,
            ctx.primary_domain,
            memory.importance,
            memory.concepts.len(),
            memory.relationships.len()
        );
        Ok(memory)
    }

    /// Fetch a record by id.
    pub async fn get_memory(&self, id: &str) -> MemoryResult<Option<Memory>> {
        self.backend.fetch(id).await
    }

    /// Search records: similarity-ranked when the query carries text, a
    /// filtered scan otherwise (the path consolidation and exact-match
    /// callers use).
    pub async fn search(&self, query: &EpisodicQuery) -> MemoryResult<Vec<Memory>> {
        let results = self.backend.search(query, self.config.search_limit).await?;
        debug!(
            "[engram:episodic] Search text={:?} filter={} → {} results",
            query.text,
            query.filter.is_some(),
            results.len()
        );
        Ok(results)
    }

    /// Unconsolidated records, importance descending.
    pub async fn get_consolidation_candidates(&self) -> MemoryResult<Vec<Memory>> {
        self.backend
            .scan_unconsolidated(self.config.candidate_batch_size)
            .await
    }

    /// Mark a record consolidated. Idempotent: marking an
    /// already-consolidated record is a no-op.
    pub async fn mark_consolidated(&self, id: &str) -> MemoryResult<()> {
        let Some(mut memory) = self.backend.fetch(id).await? else {
            return Err(MemoryError::NotFound(id.to_string()));
        };
        if memory.consolidated {
            debug!("[engram:episodic] {} already consolidated — no-op", id);
            return Ok(());
        }
        memory.consolidated = true;
        self.backend.update(memory).await
    }

    /// `(total, unconsolidated)` record counts.
    pub async fn count(&self) -> MemoryResult<(usize, usize)> {
        self.backend.count().await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
