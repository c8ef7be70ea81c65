// ── Engram ─────────────────────────────────────────────────────────────────
//
// Two-layer memory engine for AI agents: an episodic store of raw
// timestamped experience, a semantic knowledge graph of distilled
// concepts/relationships/beliefs, and a consolidation pipeline promoting
// one into the other under per-domain isolation rules.
//
// Layering:
//   atoms/    — constants, error type, data model (no internal deps)
//   backend/  — storage traits + in-process reference backends
//   engine/   — layers, validation/domain policy, consolidation, façade

pub mod atoms;
pub mod backend;
pub mod engine;

pub use atoms::error::{MemoryError, MemoryResult};
pub use atoms::types::{
    Belief, Concept, ConsolidationPhase, ConsolidationReport, DomainContext, EpisodicQuery,
    GraphMatch, Memory, MemoryConfig, MemoryDraft, MemoryStats, MemoryType, Relationship,
    SemanticQuery, StoreReceipt,
};
pub use backend::{GraphBackend, MemoryGraph, MemoryVectorIndex, VectorBackend};
pub use engine::MemorySystem;
