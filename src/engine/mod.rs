// Engram Memory Engine — Two-layer agent memory
// Episodic experience store + semantic knowledge graph, bridged by
// domain-scoped consolidation.

pub mod validation;
pub mod episodic;
pub mod semantic;
pub mod consolidation;
pub mod system;

pub use consolidation::ConsolidationManager;
pub use episodic::EpisodicLayer;
pub use semantic::SemanticLayer;
pub use system::MemorySystem;
