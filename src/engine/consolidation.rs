// ── Engram Engine: Consolidation Manager ───────────────────────────────────
//
// The bridge between the layers: promotes validated knowledge from the
// episodic store into the semantic graph.
//
// Pipeline per candidate:
//   1. Derive the governing domain context
//   2. Upsert ALL concepts (joined — observably complete before step 3,
//      because relationship writes may create placeholder nodes and a
//      reversed order could leave a concept permanently "pending")
//   3. Create relationships (cross-domain policy enforced per edge)
//   4. Mark the candidate consolidated (idempotent)
//
// A validation failure on any concept/relationship aborts that candidate
// and propagates — candidates already marked in the same pass stay marked,
// and the failed candidate is naturally re-attempted next pass.
//
// Concurrency: at most one pass in flight per domain (per-domain async
// mutex), because cross-candidate parallelism under MERGE-by-name is only
// safe for disjoint concept names.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use log::{info, warn};

use crate::atoms::error::MemoryResult;
use crate::atoms::types::{
    ConsolidationPhase, ConsolidationReport, DomainContext, Memory, MemoryConfig,
};
use crate::engine::episodic::EpisodicLayer;
use crate::engine::semantic::SemanticLayer;

/// Decides when to consolidate and performs the promotion.
pub struct ConsolidationManager {
    episodic: Arc<EpisodicLayer>,
    semantic: Arc<SemanticLayer>,
    config: Arc<MemoryConfig>,
    /// One async mutex per domain — holds the "one pass in flight" rule.
    domain_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Observable per-domain state machine.
    phases: parking_lot::Mutex<HashMap<String, ConsolidationPhase>>,
}

impl ConsolidationManager {
    pub fn new(
        episodic: Arc<EpisodicLayer>,
        semantic: Arc<SemanticLayer>,
        config: Arc<MemoryConfig>,
    ) -> Self {
        Self {
            episodic,
            semantic,
            config,
            domain_locks: parking_lot::Mutex::new(HashMap::new()),
            phases: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// True when any unconsolidated memory reaches the high-priority
    /// importance threshold, or the unconsolidated backlog exceeds the
    /// batch threshold.
    pub async fn should_consolidate(&self) -> MemoryResult<bool> {
        // The backlog comparison must use the uncapped count: the candidate
        // scan is capped at candidate_batch_size and would undercount any
        // backlog larger than the cap.
        let (_, unconsolidated) = self.episodic.count().await?;
        if unconsolidated > self.config.batch_threshold {
            return Ok(true);
        }
        // The scan is importance-descending, so the cap cannot hide the
        // highest-importance record.
        let candidates = self.episodic.get_consolidation_candidates().await?;
        Ok(candidates
            .iter()
            .any(|m| m.importance >= self.config.high_priority_threshold))
    }

    /// Current phase for a domain (IDLE → SHOULD_CONSOLIDATE →
    /// CONSOLIDATING → IDLE).
    pub fn phase(&self, domain: &str) -> ConsolidationPhase {
        self.phases
            .lock()
            .get(domain)
            .copied()
            .unwrap_or_default()
    }

    /// Whether a pass is currently in flight for a domain.
    pub fn is_consolidating(&self, domain: &str) -> bool {
        self.phase(domain) == ConsolidationPhase::Consolidating
    }

    /// Record the fast-path trigger evaluation after a store.
    pub(crate) fn note_trigger(&self, domain: &str, triggered: bool) {
        let mut phases = self.phases.lock();
        let entry = phases.entry(domain.to_string()).or_default();
        if *entry != ConsolidationPhase::Consolidating {
            *entry = if triggered {
                ConsolidationPhase::ShouldConsolidate
            } else {
                ConsolidationPhase::Idle
            };
        }
    }

    fn set_phase(&self, domain: &str, phase: ConsolidationPhase) {
        self.phases.lock().insert(domain.to_string(), phase);
    }

    fn domain_lock(&self, domain: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.domain_locks
            .lock()
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Run one consolidation pass over all pending candidates.
    ///
    /// Candidates are grouped by domain and each domain is processed under
    /// its own lock, serially within the domain. Errors propagate; earlier
    /// candidates keep their consolidated mark.
    pub async fn consolidate(&self) -> MemoryResult<ConsolidationReport> {
        let candidates = self.episodic.get_consolidation_candidates().await?;
        let mut report = ConsolidationReport {
            candidates_found: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }
        info!(
            "[engram:consolidation] Processing {} candidates",
            candidates.len()
        );

        // Group by domain, preserving the importance ordering within each.
        let mut by_domain: Vec<(String, Vec<Memory>)> = Vec::new();
        for candidate in candidates {
            let domain = candidate
                .domain()
                .unwrap_or(&self.config.default_domain)
                .to_string();
            match by_domain.iter_mut().find(|(d, _)| *d == domain) {
                Some((_, group)) => group.push(candidate),
                None => by_domain.push((domain, vec![candidate])),
            }
        }

        for (domain, group) in by_domain {
            let lock = self.domain_lock(&domain);
            let _guard = lock.lock().await;
            self.set_phase(&domain, ConsolidationPhase::Consolidating);

            let result = self.consolidate_domain(&group, &mut report).await;
            self.set_phase(&domain, ConsolidationPhase::Idle);
            if let Err(e) = result {
                warn!(
                    "[engram:consolidation] Pass aborted in domain {:?}: {}",
                    domain, e
                );
                return Err(e);
            }
        }

        info!(
            "[engram:consolidation] Done — {} consolidated, {} concepts, {} relationships",
            report.candidates_consolidated,
            report.concepts_upserted,
            report.relationships_created
        );
        Ok(report)
    }

    async fn consolidate_domain(
        &self,
        group: &[Memory],
        report: &mut ConsolidationReport,
    ) -> MemoryResult<()> {
        for candidate in group {
            // Re-check: a concurrent pass may have consolidated this
            // candidate between the scan and now.
            match self.episodic.get_memory(&candidate.id).await? {
                Some(current) if current.consolidated => {
                    report.already_consolidated += 1;
                    continue;
                }
                Some(_) => {}
                None => continue,
            }

            let ctx = DomainContext::for_memory(candidate, &self.config)?;

            // Concepts first — all complete before any relationship write.
            let upserts = candidate
                .concepts
                .iter()
                .map(|concept| self.semantic.upsert_concept(concept, &ctx, true));
            let refs = try_join_all(upserts).await?;
            report.concepts_upserted += refs.len();

            for relationship in &candidate.relationships {
                self.semantic.create_relationship(relationship, &ctx).await?;
                report.relationships_created +=
                    if relationship.bidirectional { 2 } else { 1 };
            }

            self.episodic.mark_consolidated(&candidate.id).await?;
            report.candidates_consolidated += 1;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
