// ── Engram Engine: Validation & Domain Policy ──────────────────────────────
//
// Pure, synchronous, side-effect-free checks invoked at every mutation
// boundary of the layers — not only at the façade. A failure here is a
// caller-visible hard error; nothing is logged-and-defaulted away.
//
// The cross-domain rule lives in ONE policy function (`authorize_domains`)
// so no call site re-implements domain checks.

use std::collections::HashMap;

use crate::atoms::constants::{
    CONCEPT_TYPES, CONTEXT_DOMAIN_KEY, CONTEXT_SOURCE_KEY, RELATIONSHIP_TYPES,
};
use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::{Concept, DomainContext, Relationship, ValidationSchema};

// ── Confidence ─────────────────────────────────────────────────────────────

/// Every confidence-like value must lie in [0.0, 1.0].
pub fn validate_confidence(field: &str, value: f32) -> MemoryResult<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(MemoryError::confidence(field, value));
    }
    Ok(())
}

// ── Context ────────────────────────────────────────────────────────────────

/// A memory context must carry `domain` and `source`.
pub fn validate_context(context: &HashMap<String, String>) -> MemoryResult<()> {
    for key in [CONTEXT_DOMAIN_KEY, CONTEXT_SOURCE_KEY] {
        match context.get(key) {
            Some(value) if !value.is_empty() => {}
            _ => return Err(MemoryError::MissingContextField(key.to_string())),
        }
    }
    Ok(())
}

// ── Concepts ───────────────────────────────────────────────────────────────

/// Type membership in the closed taxonomy plus confidence bounds.
/// The internal `pending` placeholder type is not accepted from callers.
pub fn validate_concept(concept: &Concept) -> MemoryResult<()> {
    if !CONCEPT_TYPES.contains(&concept.concept_type.as_str()) {
        return Err(MemoryError::InvalidConceptType(concept.concept_type.clone()));
    }
    validate_confidence(&format!("concept {:?}", concept.name), concept.confidence)
}

// ── Relationships ──────────────────────────────────────────────────────────

/// Validate a relationship against the governing domain context.
///
/// Checks type membership and confidence bounds, resolves the effective
/// domain list (defaulting to the owning memory's domain when empty), and
/// runs the cross-domain policy. Returns the resolved domains so callers
/// persist exactly what was authorized.
pub fn validate_relationship(
    relationship: &Relationship,
    ctx: &DomainContext,
) -> MemoryResult<Vec<String>> {
    if !RELATIONSHIP_TYPES.contains(&relationship.rel_type.as_str()) {
        return Err(MemoryError::InvalidRelationshipType(relationship.rel_type.clone()));
    }
    validate_confidence(
        &format!("relationship {} → {}", relationship.source, relationship.target),
        relationship.confidence,
    )?;

    let domains = effective_domains(relationship, &ctx.primary_domain);
    authorize_domains(&domains, &ctx.primary_domain, &ctx.validation)?;
    Ok(domains)
}

/// The domain list a relationship actually applies to: its own `domains`,
/// or the owning memory's domain when it declares none.
pub fn effective_domains(relationship: &Relationship, home_domain: &str) -> Vec<String> {
    if relationship.domains.is_empty() {
        vec![home_domain.to_string()]
    } else {
        relationship.domains.clone()
    }
}

// ── Cross-domain policy ────────────────────────────────────────────────────

/// THE domain-boundary rule, invoked at every semantic-layer mutation.
///
/// A write scoped entirely to the home domain is always allowed. Any
/// requested domain outside the home domain requires an approved
/// cross-domain request on the governing schema.
pub fn authorize_domains(
    requested: &[String],
    home_domain: &str,
    schema: &ValidationSchema,
) -> MemoryResult<()> {
    let foreign = requested.iter().find(|d| d.as_str() != home_domain);
    if let Some(foreign) = foreign {
        if !schema.cross_domain.approved {
            return Err(MemoryError::CrossDomainDenied {
                home: home_domain.to_string(),
                requested: foreign.clone(),
            });
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::constants::PENDING_CONCEPT_TYPE;

    #[test]
    fn test_confidence_bounds() {
        assert!(validate_confidence("x", 0.0).is_ok());
        assert!(validate_confidence("x", 1.0).is_ok());
        assert!(validate_confidence("x", 0.5).is_ok());
        assert!(matches!(
            validate_confidence("x", -0.1),
            Err(MemoryError::InvalidConfidence { .. })
        ));
        assert!(validate_confidence("x", 1.1).is_err());
        assert!(validate_confidence("x", f32::NAN).is_err());
    }

    #[test]
    fn test_context_requires_domain_and_source() {
        let mut ctx = HashMap::new();
        assert!(matches!(
            validate_context(&ctx),
            Err(MemoryError::MissingContextField(_))
        ));
        ctx.insert("domain".to_string(), "professional".to_string());
        assert!(validate_context(&ctx).is_err());
        ctx.insert("source".to_string(), "chat".to_string());
        assert!(validate_context(&ctx).is_ok());
    }

    #[test]
    fn test_concept_taxonomy() {
        for t in ["entity", "action", "property", "event", "abstract"] {
            assert!(validate_concept(&Concept::new("X", t, "")).is_ok());
        }
        assert!(matches!(
            validate_concept(&Concept::new("X", "gadget", "")),
            Err(MemoryError::InvalidConceptType(_))
        ));
        // The placeholder type is internal only.
        assert!(validate_concept(&Concept::new("X", PENDING_CONCEPT_TYPE, "")).is_err());
    }

    #[test]
    fn test_concept_confidence() {
        let mut c = Concept::new("X", "entity", "");
        c.confidence = 1.5;
        assert!(matches!(
            validate_concept(&c),
            Err(MemoryError::InvalidConfidence { .. })
        ));
    }

    #[test]
    fn test_relationship_taxonomy() {
        let ctx = DomainContext::new("professional");
        for t in [
            "is_a", "has_a", "part_of", "related_to", "causes", "implies", "precedes",
            "similar_to",
        ] {
            assert!(validate_relationship(&Relationship::new("A", "B", t), &ctx).is_ok());
        }
        assert!(matches!(
            validate_relationship(&Relationship::new("A", "B", "knows"), &ctx),
            Err(MemoryError::InvalidRelationshipType(_))
        ));
    }

    #[test]
    fn test_relationship_domain_defaulting() {
        let ctx = DomainContext::new("personal");
        let rel = Relationship::new("A", "B", "related_to");
        let domains = validate_relationship(&rel, &ctx).unwrap();
        assert_eq!(domains, vec!["personal".to_string()]);
    }

    #[test]
    fn test_cross_domain_denied_without_approval() {
        let ctx = DomainContext::new("professional");
        let mut rel = Relationship::new("A", "B", "related_to");
        rel.domains = vec!["professional".to_string(), "personal".to_string()];
        assert!(matches!(
            validate_relationship(&rel, &ctx),
            Err(MemoryError::CrossDomainDenied { .. })
        ));
    }

    #[test]
    fn test_cross_domain_allowed_with_approval() {
        let ctx = DomainContext::new("professional")
            .with_cross_domain_approval("personal", "user linked accounts");
        let mut rel = Relationship::new("A", "B", "related_to");
        rel.domains = vec!["professional".to_string(), "personal".to_string()];
        let domains = validate_relationship(&rel, &ctx).unwrap();
        assert_eq!(domains.len(), 2);
    }

    #[test]
    fn test_home_domain_always_allowed() {
        let schema = ValidationSchema::default();
        assert!(authorize_domains(
            &["professional".to_string()],
            "professional",
            &schema
        )
        .is_ok());
    }
}
