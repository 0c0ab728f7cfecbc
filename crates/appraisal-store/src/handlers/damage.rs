use std::collections::HashSet;

use appraisal_types::{DamageAssessment, DamageOp, DomainError, Part, PartsSearch};
use tracing::debug;

const SECTION: &str = "damageAssessment";

pub(crate) fn apply(
    assessment: &mut DamageAssessment,
    parts: &mut PartsSearch,
    op: &DamageOp,
) -> Result<(), DomainError> {
    match op {
        DamageOp::UpsertCenter { center } => {
            match assessment.center_mut(&center.id) {
                Some(existing) => *existing = center.clone(),
                None => assessment.centers.push(center.clone()),
            }
            debug!(center_id = %center.id, "damage center upserted");
        }
        DamageOp::RemoveCenter { id } => {
            assessment.centers.retain(|c| &c.id != id);
        }
        DamageOp::ReplaceCenters { centers } => {
            let mut seen = HashSet::new();
            if let Some(duplicate) = centers
                .iter()
                .find(|c| !c.id.is_empty() && !seen.insert(c.id.as_str()))
            {
                return Err(DomainError::InvalidPayload {
                    section: SECTION.to_string(),
                    reason: format!("duplicate damage center id `{}`", duplicate.id),
                });
            }
            assessment.centers = centers.clone();
        }
        DamageOp::ImportPart { center_id, part_id } => {
            import_part(assessment, parts, center_id, part_id)?;
        }
    }
    Ok(())
}

/// Move a search result into a center and mark it selected. Importing the
/// same part into the same center twice changes nothing.
fn import_part(
    assessment: &mut DamageAssessment,
    parts: &mut PartsSearch,
    center_id: &str,
    part_id: &str,
) -> Result<(), DomainError> {
    let Some(center) = assessment.center_mut(center_id) else {
        return Err(DomainError::InvalidPayload {
            section: SECTION.to_string(),
            reason: format!("unknown damage center `{center_id}`"),
        });
    };

    let result = if let Some(pos) = parts.unselected.iter().position(|p| p.id == part_id) {
        let result = parts.unselected.remove(pos);
        parts.selected.push(result.clone());
        result
    } else if let Some(result) = parts.selected.iter().find(|p| p.id == part_id) {
        result.clone()
    } else {
        return Err(DomainError::InvalidPayload {
            section: SECTION.to_string(),
            reason: format!("unknown part `{part_id}`"),
        });
    };

    let already_imported = center
        .parts
        .iter()
        .any(|p| p.origin_id.as_deref() == Some(part_id));
    if !already_imported {
        center.parts.push(Part {
            name: result.name,
            description: result.description,
            part_number: result.part_number,
            unit_price: result.price,
            quantity: 1.0,
            source: result.source,
            condition: result.condition,
            supplier: result.supplier,
            origin_id: Some(result.id),
        });
    }
    parts.refresh_summary();
    debug!(center_id, part_id, "part imported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use appraisal_types::{DamageCenter, PartResult};

    use super::*;

    fn fixture() -> (DamageAssessment, PartsSearch) {
        let assessment = DamageAssessment {
            centers: vec![DamageCenter {
                id: "front".into(),
                location: "front".into(),
                ..Default::default()
            }],
        };
        let parts = PartsSearch {
            unselected: vec![PartResult {
                id: "p1".into(),
                name: "bumper".into(),
                price: 1200.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        (assessment, parts)
    }

    #[test]
    fn import_moves_part_between_lists() {
        let (mut assessment, mut parts) = fixture();
        let op = DamageOp::ImportPart {
            center_id: "front".into(),
            part_id: "p1".into(),
        };
        apply(&mut assessment, &mut parts, &op).unwrap();

        assert!(parts.is_selected("p1"));
        assert!(!parts.is_unselected("p1"));
        assert_eq!(parts.summary.selected_count, 1);
        assert_eq!(parts.summary.estimated_cost, 1200.0);
        let imported = &assessment.centers[0].parts[0];
        assert_eq!(imported.origin_id.as_deref(), Some("p1"));
        assert_eq!(imported.unit_price, 1200.0);

        apply(&mut assessment, &mut parts, &op).unwrap();
        assert_eq!(assessment.centers[0].parts.len(), 1);
        assert_eq!(parts.selected.len(), 1);
    }

    #[test]
    fn import_rejects_unknown_ids() {
        let (mut assessment, mut parts) = fixture();
        let err = apply(
            &mut assessment,
            &mut parts,
            &DamageOp::ImportPart {
                center_id: "rear".into(),
                part_id: "p1".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload { .. }));
        assert!(parts.is_unselected("p1"));

        assert!(
            apply(
                &mut assessment,
                &mut parts,
                &DamageOp::ImportPart {
                    center_id: "front".into(),
                    part_id: "nope".into(),
                },
            )
            .is_err()
        );
    }

    #[test]
    fn upsert_replaces_by_id_and_remove_is_idempotent() {
        let (mut assessment, mut parts) = fixture();
        let updated = DamageCenter {
            id: "front".into(),
            location: "front-left".into(),
            ..Default::default()
        };
        apply(
            &mut assessment,
            &mut parts,
            &DamageOp::UpsertCenter { center: updated },
        )
        .unwrap();
        assert_eq!(assessment.centers.len(), 1);
        assert_eq!(assessment.centers[0].location, "front-left");

        let remove = DamageOp::RemoveCenter { id: "front".into() };
        apply(&mut assessment, &mut parts, &remove).unwrap();
        apply(&mut assessment, &mut parts, &remove).unwrap();
        assert!(assessment.is_empty());
    }

    #[test]
    fn replace_rejects_duplicate_center_ids() {
        let (mut assessment, mut parts) = fixture();
        let center = |location: &str| DamageCenter {
            id: "rear".into(),
            location: location.into(),
            ..Default::default()
        };
        let err = apply(
            &mut assessment,
            &mut parts,
            &DamageOp::ReplaceCenters {
                centers: vec![center("rear-left"), center("rear-right")],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidPayload { ref reason, .. } if reason.contains("rear")));
        assert_eq!(assessment.centers[0].id, "front");
    }
}
