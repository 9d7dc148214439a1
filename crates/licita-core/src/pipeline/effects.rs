//! Conversions from stage outputs to storage writes.

use crate::persistence::{
    CertificationRow, DocumentPatch, ItemFeasibility, ItemRow, RequirementRow,
};
use crate::stages::fields::empty_object;
use crate::stages::{BasicData, ExtractedItem, Feasibility, ItemAnalysis, Requirements};

/// Canonical fields found by the basic-data stage. The organization link is
/// added by the caller once the organization is stored.
pub fn basic_data_patch(data: &BasicData) -> DocumentPatch {
    DocumentPatch {
        notice_number: data.notice_number.clone(),
        process_number: data.process_number.clone(),
        modality: data.modality.clone(),
        object: data.object.clone(),
        estimated_value: data.estimated_value,
        proposal_opening: data.opening_date.clone(),
        closing_date: data.closing_date.clone(),
        execution_days: data.execution_days,
        delivery_address: data.delivery_address.clone(),
        delivery_municipality: data.delivery_municipality.clone(),
        delivery_state: data.delivery_state.clone(),
        payment_terms: data.payment_terms.clone(),
        judgment_criterion: data.judgment_criterion.clone(),
        ..Default::default()
    }
}

pub fn item_row(item: &ExtractedItem) -> ItemRow {
    ItemRow {
        item_number: item.item_number.clone().unwrap_or_else(|| "N/A".to_string()),
        lot_number: item.lot_number.clone(),
        lot_name: item.lot_name.clone(),
        description: item
            .description
            .clone()
            .unwrap_or_else(|| "Sem descrição".to_string()),
        detailed_description: item.detailed_description.clone(),
        specifications: item.specifications.clone().unwrap_or_else(empty_object),
        unit: item.unit.clone(),
        quantity: item.quantity,
        unit_value: item.unit_value,
        total_value: item.total_value,
        catalog_code: item.catalog_code.clone(),
        item_kind: "material".to_string(),
        category: item.category.clone(),
        quantity_confidence: item.quantity_confidence.clone(),
    }
}

pub fn requirement_rows(requirements: &Requirements) -> Vec<RequirementRow> {
    requirements
        .requirements
        .iter()
        .map(|r| RequirementRow {
            category: r.category,
            description: r.description.clone(),
            mandatory: r.mandatory,
            difficulty: r.difficulty,
            note: r.note.clone(),
            deadline: r.deadline.clone(),
        })
        .collect()
}

pub fn certification_rows(requirements: &Requirements) -> Vec<CertificationRow> {
    requirements
        .certifications
        .iter()
        .map(|c| CertificationRow {
            name: c.name.clone(),
            kind: c.kind.clone(),
            standard: c.standard.clone(),
            description: c.description.clone(),
            mandatory: c.mandatory,
            applies_to: c.applies_to.clone(),
        })
        .collect()
}

pub fn feasibility_patch(feasibility: &Feasibility) -> DocumentPatch {
    DocumentPatch {
        feasibility_score: feasibility.score,
        feasibility_verdict: feasibility.verdict.clone(),
        ..Default::default()
    }
}

pub fn item_feasibility(analysis: &ItemAnalysis) -> ItemFeasibility {
    ItemFeasibility {
        can_produce: analysis.can_produce,
        score: analysis.score,
        justification: analysis.justification.clone(),
        restrictions: analysis.restrictions.clone(),
    }
}
