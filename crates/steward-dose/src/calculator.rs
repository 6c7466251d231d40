//! Per-drug dose resolution.
//!
//! Order of operations for each drug:
//! 1. indication-specific dose block, falling back to the drug default;
//! 2. weight selection and numeric range computation for mg/kg doses;
//! 3. renal band override (dose and/or frequency);
//! 4. loading dose — same weight rules, renal adjustment deliberately
//!    ignored (a loading dose targets volume of distribution, not
//!    clearance);
//! 5. monitoring assembly.
//!
//! Every failure is structural; there are no silent defaults.

use tracing::{debug, warn};

use steward_contracts::case::Sex;
use steward_contracts::classification::CrclBand;
use steward_contracts::error::{StewardError, StewardResult};
use steward_contracts::recommendation::{DoseRange, DrugOrder};
use steward_kb::drug::DrugRecord;
use steward_kb::KnowledgeBase;

use crate::weight::select_weight;

/// Patient factors the calculator needs, extracted once by the engine.
#[derive(Debug, Clone, Copy)]
pub struct DoseContext {
    pub sex: Sex,
    pub weight_kg: f64,
    pub height_cm: Option<f64>,
    pub band: CrclBand,
}

/// Resolve the full order for one drug under one indication.
pub fn calculate_drug_order(
    kb: &KnowledgeBase,
    drug_id: &str,
    indication: &str,
    ctx: &DoseContext,
    rationale: &str,
) -> StewardResult<DrugOrder> {
    let drug = kb.drug(drug_id)?;

    let spec = drug
        .dose_for(indication)
        .ok_or_else(|| StewardError::NoDose {
            drug_id: drug_id.to_string(),
            indication: indication.to_string(),
        })?;

    let mut dose = spec.dose.clone();
    let mut frequency = spec.frequency.clone();
    let mut renal_adjusted = false;

    // ── Renal band override ──────────────────────────────────────────────────
    if drug.renal_adjustment.required {
        let band_adjustment = drug
            .renal_adjustment
            .by_crcl_band
            .get(&ctx.band)
            .ok_or_else(|| StewardError::RenalBandMissing {
                drug_id: drug_id.to_string(),
                band: ctx.band.to_string(),
            })?;

        if !band_adjustment.no_adjustment {
            if let Some(override_dose) = &band_adjustment.dose_override {
                dose = override_dose.clone();
                renal_adjusted = true;
            }
            if let Some(override_freq) = &band_adjustment.frequency_override {
                frequency = override_freq.clone();
                renal_adjusted = true;
            }
            if renal_adjusted {
                warn!(
                    drug_id,
                    band = %ctx.band,
                    dose = %dose,
                    frequency = %frequency,
                    "dose adjusted for renal function"
                );
            }
        }
    }

    // ── Weight-based range, from the post-adjustment dose string ─────────────
    let dose_range = per_kg_range(&dose).map(|(lo, hi)| {
        let (weight, source) =
            select_weight(ctx.sex, ctx.weight_kg, ctx.height_cm, drug.weight_policy);
        DoseRange {
            min_mg: (lo * weight).round() as u32,
            max_mg: (hi * weight).round() as u32,
            verbatim: dose.clone(),
            weight_used_kg: weight,
            weight_source: source,
        }
    });

    // ── Loading dose: same weight rules, no renal adjustment ─────────────────
    let loading_dose = spec.loading_dose.clone();
    let loading_dose_range = loading_dose.as_deref().and_then(per_kg_range).map(|(lo, hi)| {
        let (weight, source) =
            select_weight(ctx.sex, ctx.weight_kg, ctx.height_cm, drug.weight_policy);
        DoseRange {
            min_mg: (lo * weight).round() as u32,
            max_mg: (hi * weight).round() as u32,
            verbatim: spec.loading_dose.clone().expect("checked above"),
            weight_used_kg: weight,
            weight_source: source,
        }
    });

    let monitoring = assemble_monitoring(kb, drug, renal_adjusted);

    debug!(
        drug_id,
        indication,
        dose = %dose,
        frequency = %frequency,
        renal_adjusted,
        loading = loading_dose.is_some(),
        "drug order calculated"
    );

    Ok(DrugOrder {
        drug_id: drug_id.to_string(),
        drug_name: drug.display_name.clone(),
        dose,
        frequency,
        route: spec.route,
        loading_dose,
        loading_dose_range,
        dose_range,
        renal_adjusted,
        monitoring,
        rationale: rationale.to_string(),
    })
}

/// Drug-record monitoring plus the renal modifier's note when an
/// adjustment was applied. Order preserved, duplicates dropped.
fn assemble_monitoring(
    kb: &KnowledgeBase,
    drug: &DrugRecord,
    renal_adjusted: bool,
) -> Vec<String> {
    let mut monitoring = drug.monitoring.clone();
    if renal_adjusted {
        if let Some(note) = kb.renal_rules().monitoring_note_for(&drug.id) {
            monitoring.push(note.to_string());
        }
    }
    let mut seen = std::collections::BTreeSet::new();
    monitoring.retain(|m| seen.insert(m.clone()));
    monitoring
}

/// Parse a per-kilogram dose expression like `"15-20 mg/kg"` or
/// `"7.5 mg/kg"` into numeric endpoints. Returns `None` for absolute doses.
pub fn per_kg_range(dose: &str) -> Option<(f64, f64)> {
    let idx = dose.find("mg/kg")?;
    let amount = dose[..idx].trim();
    // Ranges may be written with an ASCII hyphen or an en dash.
    let mut parts = amount.splitn(2, ['-', '–']);
    let lo: f64 = parts.next()?.trim().parse().ok()?;
    let hi: f64 = match parts.next() {
        Some(hi) => hi.trim().parse().ok()?,
        None => lo,
    };
    Some((lo, hi))
}
