//! Regimen selection.
//!
//! Filters run in a fixed order over the infection record's regimens, which
//! are listed in preference order — the first survivor wins. Every removal
//! is recorded in the `SelectionTrace` and logged, so an `ERR_NO_REGIMEN`
//! explains exactly what eliminated each candidate.
//!
//! Filter order:
//!   1. allergy-status match
//!   2. MRSA risk gate
//!   3. forbidden drug classes (unconditional, even though a consistent KB
//!      makes it redundant after step 1)
//!   4. pregnancy contraindications
//!   5. route enforcement

use tracing::{debug, warn};

use steward_contracts::case::PatientCase;
use steward_contracts::classification::{AllergyClassification, PregnancyState, Route};
use steward_contracts::error::{SafetyFilter, SelectionTrace, StewardError, StewardResult};
use steward_kb::infection::{Regimen, RegimenPregnancyStatus};
use steward_kb::KnowledgeBase;

/// The winning regimen with per-drug route decisions resolved.
#[derive(Debug, Clone)]
pub struct SelectedRegimen {
    pub drug_ids: Vec<String>,
    /// The tag used to look up dose blocks inside drug records.
    pub indication_tag: String,
    /// Route chosen for each drug, parallel to `drug_ids`.
    pub routes: Vec<Route>,
    pub rationale: String,
    pub duration: String,
    /// Position in the infection record's preference order.
    pub regimen_index: usize,
    /// True when the patient is pregnant and no surviving regimen is marked
    /// pregnancy-preferred. A soft mismatch: costs confidence, not safety.
    pub pregnancy_soft_mismatch: bool,
}

/// Select a regimen for the classified case.
pub fn select_regimen(
    kb: &KnowledgeBase,
    infection_id: &str,
    allergy: &AllergyClassification,
    pregnancy: PregnancyState,
    case: &PatientCase,
) -> StewardResult<SelectedRegimen> {
    let infection = kb.infection(infection_id)?;
    let route_required = infection.classification_rules.route_required;
    let mut trace = SelectionTrace::default();
    let mut survivors: Vec<(usize, &Regimen, Vec<Route>)> = Vec::new();

    for (idx, regimen) in infection.regimens.iter().enumerate() {
        // ── 1. Allergy-status match ──────────────────────────────────────────
        if !regimen.allergy_status.accepts(allergy.severity) {
            trace.push(
                idx,
                &regimen.drug_ids,
                SafetyFilter::AllergyStatus,
                format!(
                    "regimen targets allergy status '{:?}', case is '{}'",
                    regimen.allergy_status, allergy.severity
                ),
            );
            continue;
        }

        // ── 2. MRSA risk gate ────────────────────────────────────────────────
        if regimen.mrsa_risk == Some(true) && !case.mrsa_risk() {
            trace.push(
                idx,
                &regimen.drug_ids,
                SafetyFilter::RiskGate,
                "regimen is gated on MRSA risk the case does not carry",
            );
            continue;
        }

        // ── 3. Forbidden drug classes ────────────────────────────────────────
        //
        // Runs unconditionally: a KB inconsistency must never reach the
        // patient.
        if let Some(reason) = forbidden_class_violation(kb, regimen, allergy)? {
            warn!(
                infection = infection_id,
                regimen = idx,
                %reason,
                "regimen removed by forbidden-class filter"
            );
            trace.push(idx, &regimen.drug_ids, SafetyFilter::ForbiddenClass, reason);
            continue;
        }

        // ── 4. Pregnancy contraindications ───────────────────────────────────
        if pregnancy.is_pregnant() {
            if let Some(reason) = pregnancy_violation(kb, regimen, pregnancy)? {
                warn!(
                    infection = infection_id,
                    regimen = idx,
                    %reason,
                    "regimen removed by pregnancy filter"
                );
                trace.push(idx, &regimen.drug_ids, SafetyFilter::Pregnancy, reason);
                continue;
            }
        }

        // ── 5. Route enforcement ─────────────────────────────────────────────
        match resolve_routes(kb, regimen, route_required)? {
            Ok(routes) => survivors.push((idx, regimen, routes)),
            Err(reason) => {
                warn!(
                    infection = infection_id,
                    regimen = idx,
                    %reason,
                    "regimen removed by route filter"
                );
                trace.push(idx, &regimen.drug_ids, SafetyFilter::Route, reason);
            }
        }
    }

    let Some((idx, regimen, routes)) = survivors.into_iter().next() else {
        return Err(StewardError::NoRegimen {
            infection_category: infection_id.to_string(),
            trace,
        });
    };

    // Soft preference only: pregnant patients should get a regimen marked
    // pregnancy-preferred when one exists; not getting one costs confidence.
    let pregnancy_soft_mismatch = pregnancy.is_pregnant()
        && regimen.pregnancy_status != Some(RegimenPregnancyStatus::Preferred);

    debug!(
        infection = infection_id,
        regimen = idx,
        drugs = ?regimen.drug_ids,
        "regimen selected"
    );

    Ok(SelectedRegimen {
        drug_ids: regimen.drug_ids.clone(),
        indication_tag: infection.indication_tag_for(regimen),
        routes,
        rationale: regimen.rationale.clone(),
        duration: regimen
            .duration
            .clone()
            .unwrap_or_else(|| infection.default_duration.clone()),
        regimen_index: idx,
        pregnancy_soft_mismatch,
    })
}

/// Returns the violation reason if any drug in the regimen belongs to a
/// forbidden class of the allergy classification.
fn forbidden_class_violation(
    kb: &KnowledgeBase,
    regimen: &Regimen,
    allergy: &AllergyClassification,
) -> StewardResult<Option<String>> {
    for drug_id in &regimen.drug_ids {
        let drug = kb.drug(drug_id)?;
        if allergy.forbids_class(&drug.drug_class) {
            return Ok(Some(format!(
                "'{}' is a {}, forbidden for allergy classification '{}'",
                drug_id, drug.drug_class, allergy.severity
            )));
        }
    }
    Ok(None)
}

/// Returns the violation reason if any drug (by id or class) is
/// contraindicated for the case's pregnancy state.
fn pregnancy_violation(
    kb: &KnowledgeBase,
    regimen: &Regimen,
    pregnancy: PregnancyState,
) -> StewardResult<Option<String>> {
    let rules = kb.pregnancy_rules();
    for drug_id in &regimen.drug_ids {
        let drug = kb.drug(drug_id)?;
        if let Some(entry) =
            rules.contraindication_for(drug_id, &drug.drug_class, pregnancy.trimester())
        {
            return Ok(Some(format!(
                "'{}' is {} in pregnancy: {}",
                drug_id, entry.severity, entry.reason
            )));
        }
    }
    Ok(None)
}

/// Choose a route for every drug in the regimen.
///
/// When the infection mandates IV, every drug must offer IV or the regimen
/// is removed. Otherwise the regimen's preferred route is used when the drug
/// offers it, preferring IV when both are available.
#[allow(clippy::type_complexity)]
fn resolve_routes(
    kb: &KnowledgeBase,
    regimen: &Regimen,
    route_required: Option<Route>,
) -> StewardResult<Result<Vec<Route>, String>> {
    let mut routes = Vec::with_capacity(regimen.drug_ids.len());
    for drug_id in &regimen.drug_ids {
        let drug = kb.drug(drug_id)?;

        if let Some(required) = route_required {
            if !drug.supports_route(required) {
                return Ok(Err(format!(
                    "infection requires {} but '{}' offers {:?}",
                    required, drug_id, drug.routes
                )));
            }
            routes.push(required);
            continue;
        }

        let chosen = regimen
            .preferred_route
            .filter(|r| drug.supports_route(*r))
            .or_else(|| drug.routes.iter().copied().find(|r| *r == Route::Iv))
            .or_else(|| drug.routes.first().copied());
        match chosen {
            Some(route) => routes.push(route),
            None => {
                return Ok(Err(format!("'{}' declares no routes", drug_id)));
            }
        }
    }
    Ok(Ok(routes))
}
