//! The recommendation engine.
//!
//! Composes the pipeline — validate → classify → select → dose — and
//! assembles the recommendation record, warnings, confidence score, and
//! audit entry. The engine is stateless across requests apart from the
//! in-memory knowledge base, which is immutable and swapped wholesale on
//! reload: in-flight requests keep the `Arc` they started with.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use steward_classify::{allergy, infection, renal};
use steward_contracts::case::PatientCase;
use steward_contracts::classification::{AllergySeverity, CrclBand, PregnancyState};
use steward_contracts::config::EngineConfig;
use steward_contracts::error::{StewardError, StewardResult};
use steward_contracts::recommendation::{
    ChosenRegimen, ErrorBody, Provenance, Recommendation, RecommendationResponse,
    ResponseStatus, Warning,
};
use steward_dose::{calculate_drug_order, DoseContext};
use steward_kb::KnowledgeBase;
use steward_select::select_regimen;

use crate::audit::{redact_secrets, AuditEntry, AuditSink, FileAuditSink};

/// Version stamped into every response.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Free-text fields may not exceed 4 KiB.
const MAX_TEXT_FIELD_BYTES: usize = 4096;

/// Age at or above which the elderly warning attaches.
const ELDERLY_AGE: u32 = 75;

/// The recommendation engine. Construct once, share across requests.
pub struct RecommendationEngine {
    config: EngineConfig,
    kb: RwLock<Arc<KnowledgeBase>>,
    audit: Box<dyn AuditSink>,
}

impl RecommendationEngine {
    /// Build an engine from pre-loaded parts. Used by tests and embedders
    /// that manage their own sink.
    pub fn new(config: EngineConfig, kb: KnowledgeBase, audit: Box<dyn AuditSink>) -> Self {
        Self { config, kb: RwLock::new(Arc::new(kb)), audit }
    }

    /// Load the knowledge base from `config.kb_path` and open a file-backed
    /// audit sink under `config.audit_path`.
    pub fn from_config(config: EngineConfig) -> StewardResult<Self> {
        let kb = KnowledgeBase::load(&config.kb_path)?;
        let audit = FileAuditSink::new(&config.audit_path)?;
        info!(kb_version = kb.index_version(), "recommendation engine ready");
        Ok(Self::new(config, kb, Box::new(audit)))
    }

    /// The knowledge base currently serving new requests.
    pub fn kb(&self) -> Arc<KnowledgeBase> {
        self.kb.read().expect("kb lock poisoned").clone()
    }

    /// Reload the corpus from disk. On success new requests see the fresh
    /// KB; on failure the engine keeps serving from the old one.
    pub fn reload(&self) -> StewardResult<()> {
        let fresh = KnowledgeBase::load(&self.config.kb_path)?;
        let version = fresh.index_version().to_string();
        *self.kb.write().expect("kb lock poisoned") = Arc::new(fresh);
        info!(kb_version = %version, "knowledge base reloaded");
        Ok(())
    }

    /// Produce a recommendation response for the case. Never panics and
    /// never raises: every failure becomes a structured error response, and
    /// an audit entry is emitted either way.
    pub fn recommend(&self, case: &PatientCase) -> RecommendationResponse {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let kb = self.kb();

        debug!(request_id = %request_id, infection_type = %case.infection_type, "request received");

        let outcome = self.run_pipeline(&kb, case, &request_id);
        let duration_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(recommendation) => RecommendationResponse {
                status: ResponseStatus::Ok,
                request_id: request_id.clone(),
                engine_version: ENGINE_VERSION.to_string(),
                provenance: recommendation.provenance.clone(),
                recommendation: Some(recommendation),
                error: None,
            },
            Err(err) => {
                warn!(request_id = %request_id, code = err.code(), %err, "request failed");
                RecommendationResponse {
                    status: ResponseStatus::Error,
                    request_id: request_id.clone(),
                    engine_version: ENGINE_VERSION.to_string(),
                    provenance: base_provenance(&kb),
                    recommendation: None,
                    error: Some(ErrorBody {
                        code: err.code().to_string(),
                        message: err.to_string(),
                        details: err.details(),
                    }),
                }
            }
        };

        self.write_audit(case, &response, duration_ms);
        response
    }

    // ── Pipeline ──────────────────────────────────────────────────────────────

    fn run_pipeline(
        &self,
        kb: &KnowledgeBase,
        case: &PatientCase,
        request_id: &str,
    ) -> StewardResult<Recommendation> {
        validate_case(case)?;

        // Stage outputs feed strictly forward; each stage sees only the
        // previous stage's results.
        let infection_category = infection::classify(kb, case)?;
        let allergy_classification = allergy::classify(
            kb.allergy_rules(),
            case.allergies_text.as_deref(),
            self.config.conservative_allergy_default,
        );
        let pregnancy = PregnancyState::from_risk_factors(&case.risk_factors);
        let renal_state = renal::renal_state(case, self.config.cockcroft_gault_scr_floor)?;

        let selection = match select_regimen(
            kb,
            &infection_category,
            &allergy_classification,
            pregnancy,
            case,
        ) {
            Ok(selection) => Some(selection),
            Err(StewardError::NoRegimen { .. }) if !self.config.refuse_on_no_regimen => {
                warn!(
                    request_id,
                    infection = %infection_category,
                    "no regimen survived; returning empty recommendation per configuration"
                );
                None
            }
            Err(err) => return Err(err),
        };

        let infection_record = kb.infection(&infection_category)?;

        let mut drugs = Vec::new();
        if let Some(selection) = &selection {
            // The cross-reactivity figure travels in rationale text only; it
            // has no filtering authority.
            let rationale = match allergy_classification.cross_reactivity_pct {
                Some(pct) if allergy_classification.severity != AllergySeverity::None => {
                    format!(
                        "{} (reported allergy cross-reactivity {:.0}%)",
                        selection.rationale, pct
                    )
                }
                _ => selection.rationale.clone(),
            };
            let ctx = DoseContext {
                sex: case.sex,
                weight_kg: case.weight_kg,
                height_cm: case.height_cm,
                band: renal_state.band,
            };
            for drug_id in &selection.drug_ids {
                drugs.push(calculate_drug_order(
                    kb,
                    drug_id,
                    &selection.indication_tag,
                    &ctx,
                    &rationale,
                )?);
            }
        }

        // ── Warnings ─────────────────────────────────────────────────────────
        let mut warnings: Vec<Warning> = Vec::new();
        if case.age >= ELDERLY_AGE {
            warnings.push(Warning::plain(
                "Elderly patient (age >= 75): monitor closely for adverse effects",
            ));
        }
        if renal_state.band != CrclBand::CrclGt50 && renal_state.band != CrclBand::Crcl30_50 {
            warnings.push(Warning::plain(
                "Severe renal impairment: pharmacist review of all dosing advised",
            ));
        }
        if case.has_risk_factor("neutropenia") {
            warnings.push(Warning::plain(
                "Neutropenia: broaden coverage per febrile neutropenia pathway if febrile",
            ));
        }
        if pregnancy.is_pregnant() {
            warnings.push(Warning::plain(
                "Pregnancy: regimen screened against contraindicated drug classes",
            ));
        }
        if allergy_classification.conservative_fallback {
            if self.config.conservative_allergy_default {
                warnings.push(Warning::plain(
                    "No explicit allergy pattern matched — treated conservatively as severe",
                ));
            } else {
                warnings.push(Warning::plain(
                    "No explicit allergy pattern matched; conservative default disabled — treated as no allergy",
                ));
            }
        }
        if selection.is_none() {
            warnings.push(Warning {
                message: "No regimen survived the safety filters; manual selection required"
                    .to_string(),
                reduces_confidence: true,
            });
        }
        for critical in &infection_record.critical_warnings {
            warnings.push(Warning {
                message: critical.message.clone(),
                reduces_confidence: critical.reduces_confidence,
            });
        }

        // ── Confidence ───────────────────────────────────────────────────────
        let soft_mismatches = selection
            .as_ref()
            .map_or(0, |s| u32::from(s.pregnancy_soft_mismatch))
            + u32::from(allergy_classification.conservative_fallback);
        let confidence =
            confidence_score(soft_mismatches, warnings.iter().any(|w| w.reduces_confidence));

        // ── Provenance ───────────────────────────────────────────────────────
        let mut provenance = base_provenance(kb);
        provenance.infection_file_version = Some(infection_record.version.clone());
        let mut drug_versions = BTreeMap::new();
        for order in &drugs {
            let drug = kb.drug(&order.drug_id)?;
            drug_versions.insert(drug.id.clone(), drug.version.clone());
        }
        provenance.drug_file_versions = drug_versions;

        let (total_duration, indication_tag) = match &selection {
            Some(s) => (s.duration.clone(), s.indication_tag.clone()),
            None => (
                infection_record.default_duration.clone(),
                infection_category.clone(),
            ),
        };

        info!(
            request_id,
            infection = %infection_category,
            allergy = %allergy_classification.severity,
            band = %renal_state.band,
            drugs = ?drugs.iter().map(|d| d.drug_id.as_str()).collect::<Vec<_>>(),
            confidence,
            "recommendation assembled"
        );

        Ok(Recommendation {
            request_id: request_id.to_string(),
            infection_category,
            allergy_classification: allergy_classification.severity,
            allergy_notes: allergy_classification.notes.clone(),
            pregnancy_state: pregnancy,
            renal_band: renal_state.band,
            chosen_regimen: ChosenRegimen { drugs, total_duration, indication_tag },
            warnings,
            confidence,
            provenance,
            emitted_at: Utc::now(),
        })
    }

    // ── Audit ─────────────────────────────────────────────────────────────────

    fn write_audit(&self, case: &PatientCase, response: &RecommendationResponse, duration_ms: u64) {
        let mut input = deidentified_input(case);
        redact_secrets(&mut input);

        let recommendation = response.recommendation.as_ref();
        let entry = AuditEntry {
            timestamp: Utc::now(),
            request_id: response.request_id.clone(),
            status: response.status,
            input,
            infection_category: recommendation.map(|r| r.infection_category.clone()),
            allergy_classification: recommendation.map(|r| r.allergy_classification),
            pregnancy_state: recommendation.map(|r| r.pregnancy_state),
            renal_band: recommendation.map(|r| r.renal_band),
            chosen_drug_ids: recommendation
                .map(|r| {
                    r.chosen_regimen
                        .drugs
                        .iter()
                        .map(|d| d.drug_id.clone())
                        .collect()
                })
                .unwrap_or_default(),
            confidence: recommendation.map(|r| r.confidence),
            duration_ms,
            provenance: response.provenance.clone(),
            error: response.error.clone(),
        };

        // A failed audit write is logged, never propagated: the
        // recommendation is the safety-critical artifact.
        if let Err(err) = self.audit.record(&entry) {
            error!(request_id = %response.request_id, %err, "audit write failed");
        }
    }
}

// ── Pure helpers ──────────────────────────────────────────────────────────────

/// Shape validation: required fields, renal inputs, text-size caps.
fn validate_case(case: &PatientCase) -> StewardResult<()> {
    if case.infection_type.trim().is_empty() {
        return Err(StewardError::BadCase {
            reason: "infection_type is empty".to_string(),
        });
    }
    if !(case.weight_kg > 0.0) {
        return Err(StewardError::BadCase {
            reason: format!("weight_kg {} is not positive", case.weight_kg),
        });
    }

    let has_renal_input = case.crcl.is_some()
        || case.serum_creatinine.is_some()
        || case.has_risk_factor("dialysis")
        || case.has_risk_factor("cvvhdf")
        || case.has_risk_factor("crrt");
    if !has_renal_input {
        return Err(StewardError::BadCase {
            reason: "crcl, serum_creatinine, or a dialysis marker is required".to_string(),
        });
    }

    for (name, text) in [
        ("symptoms_text", case.symptoms_text.as_deref()),
        ("allergies_text", case.allergies_text.as_deref()),
    ] {
        if let Some(text) = text {
            if text.len() > MAX_TEXT_FIELD_BYTES {
                return Err(StewardError::BadCase {
                    reason: format!(
                        "{} exceeds {} bytes ({} given)",
                        name,
                        MAX_TEXT_FIELD_BYTES,
                        text.len()
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Bounded confidence: 0.9, minus 0.1 per unmatched soft preference, minus
/// 0.2 if any warning reduces confidence, floored at 0.3.
fn confidence_score(soft_mismatches: u32, any_reduces_confidence: bool) -> f64 {
    let mut score = 0.9 - 0.1 * soft_mismatches as f64;
    if any_reduces_confidence {
        score -= 0.2;
    }
    score.clamp(0.3, 1.0)
}

/// Provenance known before any infection is resolved: index and modifier
/// versions. Present in every response, success or failure.
fn base_provenance(kb: &KnowledgeBase) -> Provenance {
    Provenance {
        kb_version: kb.index_version().to_string(),
        infection_file_version: None,
        drug_file_versions: BTreeMap::new(),
        modifier_versions: kb.modifier_versions(),
    }
}

/// The structured, de-identified subset of the case recorded in the audit
/// entry. Free-text and culture payloads never reach the audit log.
fn deidentified_input(case: &PatientCase) -> serde_json::Value {
    serde_json::json!({
        "age": case.age,
        "sex": case.sex,
        "weight_kg": case.weight_kg,
        "height_cm": case.height_cm,
        "crcl": case.crcl,
        "serum_creatinine": case.serum_creatinine,
        "location": case.location,
        "infection_type": case.infection_type,
        "fever": case.fever,
        "hospital_onset_hours": case.hospital_onset_hours,
        "risk_factors": case.risk_factors,
        "prior_resistance": case.prior_resistance,
        "current_outpatient_abx": case.current_outpatient_abx,
        "current_inpatient_abx": case.current_inpatient_abx,
    })
}
