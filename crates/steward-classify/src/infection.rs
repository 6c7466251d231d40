//! Infection classification.
//!
//! Maps a patient case to a canonical infection category the knowledge base
//! understands. Normalization first (lowercase, punctuation stripped,
//! synonyms), then promotion rules in a fixed order — first match wins —
//! and finally the normalized value verbatim when it names a known
//! infection. Anything else is `ERR_UNCLASSIFIED_INFECTION`; the engine
//! surfaces it rather than guessing.

use tracing::debug;

use steward_contracts::case::PatientCase;
use steward_contracts::error::{StewardError, StewardResult};
use steward_kb::KnowledgeBase;

/// Keywords in `symptoms_text` that mark an upper urinary tract infection.
const PYELONEPHRITIS_MARKERS: &[&str] = &["fever", "febrile", "flank pain", "costovertebral", "cvat"];

/// Keywords that mark an aspiration event.
const ASPIRATION_MARKERS: &[&str] = &["aspiration", "aspirated", "witnessed aspiration"];

/// Classify the case into a canonical infection category.
pub fn classify(kb: &KnowledgeBase, case: &PatientCase) -> StewardResult<String> {
    let normalized = normalize(&case.infection_type);
    let symptoms = case
        .symptoms_text
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    let category = match normalized.as_str() {
        // UTI splits on fever: febrile or flank-pain UTI is pyelonephritis,
        // afebrile UTI is cystitis.
        "uti" => {
            let febrile = case.fever == Some(true)
                || PYELONEPHRITIS_MARKERS.iter().any(|m| symptoms.contains(m));
            if febrile {
                "pyelonephritis".to_string()
            } else {
                "cystitis".to_string()
            }
        }

        "bacteremia" => {
            if case.mrsa_risk() {
                "bacteremia_mrsa".to_string()
            } else {
                "bacteremia".to_string()
            }
        }

        "pneumonia" => classify_pneumonia(case, &symptoms),

        other => other.to_string(),
    };

    if kb.infection_ids().any(|id| id == category) {
        debug!(input = %case.infection_type, category = %category, "infection classified");
        Ok(category)
    } else {
        Err(StewardError::UnclassifiedInfection { normalized: category })
    }
}

/// Pneumonia splits by acquisition setting, in promotion order: hospital
/// onset (≥ 48 h after admission) first, then ventilator markers, then
/// aspiration markers, else community-acquired. A case carrying both a
/// hospital onset and a ventilator marker classifies as `hap`.
fn classify_pneumonia(case: &PatientCase, symptoms: &str) -> String {
    if case.hospital_onset_hours.map_or(false, |h| h >= 48) {
        return "hap".to_string();
    }
    if case.has_risk_factor("mechanical_ventilation") || case.has_risk_factor("ventilator") {
        return "vap".to_string();
    }
    if ASPIRATION_MARKERS.iter().any(|m| symptoms.contains(m))
        || case.has_risk_factor("aspiration")
    {
        return "aspiration".to_string();
    }
    "cap".to_string()
}

/// Lowercase, strip punctuation, collapse whitespace to underscores, and
/// map synonyms onto canonical labels.
pub fn normalize(infection_type: &str) -> String {
    let cleaned: String = infection_type
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");

    match joined.as_str() {
        "urinary_tract_infection" | "urosepsis" => "uti".to_string(),
        "pna" => "pneumonia".to_string(),
        "sepsis" | "bloodstream_infection" => "bacteremia".to_string(),
        "cellulitis" | "skin_and_soft_tissue" | "skin_and_soft_tissue_infection" => {
            "ssti".to_string()
        }
        "intraabdominal" | "abdominal_infection" => "intra_abdominal".to_string(),
        "bacterial_meningitis" => "meningitis".to_string(),
        other => other.to_string(),
    }
}
