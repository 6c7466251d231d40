//! Patient case types.
//!
//! A `PatientCase` is the request-scoped input to the recommendation
//! pipeline. It is never persisted by the engine; only the de-identified
//! subset listed in the audit entry survives a request.

use serde::{Deserialize, Serialize};

/// Biological sex, as used by the Cockcroft-Gault and ideal-body-weight
/// formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// Where the patient is being treated. Drives hospital-onset reasoning for
/// pneumonia classification and MRSA risk promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Ward,
    Icu,
    Ed,
    Community,
    Hospital,
    NursingHome,
}

/// A structured patient case submitted for an empiric recommendation.
///
/// `age`, `sex`, `weight_kg`, and `infection_type` are mandatory. Renal
/// function must arrive either as `crcl` directly or as `serum_creatinine`
/// (the engine computes Cockcroft-Gault from age/sex/weight). Free-text
/// fields (`symptoms_text`, `allergies_text`) are capped at 4 KiB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientCase {
    pub age: u32,
    pub sex: Sex,
    pub weight_kg: f64,
    #[serde(default)]
    pub height_cm: Option<f64>,
    /// Creatinine clearance in mL/min, if already known.
    #[serde(default)]
    pub crcl: Option<f64>,
    /// Serum creatinine in mg/dL, for Cockcroft-Gault when `crcl` is absent.
    #[serde(default)]
    pub serum_creatinine: Option<f64>,
    #[serde(default)]
    pub location: Option<Location>,
    /// Free-form infection label; normalized by the infection classifier.
    pub infection_type: String,
    #[serde(default)]
    pub fever: Option<bool>,
    /// Hours since hospital admission at symptom onset, when known.
    /// ≥ 48 h promotes pneumonia to hospital-acquired.
    #[serde(default)]
    pub hospital_onset_hours: Option<u32>,
    #[serde(default)]
    pub symptoms_text: Option<String>,
    #[serde(default)]
    pub allergies_text: Option<String>,
    /// Prior resistance history (e.g. "MRSA positive 3 months ago").
    /// Carried through to the audit record; never alters selection.
    #[serde(default)]
    pub prior_resistance: Vec<String>,
    /// Free-form risk flags: `mrsa_colonization`, `pregnancy_2nd_trimester`,
    /// `neutropenia`, `splenectomy`, `dialysis`, `mechanical_ventilation`, …
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub current_outpatient_abx: Vec<String>,
    #[serde(default)]
    pub current_inpatient_abx: Vec<String>,
    #[serde(default)]
    pub culture: Option<serde_json::Value>,
}

impl PatientCase {
    /// Case-insensitive substring scan over `risk_factors`.
    pub fn has_risk_factor(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.risk_factors
            .iter()
            .any(|rf| rf.to_lowercase().contains(&needle))
    }

    /// True when any MRSA marker is present: an explicit risk factor, a
    /// prior-resistance entry, or a central line in the ICU.
    pub fn mrsa_risk(&self) -> bool {
        if self.has_risk_factor("mrsa") {
            return true;
        }
        if self
            .prior_resistance
            .iter()
            .any(|r| r.to_lowercase().contains("mrsa"))
        {
            return true;
        }
        self.has_risk_factor("central_line") && self.location == Some(Location::Icu)
    }
}
