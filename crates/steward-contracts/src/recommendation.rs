//! Recommendation and response types.
//!
//! A `Recommendation` is the engine's safety-critical artifact. The
//! surrounding `RecommendationResponse` always carries `request_id`,
//! `engine_version`, and `provenance` — success or failure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::{
    AllergySeverity, CrclBand, PregnancyState, Route, WeightSource,
};

/// Numeric endpoints of a weight-based dose, alongside the verbatim
/// per-kilogram string from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseRange {
    /// Lower endpoint in whole milligrams.
    pub min_mg: u32,
    /// Upper endpoint in whole milligrams. Equals `min_mg` for a point dose.
    pub max_mg: u32,
    /// The original dose expression, e.g. `"15-20 mg/kg"`.
    pub verbatim: String,
    /// The weight the endpoints were computed from.
    pub weight_used_kg: f64,
    pub weight_source: WeightSource,
}

/// One fully resolved drug order within a chosen regimen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugOrder {
    pub drug_id: String,
    pub drug_name: String,
    /// The dose expression after renal adjustment, verbatim from the KB.
    pub dose: String,
    pub frequency: String,
    pub route: Route,
    /// A distinct first dose, present whenever the drug × indication
    /// combination declares a loading-dose policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_dose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_dose_range: Option<DoseRange>,
    /// Computed endpoints when the maintenance dose is weight-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_range: Option<DoseRange>,
    /// True when a renal band override replaced the default dose or frequency.
    #[serde(default)]
    pub renal_adjusted: bool,
    #[serde(default)]
    pub monitoring: Vec<String>,
    pub rationale: String,
}

/// The selected regimen with per-drug orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenRegimen {
    pub drugs: Vec<DrugOrder>,
    pub total_duration: String,
    /// The identifier linking the infection record to dose blocks inside
    /// drug records.
    pub indication_tag: String,
}

/// A warning attached to a recommendation. Warnings flagged
/// `reduces_confidence` lower the confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
    #[serde(default)]
    pub reduces_confidence: bool,
}

impl Warning {
    pub fn plain(message: impl Into<String>) -> Self {
        Self { message: message.into(), reduces_confidence: false }
    }
}

/// The exact knowledge-base versions a recommendation was produced from.
///
/// Maps are `BTreeMap` so serialization is deterministic and repeated runs
/// over the same corpus are byte-identical.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// Version of `index.json`.
    pub kb_version: String,
    /// Version of the infection file the regimen came from, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infection_file_version: Option<String>,
    /// drug id → drug file version, for every drug in the chosen regimen.
    #[serde(default)]
    pub drug_file_versions: BTreeMap<String, String>,
    /// modifier name → modifier file version.
    #[serde(default)]
    pub modifier_versions: BTreeMap<String, String>,
}

/// The full recommendation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub request_id: String,
    pub infection_category: String,
    pub allergy_classification: AllergySeverity,
    /// Classifier notes explaining how the allergy text was matched (which
    /// keywords fired, whether the conservative default applied).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergy_notes: Vec<String>,
    pub pregnancy_state: PregnancyState,
    pub renal_band: CrclBand,
    pub chosen_regimen: ChosenRegimen,
    pub warnings: Vec<Warning>,
    /// Bounded score in [0.3, 1.0].
    pub confidence: f64,
    pub provenance: Provenance,
    pub emitted_at: DateTime<Utc>,
}

/// Outcome discriminant for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Machine-readable error body carried by failed responses.
///
/// `code` is drawn from the error taxonomy; `message` is rendered verbatim
/// by the UI layer, which must not synthesize clinical text of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

/// The envelope returned for every recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub status: ResponseStatus,
    pub request_id: String,
    pub engine_version: String,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}
