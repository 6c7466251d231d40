//! Infection record types.
//!
//! One record per clinical syndrome. Regimens are listed in preference
//! order — the selector's tie-break is the declaration order here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use steward_contracts::classification::{AllergySeverity, Route};

/// How a regimen declares the allergy population it targets.
///
/// `Any` regimens match every classification and rely on the unconditional
/// forbidden-class filter for safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimenAllergyStatus {
    NoAllergy,
    MildPcn,
    SeverePcn,
    Cephalosporin,
    Sulfa,
    Fluoroquinolone,
    Any,
}

impl RegimenAllergyStatus {
    /// Whether a regimen with this status is a candidate for the given
    /// allergy classification.
    ///
    /// `Multiple` matches only severe-PCN and `any` regimens — the most
    /// restrictive pool — and the forbidden-class filter then removes
    /// anything the union still forbids.
    pub fn accepts(&self, severity: AllergySeverity) -> bool {
        match self {
            RegimenAllergyStatus::Any => true,
            RegimenAllergyStatus::NoAllergy => severity == AllergySeverity::None,
            RegimenAllergyStatus::MildPcn => severity == AllergySeverity::MildPcn,
            RegimenAllergyStatus::SeverePcn => {
                severity == AllergySeverity::SeverePcn || severity == AllergySeverity::Multiple
            }
            RegimenAllergyStatus::Cephalosporin => severity == AllergySeverity::Cephalosporin,
            RegimenAllergyStatus::Sulfa => severity == AllergySeverity::Sulfa,
            RegimenAllergyStatus::Fluoroquinolone => {
                severity == AllergySeverity::Fluoroquinolone
            }
        }
    }
}

/// Optional pregnancy marker on a regimen. `Preferred` regimens satisfy the
/// soft preference for pregnant patients; absence of any `Preferred`
/// survivor costs confidence but is not a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimenPregnancyStatus {
    Preferred,
    Avoid,
}

/// One candidate regimen inside an infection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Regimen {
    pub allergy_status: RegimenAllergyStatus,
    #[serde(default)]
    pub pregnancy_status: Option<RegimenPregnancyStatus>,
    /// When true, this regimen only applies to cases carrying MRSA risk.
    #[serde(default)]
    pub mrsa_risk: Option<bool>,
    pub drug_ids: Vec<String>,
    pub rationale: String,
    #[serde(default)]
    pub preferred_route: Option<Route>,
    /// Overrides the infection id as the dose-lookup tag when present.
    #[serde(default)]
    pub indication_tag: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Keyword triggers and route mandate for a syndrome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationRules {
    #[serde(default)]
    pub keyword_triggers: Vec<String>,
    /// When set, every drug in a chosen regimen must be given by this route.
    #[serde(default)]
    pub route_required: Option<Route>,
}

/// A KB-declared warning attached to every recommendation for this
/// infection. `reduces_confidence` feeds the confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticalWarning {
    pub message: String,
    #[serde(default)]
    pub reduces_confidence: bool,
}

/// One infection record, loaded from `infections/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfectionRecord {
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub last_updated: NaiveDate,
    #[serde(default)]
    pub classification_rules: ClassificationRules,
    pub regimens: Vec<Regimen>,
    #[serde(default)]
    pub critical_warnings: Vec<CriticalWarning>,
    pub default_duration: String,
}

impl InfectionRecord {
    /// The dose-lookup tag for a regimen: its override, or this infection's id.
    pub fn indication_tag_for(&self, regimen: &Regimen) -> String {
        regimen
            .indication_tag
            .clone()
            .unwrap_or_else(|| self.id.clone())
    }
}
