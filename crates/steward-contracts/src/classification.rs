//! Classification outputs shared across pipeline stages.
//!
//! These are the intermediate values that flow from the classifiers into the
//! selector and dose calculator, and from there into the recommendation and
//! audit records.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The allergy severity classes the engine distinguishes.
///
/// `Multiple` is produced when allergy text matches rules of more than one
/// severity (e.g. penicillin rash plus a sulfa reaction); its forbidden set
/// is the union of every matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergySeverity {
    None,
    MildPcn,
    SeverePcn,
    Cephalosporin,
    Sulfa,
    Fluoroquinolone,
    Multiple,
}

impl fmt::Display for AllergySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AllergySeverity::None => "none",
            AllergySeverity::MildPcn => "mild_pcn",
            AllergySeverity::SeverePcn => "severe_pcn",
            AllergySeverity::Cephalosporin => "cephalosporin",
            AllergySeverity::Sulfa => "sulfa",
            AllergySeverity::Fluoroquinolone => "fluoroquinolone",
            AllergySeverity::Multiple => "multiple",
        };
        f.write_str(s)
    }
}

/// The full output of the allergy classifier.
///
/// `forbidden_classes` is the exact set the drug selector filters against;
/// `cross_reactivity_pct` is carried through to rationale text only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllergyClassification {
    pub severity: AllergySeverity,
    pub forbidden_classes: BTreeSet<String>,
    pub allowed_classes: BTreeSet<String>,
    #[serde(default)]
    pub cross_reactivity_pct: Option<f64>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// True when non-empty allergy text matched no explicit rule and the
    /// conservative default was applied. Surfaced as a warning, never hidden.
    #[serde(default)]
    pub conservative_fallback: bool,
}

impl AllergyClassification {
    /// The empty classification: no allergy, nothing forbidden.
    pub fn none() -> Self {
        Self {
            severity: AllergySeverity::None,
            forbidden_classes: BTreeSet::new(),
            allowed_classes: BTreeSet::new(),
            cross_reactivity_pct: None,
            notes: Vec::new(),
            conservative_fallback: false,
        }
    }

    pub fn forbids_class(&self, drug_class: &str) -> bool {
        self.forbidden_classes.contains(drug_class)
    }
}

/// Pregnancy state, carried separately from the infection category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PregnancyState {
    None,
    /// Pregnant, trimester not specified. Treated as every trimester for
    /// contraindication purposes.
    Pregnant,
    Trimester1,
    Trimester2,
    Trimester3,
}

impl PregnancyState {
    pub fn is_pregnant(&self) -> bool {
        !matches!(self, PregnancyState::None)
    }

    pub fn trimester(&self) -> Option<u8> {
        match self {
            PregnancyState::Trimester1 => Some(1),
            PregnancyState::Trimester2 => Some(2),
            PregnancyState::Trimester3 => Some(3),
            _ => None,
        }
    }

    /// Derive the pregnancy state from free-form risk factor strings such as
    /// `pregnancy_2nd_trimester` or `pregnant`.
    pub fn from_risk_factors(risk_factors: &[String]) -> Self {
        let mut pregnant = false;
        for rf in risk_factors {
            let rf = rf.to_lowercase();
            if !rf.contains("pregnan") {
                continue;
            }
            pregnant = true;
            if rf.contains("1st") || rf.contains("first") {
                return PregnancyState::Trimester1;
            }
            if rf.contains("2nd") || rf.contains("second") {
                return PregnancyState::Trimester2;
            }
            if rf.contains("3rd") || rf.contains("third") {
                return PregnancyState::Trimester3;
            }
        }
        if pregnant {
            PregnancyState::Pregnant
        } else {
            PregnancyState::None
        }
    }
}

impl fmt::Display for PregnancyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PregnancyState::None => "none",
            PregnancyState::Pregnant => "pregnant",
            PregnancyState::Trimester1 => "trimester_1",
            PregnancyState::Trimester2 => "trimester_2",
            PregnancyState::Trimester3 => "trimester_3",
        };
        f.write_str(s)
    }
}

/// Administration route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    #[serde(rename = "IV")]
    Iv,
    #[serde(rename = "PO")]
    Po,
    #[serde(rename = "IM")]
    Im,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Route::Iv => "IV",
            Route::Po => "PO",
            Route::Im => "IM",
        };
        f.write_str(s)
    }
}

/// Creatinine-clearance bands used for renal dose adjustment.
///
/// Dialysis bands win over the numeric CrCl when the patient is on HD or
/// CVVHDF. Serialized names match the band keys in drug records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CrclBand {
    /// CrCl > 50 mL/min — the default dosing band.
    #[serde(rename = "crcl_gt_50")]
    CrclGt50,
    /// CrCl 30–50 mL/min inclusive.
    #[serde(rename = "crcl_30_50")]
    Crcl30_50,
    /// CrCl 10–29 mL/min.
    #[serde(rename = "crcl_10_29")]
    Crcl10_29,
    /// CrCl < 10 mL/min, not on dialysis.
    #[serde(rename = "crcl_lt_10")]
    CrclLt10,
    /// Intermittent hemodialysis.
    #[serde(rename = "hd")]
    Hd,
    /// Continuous veno-venous hemodiafiltration.
    #[serde(rename = "cvvhdf")]
    Cvvhdf,
}

impl CrclBand {
    /// True for the band where no renal adjustment is ever expected.
    pub fn is_default_band(&self) -> bool {
        matches!(self, CrclBand::CrclGt50)
    }
}

impl fmt::Display for CrclBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrclBand::CrclGt50 => ">50",
            CrclBand::Crcl30_50 => "30-50",
            CrclBand::Crcl10_29 => "10-29",
            CrclBand::CrclLt10 => "<10",
            CrclBand::Hd => "HD",
            CrclBand::Cvvhdf => "CVVHDF",
        };
        f.write_str(s)
    }
}

/// Which body-weight figure a weight-based dose was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Ibw,
    Tbw,
    Adjbw,
}
