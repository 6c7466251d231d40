//! Drug record types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use steward_contracts::classification::{CrclBand, Route};

/// One dose block: either the default or an indication-specific entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoseSpec {
    /// Dose expression, e.g. `"1 g"` or `"15-20 mg/kg"`.
    pub dose: String,
    /// e.g. `"q24h"`, `"q8-12h"`.
    pub frequency: String,
    pub route: Route,
    #[serde(default)]
    pub infusion: Option<String>,
    /// A distinct first dose, e.g. `"25-30 mg/kg"`. Presence of this field
    /// is the loading-dose policy — the calculator must emit it.
    #[serde(default)]
    pub loading_dose: Option<String>,
    #[serde(default)]
    pub max_dose: Option<String>,
}

/// The dosing table of a drug record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dosing {
    /// indication tag → dose block.
    #[serde(default)]
    pub by_indication: BTreeMap<String, DoseSpec>,
    /// Fallback when no indication-specific block exists.
    #[serde(default)]
    pub default: Option<DoseSpec>,
}

/// The override a renal band applies. `no_adjustment: true` records an
/// explicit decision that the band needs no change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandAdjustment {
    #[serde(default)]
    pub dose_override: Option<String>,
    #[serde(default)]
    pub frequency_override: Option<String>,
    #[serde(default)]
    pub no_adjustment: bool,
}

/// Per-drug renal adjustment table. When `required` is true, the band the
/// patient falls in must exist in `by_crcl_band`; a missing band is a
/// request-time error, never a silent default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenalAdjustment {
    pub required: bool,
    #[serde(default)]
    pub by_crcl_band: BTreeMap<CrclBand, BandAdjustment>,
}

/// Drug-specific override of the default IBW/TBW/AdjBW selection rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Use adjusted body weight whenever BMI ≥ 35 (e.g. acyclovir).
    AdjbwIfBmiGe35,
}

/// One drug record, loaded from `drugs/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrugRecord {
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub last_updated: NaiveDate,
    /// Class name matched against allergy forbidden sets and pregnancy
    /// contraindication keys, e.g. `"cephalosporin"`, `"monobactam"`.
    pub drug_class: String,
    pub routes: Vec<Route>,
    #[serde(default)]
    pub spectrum_tags: Vec<String>,
    pub dosing: Dosing,
    pub renal_adjustment: RenalAdjustment,
    /// FDA letter category or local equivalent; informational.
    pub pregnancy_category: String,
    #[serde(default)]
    pub monitoring: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub weight_policy: Option<WeightPolicy>,
}

impl DrugRecord {
    /// Resolve the dose block for an indication: the specific entry, or the
    /// drug's default. `None` means the combination is undosable.
    pub fn dose_for(&self, indication: &str) -> Option<&DoseSpec> {
        self.dosing
            .by_indication
            .get(indication)
            .or(self.dosing.default.as_ref())
    }

    pub fn supports_route(&self, route: Route) -> bool {
        self.routes.contains(&route)
    }
}
