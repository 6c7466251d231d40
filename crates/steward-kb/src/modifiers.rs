//! Modifier tables: allergy rules, pregnancy rules, renal adjustment rules.
//!
//! These encode the cross-cutting safety concerns the pipeline filters on.
//! Ordering inside `AllergyRules::rules` is meaningful: severe rules are
//! listed before mild so the first match governs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use steward_contracts::classification::AllergySeverity;

/// One ordered allergy rule. A rule matches when any keyword in
/// `keyword_list` is a substring of the lowercased allergy text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllergyRule {
    pub severity: AllergySeverity,
    pub keyword_list: Vec<String>,
    pub allowed_classes: Vec<String>,
    pub forbidden_classes: Vec<String>,
    /// Carried through to rationale text only; no filtering authority.
    #[serde(default)]
    pub cross_reactivity_pct: Option<f64>,
}

/// The ordered allergy rule table, from `modifiers/allergy_rules.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllergyRules {
    pub version: String,
    pub last_updated: NaiveDate,
    pub rules: Vec<AllergyRule>,
    /// Tokens meaning "no known allergy" (compared case-insensitively).
    #[serde(default)]
    pub none_tokens: Vec<String>,
}

/// Why and when a drug or class is blocked in pregnancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PregnancyContraindication {
    /// e.g. `"contraindicated"`, `"avoid"`.
    pub severity: String,
    pub all_trimesters: bool,
    /// Specific trimesters when `all_trimesters` is false.
    #[serde(default)]
    pub trimesters: Vec<u8>,
    pub reason: String,
}

/// The pregnancy rule table, from `modifiers/pregnancy_rules.json`.
///
/// Keys of `contraindicated` are drug class names or individual drug ids —
/// the selector checks both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PregnancyRules {
    pub version: String,
    pub last_updated: NaiveDate,
    pub contraindicated: BTreeMap<String, PregnancyContraindication>,
    #[serde(default)]
    pub preferred: Vec<String>,
}

impl PregnancyRules {
    /// Look up a contraindication by drug class or drug id, applicable to
    /// the given trimester (`None` = trimester unknown, which conservatively
    /// matches trimester-specific entries too).
    pub fn contraindication_for(
        &self,
        drug_id: &str,
        drug_class: &str,
        trimester: Option<u8>,
    ) -> Option<&PregnancyContraindication> {
        let entry = self
            .contraindicated
            .get(drug_id)
            .or_else(|| self.contraindicated.get(drug_class))?;
        if entry.all_trimesters {
            return Some(entry);
        }
        match trimester {
            // Unknown trimester: assume the restricted one.
            None => Some(entry),
            Some(t) if entry.trimesters.contains(&t) => Some(entry),
            Some(_) => None,
        }
    }
}

/// Per-drug entry in `modifiers/renal_adjustment_rules.json`.
///
/// The drug record's own band table is the dosing authority; this table is
/// cross-checked against it at load time and contributes the monitoring
/// note appended to adjusted orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenalRule {
    pub required: bool,
    #[serde(default)]
    pub monitoring_note: Option<String>,
}

/// The renal rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenalRules {
    pub version: String,
    pub last_updated: NaiveDate,
    pub drugs: BTreeMap<String, RenalRule>,
}

impl RenalRules {
    pub fn monitoring_note_for(&self, drug_id: &str) -> Option<&str> {
        self.drugs
            .get(drug_id)
            .and_then(|r| r.monitoring_note.as_deref())
    }
}
