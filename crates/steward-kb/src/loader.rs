//! Corpus loading and validation.
//!
//! Loading is all-or-nothing: every file listed in the index is read in the
//! order given there, every record is strictly deserialized, and every
//! cross-reference is checked. All failures are accumulated into a single
//! `KB_LOAD_ERROR` — the engine never serves recommendations from a
//! half-loaded corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, info, warn};

use steward_contracts::error::{StewardError, StewardResult};

use crate::drug::DrugRecord;
use crate::index::CorpusIndex;
use crate::infection::InfectionRecord;
use crate::modifiers::{AllergyRules, PregnancyRules, RenalRules};

/// The loaded, validated, immutable knowledge base.
///
/// Read-only after `load()`; share freely behind an `Arc`. A reload builds a
/// fresh value — in-flight requests keep the one they started with.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    index: CorpusIndex,
    infections: BTreeMap<String, InfectionRecord>,
    drugs: BTreeMap<String, DrugRecord>,
    allergy_rules: AllergyRules,
    pregnancy_rules: PregnancyRules,
    renal_rules: RenalRules,
}

/// Partially loaded state used while accumulating failures.
#[derive(Default)]
struct LoadState {
    infections: BTreeMap<String, InfectionRecord>,
    drugs: BTreeMap<String, DrugRecord>,
    allergy_rules: Option<AllergyRules>,
    pregnancy_rules: Option<PregnancyRules>,
    renal_rules: Option<RenalRules>,
    failures: Vec<String>,
}

impl LoadState {
    fn fail(&mut self, file: &str, reason: impl std::fmt::Display) {
        self.failures.push(format!("{}: {}", file, reason));
    }
}

impl KnowledgeBase {
    /// Load the corpus rooted at `dir`.
    ///
    /// Reads `index.json`, then every file in `loading_order`, then runs the
    /// cross-reference validator. Returns `KB_LOAD_ERROR` listing every
    /// failing file and field; partial loads are never returned.
    pub fn load(dir: &Path) -> StewardResult<Self> {
        let index_path = dir.join("index.json");
        let index: CorpusIndex = read_json(&index_path).map_err(|reason| {
            StewardError::KbLoad { failures: vec![format!("index.json: {}", reason)] }
        })?;

        info!(
            version = %index.version,
            files = index.loading_order.len(),
            "loading knowledge base"
        );

        let mut state = LoadState::default();
        for rel in &index.loading_order {
            Self::load_one(dir, rel, &mut state);
        }

        if state.allergy_rules.is_none() {
            state
                .failures
                .push("modifiers/allergy_rules.json: not listed in index or failed to load".to_string());
        }
        if state.pregnancy_rules.is_none() {
            state
                .failures
                .push("modifiers/pregnancy_rules.json: not listed in index or failed to load".to_string());
        }
        if state.renal_rules.is_none() {
            state
                .failures
                .push("modifiers/renal_adjustment_rules.json: not listed in index or failed to load".to_string());
        }

        if !state.failures.is_empty() {
            return Err(StewardError::KbLoad { failures: state.failures });
        }

        let kb = Self {
            index,
            infections: state.infections,
            drugs: state.drugs,
            allergy_rules: state.allergy_rules.expect("checked above"),
            pregnancy_rules: state.pregnancy_rules.expect("checked above"),
            renal_rules: state.renal_rules.expect("checked above"),
        };

        let failures = kb.validate();
        if !failures.is_empty() {
            return Err(StewardError::KbLoad { failures });
        }

        info!(
            infections = kb.infections.len(),
            drugs = kb.drugs.len(),
            "knowledge base loaded and validated"
        );
        Ok(kb)
    }

    fn load_one(dir: &Path, rel: &str, state: &mut LoadState) {
        let path = dir.join(rel);
        debug!(file = %rel, "loading corpus file");

        if rel.starts_with("infections/") {
            match read_json::<InfectionRecord>(&path) {
                Ok(record) => {
                    if let Some(expected) = file_stem(&path) {
                        if record.id != expected {
                            state.fail(rel, format!(
                                "record id '{}' does not match file name '{}'",
                                record.id, expected
                            ));
                            return;
                        }
                    }
                    if state.infections.contains_key(&record.id) {
                        state.fail(rel, format!("duplicate infection id '{}'", record.id));
                        return;
                    }
                    state.infections.insert(record.id.clone(), record);
                }
                Err(reason) => state.fail(rel, reason),
            }
        } else if rel.starts_with("drugs/") {
            match read_json::<DrugRecord>(&path) {
                Ok(record) => {
                    if let Some(expected) = file_stem(&path) {
                        if record.id != expected {
                            state.fail(rel, format!(
                                "record id '{}' does not match file name '{}'",
                                record.id, expected
                            ));
                            return;
                        }
                    }
                    if state.drugs.contains_key(&record.id) {
                        state.fail(rel, format!("duplicate drug id '{}'", record.id));
                        return;
                    }
                    state.drugs.insert(record.id.clone(), record);
                }
                Err(reason) => state.fail(rel, reason),
            }
        } else if rel == "modifiers/allergy_rules.json" {
            match read_json(&path) {
                Ok(rules) => state.allergy_rules = Some(rules),
                Err(reason) => state.fail(rel, reason),
            }
        } else if rel == "modifiers/pregnancy_rules.json" {
            match read_json(&path) {
                Ok(rules) => state.pregnancy_rules = Some(rules),
                Err(reason) => state.fail(rel, reason),
            }
        } else if rel == "modifiers/renal_adjustment_rules.json" {
            match read_json(&path) {
                Ok(rules) => state.renal_rules = Some(rules),
                Err(reason) => state.fail(rel, reason),
            }
        } else {
            state.fail(rel, "unrecognized path in loading_order");
        }
    }

    /// Cross-reference validation. Returns every failure found; an empty
    /// vector means the corpus is internally consistent.
    ///
    /// Checks:
    /// - every `drug_id` referenced by a regimen exists;
    /// - every indication tag in any drug's `by_indication` is declared by
    ///   at least one infection (its id or a regimen's `indication_tag`);
    /// - the renal modifier table agrees with each drug's `required` flag;
    /// - orphan drugs (never referenced by any regimen) are a warning only.
    fn validate(&self) -> Vec<String> {
        let mut failures = Vec::new();

        let mut referenced_drugs: BTreeSet<&str> = BTreeSet::new();
        let mut known_tags: BTreeSet<String> = BTreeSet::new();

        for (infection_id, infection) in &self.infections {
            known_tags.insert(infection_id.clone());
            for (idx, regimen) in infection.regimens.iter().enumerate() {
                if let Some(tag) = &regimen.indication_tag {
                    known_tags.insert(tag.clone());
                }
                for drug_id in &regimen.drug_ids {
                    referenced_drugs.insert(drug_id);
                    if !self.drugs.contains_key(drug_id) {
                        failures.push(format!(
                            "infections/{}.json: regimen {} references unknown drug '{}'",
                            infection_id, idx, drug_id
                        ));
                    }
                }
            }
        }

        for (drug_id, drug) in &self.drugs {
            for tag in drug.dosing.by_indication.keys() {
                if !known_tags.contains(tag) {
                    failures.push(format!(
                        "drugs/{}.json: by_indication tag '{}' is not declared by any infection",
                        drug_id, tag
                    ));
                }
            }

            // The modifier table and the drug record must agree on whether
            // renal adjustment is required.
            match self.renal_rules.drugs.get(drug_id) {
                Some(rule) if rule.required != drug.renal_adjustment.required => {
                    failures.push(format!(
                        "drugs/{}.json: renal_adjustment.required = {} disagrees with modifiers/renal_adjustment_rules.json ({})",
                        drug_id, drug.renal_adjustment.required, rule.required
                    ));
                }
                None if drug.renal_adjustment.required => {
                    failures.push(format!(
                        "drugs/{}.json: requires renal adjustment but has no entry in modifiers/renal_adjustment_rules.json",
                        drug_id
                    ));
                }
                _ => {}
            }

            if !referenced_drugs.contains(drug_id.as_str()) {
                warn!(drug_id = %drug_id, "orphan drug: no regimen references it");
            }
        }

        failures
    }

    // ── Read-only queries ─────────────────────────────────────────────────────

    pub fn infection(&self, id: &str) -> StewardResult<&InfectionRecord> {
        self.infections
            .get(id)
            .ok_or_else(|| StewardError::UnknownInfection { id: id.to_string() })
    }

    pub fn drug(&self, id: &str) -> StewardResult<&DrugRecord> {
        self.drugs
            .get(id)
            .ok_or_else(|| StewardError::UnknownDrug { id: id.to_string() })
    }

    pub fn allergy_rules(&self) -> &AllergyRules {
        &self.allergy_rules
    }

    pub fn pregnancy_rules(&self) -> &PregnancyRules {
        &self.pregnancy_rules
    }

    pub fn renal_rules(&self) -> &RenalRules {
        &self.renal_rules
    }

    pub fn infection_ids(&self) -> impl Iterator<Item = &str> {
        self.infections.keys().map(|s| s.as_str())
    }

    pub fn index_version(&self) -> &str {
        &self.index.version
    }

    /// Versions of the three modifier files, keyed by modifier name.
    pub fn modifier_versions(&self) -> BTreeMap<String, String> {
        let mut versions = BTreeMap::new();
        versions.insert("allergy_rules".to_string(), self.allergy_rules.version.clone());
        versions.insert(
            "pregnancy_rules".to_string(),
            self.pregnancy_rules.version.clone(),
        );
        versions.insert(
            "renal_adjustment_rules".to_string(),
            self.renal_rules.version.clone(),
        );
        versions
    }
}

/// Read and strictly deserialize one JSON file, mapping both I/O and parse
/// problems to a displayable reason.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read file: {}", e))?;
    serde_json::from_str(&contents).map_err(|e| format!("invalid record: {}", e))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}
