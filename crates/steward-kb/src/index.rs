//! The corpus index.
//!
//! `index.json` is the registry of every file the loader reads, in order.
//! Files on disk that the index does not list are ignored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The top-level record deserialized from `guidelines/index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorpusIndex {
    pub version: String,
    pub last_updated: NaiveDate,
    /// Relative paths under the guidelines directory, in load order.
    /// Must cover every infection, drug, and modifier file.
    pub loading_order: Vec<String>,
    /// Names of the cross-reference checks the validator runs. Informational;
    /// the validator always runs its full set.
    #[serde(default)]
    pub cross_reference_rules: Vec<String>,
}
