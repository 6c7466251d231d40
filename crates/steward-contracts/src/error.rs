//! The unified error taxonomy for the steward engine.
//!
//! Every fallible operation returns `StewardResult<T>`. Variants carry the
//! structured context a human reviewer needs to debug a refusal — most
//! importantly `NoRegimen`, which records exactly which filter removed which
//! regimen. The `code()` accessor yields the machine-readable code carried
//! in every error response.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which safety filter removed a candidate regimen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyFilter {
    /// The regimen targets a different allergy status than the case.
    AllergyStatus,
    /// A drug's class is in the classification's forbidden set.
    ForbiddenClass,
    /// A drug or drug class is contraindicated in pregnancy.
    Pregnancy,
    /// The infection mandates a route a drug cannot satisfy.
    Route,
    /// The regimen is gated on a risk flag the case does not carry.
    RiskGate,
}

/// One regimen removed during selection, with the filter responsible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimenRemoval {
    /// Position of the regimen in the infection record's preference order.
    pub regimen_index: usize,
    pub drug_ids: Vec<String>,
    pub filter: SafetyFilter,
    pub reason: String,
}

/// The complete removal trace behind an `ERR_NO_REGIMEN`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionTrace {
    pub removals: Vec<RegimenRemoval>,
}

impl SelectionTrace {
    pub fn push(
        &mut self,
        regimen_index: usize,
        drug_ids: &[String],
        filter: SafetyFilter,
        reason: impl Into<String>,
    ) {
        self.removals.push(RegimenRemoval {
            regimen_index,
            drug_ids: drug_ids.to_vec(),
            filter,
            reason: reason.into(),
        });
    }
}

/// The unified error type.
#[derive(Debug, Error)]
pub enum StewardError {
    /// The knowledge base failed to load or validate. Fatal: the engine
    /// refuses to serve recommendations on a half-loaded corpus.
    #[error("knowledge base failed to load: {} problem(s): {}", failures.len(), failures.join("; "))]
    KbLoad { failures: Vec<String> },

    #[error("unknown infection id '{id}'")]
    UnknownInfection { id: String },

    #[error("unknown drug id '{id}'")]
    UnknownDrug { id: String },

    /// The normalized infection label matched no known category. The engine
    /// surfaces this rather than guessing.
    #[error("could not classify infection from '{normalized}'")]
    UnclassifiedInfection { normalized: String },

    /// Every candidate regimen was removed by a safety filter. The trace
    /// lists each removal so a reviewer can see exactly why.
    #[error("no safe regimen survives the safety filters for '{infection_category}'")]
    NoRegimen {
        infection_category: String,
        trace: SelectionTrace,
    },

    #[error("no dose defined for drug '{drug_id}' with indication '{indication}'")]
    NoDose { drug_id: String, indication: String },

    #[error("drug '{drug_id}' requires renal adjustment but has no entry for band '{band}'")]
    RenalBandMissing { drug_id: String, band: String },

    #[error("invalid patient case: {reason}")]
    BadCase { reason: String },

    /// The submitted patient_case contains a deny-listed identifying field.
    #[error("patient_case contains protected field '{field}'")]
    PhiField { field: String },

    #[error("error report status cannot change from '{from}' to '{to}'")]
    BadStatusTransition { from: String, to: String },

    #[error("no error report with id '{error_id}'")]
    UnknownReport { error_id: String },

    /// Audit I/O failure. Logged, but never suppresses the recommendation
    /// response — the recommendation is the safety-critical artifact.
    #[error("audit write failed: {reason}")]
    AuditWrite { reason: String },

    #[error("error report store I/O failure: {reason}")]
    ReportIo { reason: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl StewardError {
    /// The machine-readable code carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            StewardError::KbLoad { .. } => "KB_LOAD_ERROR",
            StewardError::UnknownInfection { .. } => "ERR_UNKNOWN_INFECTION",
            StewardError::UnknownDrug { .. } => "ERR_UNKNOWN_DRUG",
            StewardError::UnclassifiedInfection { .. } => "ERR_UNCLASSIFIED_INFECTION",
            StewardError::NoRegimen { .. } => "ERR_NO_REGIMEN",
            StewardError::NoDose { .. } => "ERR_NO_DOSE",
            StewardError::RenalBandMissing { .. } => "ERR_RENAL_BAND_MISSING",
            StewardError::BadCase { .. } => "ERR_BAD_CASE",
            StewardError::PhiField { .. } => "ERR_PHI_FIELD",
            StewardError::BadStatusTransition { .. } => "ERR_BAD_STATUS_TRANSITION",
            StewardError::UnknownReport { .. } => "ERR_UNKNOWN_REPORT",
            StewardError::AuditWrite { .. } => "ERR_AUDIT_WRITE",
            StewardError::ReportIo { .. } => "ERR_REPORT_IO",
            StewardError::Config { .. } => "ERR_CONFIG",
        }
    }

    /// True for errors that must stop the service rather than one request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StewardError::KbLoad { .. } | StewardError::Config { .. }
        )
    }

    /// Structured context for the response error body. Null when the
    /// message alone says everything.
    pub fn details(&self) -> serde_json::Value {
        match self {
            StewardError::KbLoad { failures } => serde_json::json!({ "failures": failures }),
            StewardError::NoRegimen { trace, .. } => {
                serde_json::to_value(trace).unwrap_or(serde_json::Value::Null)
            }
            StewardError::UnclassifiedInfection { normalized } => {
                serde_json::json!({ "normalized": normalized })
            }
            _ => serde_json::Value::Null,
        }
    }
}

/// Convenience alias used throughout the steward crates.
pub type StewardResult<T> = Result<T, StewardError>;
