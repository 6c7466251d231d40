//! Error-report types for the reviewer learning loop.
//!
//! Reports are append-only JSON Lines records; status changes rewrite the
//! day file atomically. The status machine itself lives in steward-reports —
//! this module only defines the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an error report.
///
/// `Closed`, `WontFix`, and `NotReproduced` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    New,
    Verified,
    InProgress,
    Fixed,
    Closed,
    WontFix,
    NotReproduced,
}

impl ErrorStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorStatus::Closed | ErrorStatus::WontFix | ErrorStatus::NotReproduced
        )
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorStatus::New => "new",
            ErrorStatus::Verified => "verified",
            ErrorStatus::InProgress => "in_progress",
            ErrorStatus::Fixed => "fixed",
            ErrorStatus::Closed => "closed",
            ErrorStatus::WontFix => "wont_fix",
            ErrorStatus::NotReproduced => "not_reproduced",
        };
        f.write_str(s)
    }
}

/// Reviewer-assessed severity of the reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// What kind of mistake the reviewer is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Contraindicated,
    WrongDrug,
    WrongDose,
    MissedAllergy,
    MissedInteraction,
    WrongRoute,
    Other,
}

/// What a reviewer submits. The store assigns `error_id`, `status`, and
/// `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReportSubmission {
    pub severity: ErrorSeverity,
    pub error_type: ErrorType,
    pub description: String,
    /// What the reviewer believes the engine should have produced.
    pub expected: String,
    #[serde(default)]
    pub reporter: Option<String>,
    /// De-identified case. Submissions containing deny-listed keys
    /// (`name`, `mrn`, `dob`, `admission_date`) are rejected.
    pub patient_case: serde_json::Value,
    pub recommendation_given: serde_json::Value,
}

/// A stored error report, one JSON object per line in the day file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// `ERR-YYYYMMDD-<8 lowercase hex>`.
    pub error_id: String,
    pub status: ErrorStatus,
    pub severity: ErrorSeverity,
    pub error_type: ErrorType,
    pub description: String,
    pub expected: String,
    #[serde(default)]
    pub reporter: Option<String>,
    pub patient_case: serde_json::Value,
    pub recommendation_given: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status_updated_at: Option<DateTime<Utc>>,
}
