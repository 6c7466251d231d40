//! The error-report store.
//!
//! Reports live as JSON Lines in day files named `YYYY-MM-DD.jsonl`.
//! New records are appended; a status update rewrites the record's day file
//! atomically (write a temp file in the same directory, then rename over
//! the original). Writes are serialized by an in-process mutex so lines
//! never interleave. Once a write has entered the critical section it runs
//! to completion.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use steward_contracts::error::{StewardError, StewardResult};
use steward_contracts::report::{
    ErrorReport, ErrorReportSubmission, ErrorSeverity, ErrorStatus, ErrorType,
};

use crate::status::check_transition;

/// Keys that must never appear in a submitted `patient_case`, at any depth.
const PHI_DENY_LIST: &[&str] = &["name", "mrn", "dob", "admission_date"];

/// Filters accepted by [`ErrorReportStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ErrorStatus>,
    pub severity: Option<ErrorSeverity>,
    pub error_type: Option<ErrorType>,
    /// Restrict to one day file; all days otherwise.
    pub date: Option<NaiveDate>,
    /// Maximum records returned; `None` means the default of 50.
    pub limit: Option<usize>,
}

const DEFAULT_LIMIT: usize = 50;

/// File-backed error-report intake.
pub struct ErrorReportStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ErrorReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> StewardResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StewardError::ReportIo {
            reason: format!("cannot create report directory '{}': {}", dir.display(), e),
        })?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    /// Accept a submission: PHI screening, id assignment, append.
    ///
    /// The id embeds the UTC day (`ERR-YYYYMMDD-<8 hex>`), which also names
    /// the day file the record lives in.
    pub fn submit(&self, submission: ErrorReportSubmission) -> StewardResult<ErrorReport> {
        if let Some(field) = find_phi_field(&submission.patient_case) {
            return Err(StewardError::PhiField { field });
        }

        let now = Utc::now();
        let error_id = format!(
            "ERR-{}-{}",
            now.format("%Y%m%d"),
            &Uuid::new_v4().simple().to_string()[..8]
        );

        let report = ErrorReport {
            error_id: error_id.clone(),
            status: ErrorStatus::New,
            severity: submission.severity,
            error_type: submission.error_type,
            description: submission.description,
            expected: submission.expected,
            reporter: submission.reporter,
            patient_case: submission.patient_case,
            recommendation_given: submission.recommendation_given,
            created_at: now,
            status_updated_at: None,
        };

        let line = serde_json::to_string(&report).map_err(|e| StewardError::ReportIo {
            reason: format!("cannot serialize report: {}", e),
        })?;
        let path = self.day_file(now.date_naive());

        {
            let _guard = self.write_lock.lock().map_err(|e| StewardError::ReportIo {
                reason: format!("report lock poisoned: {}", e),
            })?;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| StewardError::ReportIo {
                    reason: format!("cannot open '{}': {}", path.display(), e),
                })?;
            writeln!(file, "{}", line).map_err(|e| StewardError::ReportIo {
                reason: format!("cannot append to '{}': {}", path.display(), e),
            })?;
        }

        if report.severity == ErrorSeverity::Critical {
            warn!(
                error_id = %error_id,
                error_type = ?report.error_type,
                "CRITICAL error report submitted"
            );
        } else {
            info!(error_id = %error_id, severity = ?report.severity, "error report submitted");
        }

        Ok(report)
    }

    /// Read reports, newest file first, applying the filter.
    pub fn list(&self, filter: &ReportFilter) -> StewardResult<Vec<ErrorReport>> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
        let mut results = Vec::new();

        for path in self.day_files(filter.date)? {
            for report in read_day_file(&path)? {
                if results.len() >= limit {
                    return Ok(results);
                }
                let keep = filter.status.map_or(true, |s| report.status == s)
                    && filter.severity.map_or(true, |s| report.severity == s)
                    && filter.error_type.map_or(true, |t| report.error_type == t);
                if keep {
                    results.push(report);
                }
            }
        }
        Ok(results)
    }

    /// Fetch one report by id.
    pub fn get(&self, error_id: &str) -> StewardResult<ErrorReport> {
        let path = self.day_file(date_from_id(error_id)?);
        read_day_file(&path)?
            .into_iter()
            .find(|r| r.error_id == error_id)
            .ok_or_else(|| StewardError::UnknownReport { error_id: error_id.to_string() })
    }

    /// Change a report's status.
    ///
    /// Updating to the current status is an idempotent no-op; a disallowed
    /// transition is rejected without touching the file. An allowed
    /// transition rewrites the day file atomically with `status_updated_at`
    /// refreshed.
    pub fn update_status(
        &self,
        error_id: &str,
        new_status: ErrorStatus,
    ) -> StewardResult<ErrorReport> {
        let path = self.day_file(date_from_id(error_id)?);

        let _guard = self.write_lock.lock().map_err(|e| StewardError::ReportIo {
            reason: format!("report lock poisoned: {}", e),
        })?;

        let mut reports = read_day_file(&path)?;
        let report = reports
            .iter_mut()
            .find(|r| r.error_id == error_id)
            .ok_or_else(|| StewardError::UnknownReport { error_id: error_id.to_string() })?;

        if report.status == new_status {
            return Ok(report.clone());
        }
        check_transition(report.status, new_status)?;

        let old_status = report.status;
        report.status = new_status;
        report.status_updated_at = Some(Utc::now());
        let updated = report.clone();

        rewrite_atomically(&path, &reports)?;

        info!(
            error_id = %error_id,
            from = %old_status,
            to = %new_status,
            "error report status updated"
        );
        Ok(updated)
    }

    // ── Paths ─────────────────────────────────────────────────────────────────

    fn day_file(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Day files to scan: one for a date filter, otherwise every `.jsonl`
    /// in the directory, newest first.
    fn day_files(&self, date: Option<NaiveDate>) -> StewardResult<Vec<PathBuf>> {
        if let Some(date) = date {
            return Ok(vec![self.day_file(date)]);
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| StewardError::ReportIo {
                reason: format!("cannot read '{}': {}", self.dir.display(), e),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        paths.sort();
        paths.reverse();
        Ok(paths)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Recover the day file date from an `ERR-YYYYMMDD-xxxxxxxx` id.
fn date_from_id(error_id: &str) -> StewardResult<NaiveDate> {
    let digits = error_id
        .strip_prefix("ERR-")
        .and_then(|rest| rest.split('-').next())
        .unwrap_or_default();
    NaiveDate::parse_from_str(digits, "%Y%m%d").map_err(|_| StewardError::UnknownReport {
        error_id: error_id.to_string(),
    })
}

fn read_day_file(path: &Path) -> StewardResult<Vec<ErrorReport>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StewardError::ReportIo {
                reason: format!("cannot read '{}': {}", path.display(), e),
            })
        }
    };

    let mut reports = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let report = serde_json::from_str(line).map_err(|e| StewardError::ReportIo {
            reason: format!("corrupt record at {}:{}: {}", path.display(), number + 1, e),
        })?;
        reports.push(report);
    }
    Ok(reports)
}

/// Write the full record set to a temp file in the same directory, then
/// rename over the original so readers never observe a partial file.
fn rewrite_atomically(path: &Path, reports: &[ErrorReport]) -> StewardResult<()> {
    let mut buffer = String::new();
    for report in reports {
        let line = serde_json::to_string(report).map_err(|e| StewardError::ReportIo {
            reason: format!("cannot serialize report: {}", e),
        })?;
        buffer.push_str(&line);
        buffer.push('\n');
    }

    let tmp = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp, buffer).map_err(|e| StewardError::ReportIo {
        reason: format!("cannot write '{}': {}", tmp.display(), e),
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StewardError::ReportIo {
        reason: format!("cannot rename '{}' over '{}': {}", tmp.display(), path.display(), e),
    })?;
    Ok(())
}

/// Depth-first scan for deny-listed keys. Returns the first offender.
fn find_phi_field(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                if PHI_DENY_LIST.contains(&key.to_lowercase().as_str()) {
                    return Some(key.clone());
                }
                if let Some(found) = find_phi_field(v) {
                    return Some(found);
                }
            }
            None
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_phi_field),
        _ => None,
    }
}
