//! Audit trail.
//!
//! One JSON object per line, day files named `audit-YYYY-MM-DD.log`. The
//! entry carries only de-identified input fields, and secrets are redacted
//! before anything reaches disk. Audit I/O failures are logged by the
//! engine but never suppress the recommendation response.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use steward_contracts::classification::{AllergySeverity, CrclBand, PregnancyState};
use steward_contracts::error::{StewardError, StewardResult};
use steward_contracts::recommendation::{ErrorBody, Provenance, ResponseStatus};

/// One audit record, emitted per recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub status: ResponseStatus,
    /// De-identified input fields only; secrets redacted.
    pub input: serde_json::Value,
    #[serde(default)]
    pub infection_category: Option<String>,
    #[serde(default)]
    pub allergy_classification: Option<AllergySeverity>,
    #[serde(default)]
    pub pregnancy_state: Option<PregnancyState>,
    #[serde(default)]
    pub renal_band: Option<CrclBand>,
    #[serde(default)]
    pub chosen_drug_ids: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub duration_ms: u64,
    pub provenance: Provenance,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

/// Where audit entries go. The engine owns a boxed sink; the file-backed
/// implementation is the production one, the in-memory one serves tests.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> StewardResult<()>;
}

// ── File-backed sink ──────────────────────────────────────────────────────────

/// Appends one line per entry to `audit-YYYY-MM-DD.log` under `dir`.
/// Writes are serialized by an in-process mutex so concurrent requests
/// never interleave partial lines.
pub struct FileAuditSink {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> StewardResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StewardError::AuditWrite {
            reason: format!("cannot create audit directory '{}': {}", dir.display(), e),
        })?;
        Ok(Self { dir, lock: Mutex::new(()) })
    }

    fn day_file(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("audit-{}.log", date.format("%Y-%m-%d")))
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, entry: &AuditEntry) -> StewardResult<()> {
        let line = serde_json::to_string(entry).map_err(|e| StewardError::AuditWrite {
            reason: format!("cannot serialize audit entry: {}", e),
        })?;
        let path = self.day_file(entry.timestamp.date_naive());

        let _guard = self.lock.lock().map_err(|e| StewardError::AuditWrite {
            reason: format!("audit lock poisoned: {}", e),
        })?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StewardError::AuditWrite {
                reason: format!("cannot open '{}': {}", path.display(), e),
            })?;
        writeln!(file, "{}", line).map_err(|e| StewardError::AuditWrite {
            reason: format!("cannot append to '{}': {}", path.display(), e),
        })?;
        Ok(())
    }
}

// ── In-memory sink ────────────────────────────────────────────────────────────

/// Keeps entries in a `Vec` behind a mutex. The reference implementation
/// for tests and embedded use.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit lock poisoned").clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) -> StewardResult<()> {
        self.entries
            .lock()
            .map_err(|e| StewardError::AuditWrite {
                reason: format!("audit lock poisoned: {}", e),
            })?
            .push(entry.clone());
        Ok(())
    }
}

// ── Redaction ─────────────────────────────────────────────────────────────────

const SECRET_KEY_MARKERS: &[&str] = &["api_key", "apikey", "authorization", "token", "secret", "password"];

/// Replace the value of any object key that looks like a credential,
/// recursively. Applied to the input block before an entry is written.
pub fn redact_secrets(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                let lowered = key.to_lowercase();
                if SECRET_KEY_MARKERS.iter().any(|m| lowered.contains(m)) {
                    *v = serde_json::Value::String("***REDACTED***".to_string());
                } else {
                    redact_secrets(v);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                redact_secrets(item);
            }
        }
        _ => {}
    }
}

// ── Day summary ───────────────────────────────────────────────────────────────

/// Aggregate counts for one audit day file.
#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub date: NaiveDate,
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub avg_duration_ms: f64,
    pub categories: BTreeMap<String, u64>,
}

/// Scan one day's audit file. Unparseable lines are skipped, not fatal —
/// a summary over a partially corrupt file is still useful to an operator.
pub fn day_summary(dir: &Path, date: NaiveDate) -> StewardResult<AuditSummary> {
    let path = dir.join(format!("audit-{}.log", date.format("%Y-%m-%d")));
    let mut summary = AuditSummary {
        date,
        total_requests: 0,
        success_count: 0,
        error_count: 0,
        avg_duration_ms: 0.0,
        categories: BTreeMap::new(),
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summary),
        Err(e) => {
            return Err(StewardError::AuditWrite {
                reason: format!("cannot read '{}': {}", path.display(), e),
            })
        }
    };

    let mut total_duration: u64 = 0;
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(entry) = serde_json::from_str::<AuditEntry>(line) else {
            continue;
        };
        summary.total_requests += 1;
        match entry.status {
            ResponseStatus::Ok => summary.success_count += 1,
            ResponseStatus::Error => summary.error_count += 1,
        }
        total_duration += entry.duration_ms;
        let category = entry
            .infection_category
            .unwrap_or_else(|| "unknown".to_string());
        *summary.categories.entry(category).or_insert(0) += 1;
    }

    if summary.total_requests > 0 {
        summary.avg_duration_ms = total_duration as f64 / summary.total_requests as f64;
    }

    info!(
        date = %date,
        total = summary.total_requests,
        errors = summary.error_count,
        "audit day summary computed"
    );
    Ok(summary)
}
