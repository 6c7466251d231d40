//! Engine configuration, loaded from TOML.
//!
//! Only the keys below are recognized; unknown keys are a configuration
//! error so typos never silently disable a safety behavior.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StewardError, StewardResult};

fn default_audit_path() -> PathBuf {
    PathBuf::from("logs")
}

fn default_error_reports_path() -> PathBuf {
    PathBuf::from("logs/error_reports")
}

fn default_true() -> bool {
    true
}

/// Runtime configuration for the recommendation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Filesystem path to the guidelines tree. Required.
    pub kb_path: PathBuf,

    /// Directory for audit day files.
    #[serde(default = "default_audit_path")]
    pub audit_path: PathBuf,

    /// Directory for error-report day files.
    #[serde(default = "default_error_reports_path")]
    pub error_reports_path: PathBuf,

    /// Whether unmatched, non-empty allergy text is treated as severe.
    /// Clinical deployments must leave this at `true`.
    #[serde(default = "default_true")]
    pub conservative_allergy_default: bool,

    /// Whether `ERR_NO_REGIMEN` fails the request (`true`) or returns an
    /// empty recommendation with a prominent warning (`false`). Clinical
    /// deployments must leave this at `true`.
    #[serde(default = "default_true")]
    pub refuse_on_no_regimen: bool,

    /// Optional serum-creatinine floor applied before Cockcroft-Gault.
    /// Default: none — the unrounded value is used as given.
    #[serde(default)]
    pub cockcroft_gault_scr_floor: Option<f64>,
}

impl EngineConfig {
    /// A configuration with every optional key at its default.
    pub fn for_kb(kb_path: impl Into<PathBuf>) -> Self {
        Self {
            kb_path: kb_path.into(),
            audit_path: default_audit_path(),
            error_reports_path: default_error_reports_path(),
            conservative_allergy_default: true,
            refuse_on_no_regimen: true,
            cockcroft_gault_scr_floor: None,
        }
    }

    /// Parse `s` as TOML.
    pub fn from_toml_str(s: &str) -> StewardResult<Self> {
        toml::from_str(s).map_err(|e| StewardError::Config {
            reason: format!("failed to parse engine config TOML: {}", e),
        })
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> StewardResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| StewardError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
