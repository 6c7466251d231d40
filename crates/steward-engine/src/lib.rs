//! # steward-engine
//!
//! The recommendation engine: composes the classification, selection, and
//! dosing stages over an immutable knowledge base, assembles the
//! recommendation record with warnings and a bounded confidence score, and
//! emits one audit entry per request.
//!
//! ## Pipeline
//!
//! ```text
//! PatientCase → validate → InfectionClassifier → AllergyClassifier
//!             → renal banding → DrugSelector → DoseCalculator
//!             → Recommendation (+ audit entry)
//! ```
//!
//! Request-scoped failures (unclassified infection, no regimen, no dose)
//! come back as structured error responses; only a corpus that fails to
//! load stops the service.

pub mod audit;
pub mod engine;

pub use audit::{AuditEntry, AuditSink, FileAuditSink, MemoryAuditSink};
pub use engine::{RecommendationEngine, ENGINE_VERSION};

// ── Tests ─────────────────────────────────────────────────────────────────────
