//! # steward-dose
//!
//! Patient-specific dose calculation: indication-specific base doses,
//! IBW/TBW/AdjBW weight selection, renal band overrides, and loading-dose
//! policy. Pure computation over the knowledge base; no I/O.

pub mod calculator;
pub mod weight;

pub use calculator::{calculate_drug_order, per_kg_range, DoseContext};

// ── Tests ─────────────────────────────────────────────────────────────────────
