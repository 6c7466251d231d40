//! # steward-classify
//!
//! The pure classification stages of the recommendation pipeline:
//!
//! - [`allergy`] — free-text allergy description → severity + forbidden
//!   drug classes, with a conservative default for unmatched text.
//! - [`infection`] — patient case → canonical infection category.
//! - [`renal`] — creatinine clearance banding and Cockcroft-Gault.
//!
//! All three are pure functions over the case and the loaded knowledge
//! base; they perform no I/O.

pub mod allergy;
pub mod infection;
pub mod renal;

// ── Tests ─────────────────────────────────────────────────────────────────────
