//! # steward-kb
//!
//! Loader, validator, and read-only query surface for the guidelines
//! knowledge base.
//!
//! ## Corpus layout
//!
//! ```text
//! guidelines/
//!   index.json                          loading order + cross-reference rules
//!   infections/<id>.json                one record per clinical syndrome
//!   drugs/<id>.json                     one record per drug
//!   modifiers/allergy_rules.json
//!   modifiers/pregnancy_rules.json
//!   modifiers/renal_adjustment_rules.json
//! ```
//!
//! Every file carries `version` and `last_updated`; the versions actually
//! loaded flow into each recommendation's provenance block.

pub mod drug;
pub mod index;
pub mod infection;
pub mod loader;
pub mod modifiers;

pub use loader::KnowledgeBase;

// ── Tests ─────────────────────────────────────────────────────────────────────
