//! # steward-contracts
//!
//! Shared types, schemas, and the error taxonomy for the antibiotic steward
//! engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, the configuration schema, and error
//! types.

pub mod case;
pub mod classification;
pub mod config;
pub mod error;
pub mod recommendation;
pub mod report;
