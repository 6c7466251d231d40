//! The error-report status machine.
//!
//! An explicit transition table replaces ad-hoc status strings; terminal
//! states are terminal, so a reviewer dashboard cannot "un-close" a report
//! without an administrative change to this table.

use steward_contracts::error::{StewardError, StewardResult};
use steward_contracts::report::ErrorStatus;

/// The states reachable from `from` in one step.
pub fn allowed_transitions(from: ErrorStatus) -> &'static [ErrorStatus] {
    match from {
        ErrorStatus::New => &[
            ErrorStatus::Verified,
            ErrorStatus::NotReproduced,
            ErrorStatus::WontFix,
        ],
        ErrorStatus::Verified => &[ErrorStatus::InProgress, ErrorStatus::WontFix],
        ErrorStatus::InProgress => &[ErrorStatus::Fixed, ErrorStatus::WontFix],
        ErrorStatus::Fixed => &[ErrorStatus::Closed],
        // Terminal states.
        ErrorStatus::Closed | ErrorStatus::WontFix | ErrorStatus::NotReproduced => &[],
    }
}

/// Reject disallowed transitions. A same-status "transition" is not checked
/// here — the store treats it as an idempotent no-op before consulting the
/// table.
pub fn check_transition(from: ErrorStatus, to: ErrorStatus) -> StewardResult<()> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StewardError::BadStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
