//! # steward-reports
//!
//! Reviewer-submitted error reports: append-only JSON Lines intake, PHI
//! screening, and a constrained status state machine feeding the learning
//! loop. Status changes rewrite the day file atomically.

pub mod status;
pub mod store;

pub use store::{ErrorReportStore, ReportFilter};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use steward_contracts::error::StewardError;
    use steward_contracts::report::{
        ErrorReportSubmission, ErrorSeverity, ErrorStatus, ErrorType,
    };

    use crate::status::{allowed_transitions, check_transition};
    use crate::store::{ErrorReportStore, ReportFilter};

    fn submission() -> ErrorReportSubmission {
        serde_json::from_value(json!({
            "severity": "high",
            "error_type": "wrong_dose",
            "description": "Ceftriaxone dosed 1 g for meningitis",
            "expected": "2 g IV q12h per meningitis dosing",
            "reporter": "reviewer-7",
            "patient_case": { "age": 45, "sex": "male", "infection_type": "meningitis" },
            "recommendation_given": { "drug_ids": ["ceftriaxone"] }
        }))
        .unwrap()
    }

    fn store() -> (ErrorReportStore, TempDir) {
        let dir = TempDir::new().unwrap();
        (ErrorReportStore::new(dir.path()).unwrap(), dir)
    }

    // ── Submission ────────────────────────────────────────────────────────────

    #[test]
    fn submit_assigns_id_and_new_status() {
        let (store, _dir) = store();
        let report = store.submit(submission()).unwrap();

        assert_eq!(report.status, ErrorStatus::New);
        assert!(report.status_updated_at.is_none());

        // ERR-YYYYMMDD-<8 lowercase hex>.
        let parts: Vec<&str> = report.error_id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ERR");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn submitted_record_is_one_json_line() {
        let (store, dir) = store();
        store.submit(submission()).unwrap();
        store.submit(submission()).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(files.len(), 1, "both records share the day file");

        let contents = std::fs::read_to_string(files[0].path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        for line in contents.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn phi_fields_are_rejected_at_any_depth() {
        let (store, _dir) = store();

        let mut top_level = submission();
        top_level.patient_case = json!({ "age": 45, "name": "J. Doe" });
        match store.submit(top_level) {
            Err(StewardError::PhiField { field }) => assert_eq!(field, "name"),
            other => panic!("expected PhiField, got {:?}", other.map(|r| r.error_id)),
        }

        let mut nested = submission();
        nested.patient_case = json!({ "age": 45, "history": [{ "MRN": "12345" }] });
        match store.submit(nested) {
            Err(StewardError::PhiField { field }) => assert_eq!(field, "MRN"),
            other => panic!("expected PhiField, got {:?}", other.map(|r| r.error_id)),
        }
    }

    // ── Listing ───────────────────────────────────────────────────────────────

    #[test]
    fn list_filters_by_severity_and_respects_limit() {
        let (store, _dir) = store();
        for _ in 0..3 {
            store.submit(submission()).unwrap();
        }
        let mut critical = submission();
        critical.severity = ErrorSeverity::Critical;
        store.submit(critical).unwrap();

        let all = store.list(&ReportFilter::default()).unwrap();
        assert_eq!(all.len(), 4);

        let only_critical = store
            .list(&ReportFilter {
                severity: Some(ErrorSeverity::Critical),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(only_critical.len(), 1);

        let limited = store
            .list(&ReportFilter { limit: Some(2), ..Default::default() })
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn list_filters_by_error_type_and_status() {
        let (store, _dir) = store();
        let report = store.submit(submission()).unwrap();
        store.update_status(&report.error_id, ErrorStatus::Verified).unwrap();
        store.submit(submission()).unwrap();

        let verified = store
            .list(&ReportFilter {
                status: Some(ErrorStatus::Verified),
                error_type: Some(ErrorType::WrongDose),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].error_id, report.error_id);
    }

    // ── Status machine ────────────────────────────────────────────────────────

    #[test]
    fn transition_table_matches_the_design() {
        use ErrorStatus::*;
        assert_eq!(allowed_transitions(New), [Verified, NotReproduced, WontFix]);
        assert_eq!(allowed_transitions(Verified), [InProgress, WontFix]);
        assert_eq!(allowed_transitions(InProgress), [Fixed, WontFix]);
        assert_eq!(allowed_transitions(Fixed), [Closed]);
        assert!(allowed_transitions(Closed).is_empty());
        assert!(allowed_transitions(WontFix).is_empty());
        assert!(allowed_transitions(NotReproduced).is_empty());

        assert!(check_transition(New, Verified).is_ok());
        assert!(check_transition(New, Closed).is_err());
        assert!(check_transition(Closed, New).is_err());
    }

    #[test]
    fn full_lifecycle_reaches_closed() {
        let (store, _dir) = store();
        let report = store.submit(submission()).unwrap();

        for status in [
            ErrorStatus::Verified,
            ErrorStatus::InProgress,
            ErrorStatus::Fixed,
            ErrorStatus::Closed,
        ] {
            let updated = store.update_status(&report.error_id, status).unwrap();
            assert_eq!(updated.status, status);
            assert!(updated.status_updated_at.is_some());
        }

        let stored = store.get(&report.error_id).unwrap();
        assert_eq!(stored.status, ErrorStatus::Closed);
    }

    #[test]
    fn same_status_update_is_a_noop() {
        let (store, dir) = store();
        let report = store.submit(submission()).unwrap();

        let day_file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let before = std::fs::read_to_string(&day_file).unwrap();

        let result = store.update_status(&report.error_id, ErrorStatus::New).unwrap();
        assert_eq!(result.status, ErrorStatus::New);
        assert!(result.status_updated_at.is_none());

        let after = std::fs::read_to_string(&day_file).unwrap();
        assert_eq!(before, after, "a no-op update must not rewrite the file");
    }

    #[test]
    fn disallowed_transition_leaves_the_file_untouched() {
        let (store, dir) = store();
        let report = store.submit(submission()).unwrap();

        let day_file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let before = std::fs::read_to_string(&day_file).unwrap();

        match store.update_status(&report.error_id, ErrorStatus::Closed) {
            Err(StewardError::BadStatusTransition { from, to }) => {
                assert_eq!(from, "new");
                assert_eq!(to, "closed");
            }
            other => panic!("expected BadStatusTransition, got {:?}", other.map(|r| r.status)),
        }

        let after = std::fs::read_to_string(&day_file).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn unknown_report_id_surfaces() {
        let (store, _dir) = store();
        assert!(matches!(
            store.update_status("ERR-20260101-deadbeef", ErrorStatus::Verified),
            Err(StewardError::UnknownReport { .. })
        ));
        assert!(matches!(
            store.get("not-even-an-id"),
            Err(StewardError::UnknownReport { .. })
        ));
    }

    #[test]
    fn update_preserves_every_other_record() {
        let (store, _dir) = store();
        let first = store.submit(submission()).unwrap();
        let second = store.submit(submission()).unwrap();
        let third = store.submit(submission()).unwrap();

        store.update_status(&second.error_id, ErrorStatus::Verified).unwrap();

        assert_eq!(store.get(&first.error_id).unwrap().status, ErrorStatus::New);
        assert_eq!(store.get(&second.error_id).unwrap().status, ErrorStatus::Verified);
        assert_eq!(store.get(&third.error_id).unwrap().status, ErrorStatus::New);

        // Line order in the file is preserved by the rewrite.
        let all = store.list(&ReportFilter::default()).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.error_id.as_str()).collect();
        assert_eq!(ids, vec![
            first.error_id.as_str(),
            second.error_id.as_str(),
            third.error_id.as_str()
        ]);
    }
}
