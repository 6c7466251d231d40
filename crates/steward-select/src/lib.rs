//! # steward-select
//!
//! Regimen selection for the recommendation pipeline: ordered, declarative
//! safety filters (allergy status, forbidden classes, pregnancy, route) over
//! the knowledge base's candidate regimens, with a structured removal trace
//! behind every refusal.

pub mod selector;

pub use selector::{select_regimen, SelectedRegimen};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use steward_contracts::case::PatientCase;
    use steward_contracts::classification::{
        AllergyClassification, AllergySeverity, PregnancyState, Route,
    };
    use steward_contracts::error::{SafetyFilter, StewardError};
    use steward_kb::KnowledgeBase;

    use crate::select_regimen;

    fn kb() -> KnowledgeBase {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../guidelines");
        KnowledgeBase::load(std::path::Path::new(dir)).expect("shipped corpus must load")
    }

    fn case(value: serde_json::Value) -> PatientCase {
        serde_json::from_value(value).unwrap()
    }

    fn plain_case() -> PatientCase {
        case(json!({
            "age": 40, "sex": "male", "weight_kg": 80.0, "crcl": 80.0,
            "infection_type": "unused"
        }))
    }

    fn severe_pcn() -> AllergyClassification {
        serde_json::from_value(json!({
            "severity": "severe_pcn",
            "forbidden_classes": ["penicillin", "cephalosporin", "carbapenem"],
            "allowed_classes": ["monobactam", "glycopeptide", "fluoroquinolone"],
            "cross_reactivity_pct": 2.0
        }))
        .unwrap()
    }

    // ── First-survivor-wins over KB preference order ──────────────────────────

    #[test]
    fn no_allergy_pyelonephritis_selects_ceftriaxone() {
        let selected = select_regimen(
            &kb(),
            "pyelonephritis",
            &AllergyClassification::none(),
            PregnancyState::None,
            &plain_case(),
        )
        .unwrap();

        assert_eq!(selected.drug_ids, vec!["ceftriaxone"]);
        assert_eq!(selected.regimen_index, 0);
        assert_eq!(selected.routes, vec![Route::Iv]);
        assert_eq!(selected.indication_tag, "pyelonephritis");
        assert_eq!(selected.duration, "7-14 days");
    }

    #[test]
    fn severe_pcn_intra_abdominal_selects_the_triple_regimen() {
        let selected = select_regimen(
            &kb(),
            "intra_abdominal",
            &severe_pcn(),
            PregnancyState::None,
            &plain_case(),
        )
        .unwrap();

        assert_eq!(
            selected.drug_ids,
            vec!["aztreonam", "metronidazole", "vancomycin"]
        );
        // Every drug is given IV because the infection mandates it.
        assert!(selected.routes.iter().all(|r| *r == Route::Iv));
    }

    // ── Pregnancy filter ──────────────────────────────────────────────────────

    #[test]
    fn pregnancy_removes_the_fluoroquinolone_regimen() {
        let selected = select_regimen(
            &kb(),
            "pyelonephritis",
            &severe_pcn(),
            PregnancyState::Trimester2,
            &plain_case(),
        )
        .unwrap();

        // The ciprofloxacin regimen is preferred for severe PCN allergy, but
        // fluoroquinolones are contraindicated in pregnancy — the aztreonam
        // regimen is the survivor.
        assert_eq!(selected.drug_ids, vec!["aztreonam"]);
        assert!(!selected.pregnancy_soft_mismatch);
    }

    #[test]
    fn non_pregnant_severe_pcn_gets_the_fluoroquinolone() {
        let selected = select_regimen(
            &kb(),
            "pyelonephritis",
            &severe_pcn(),
            PregnancyState::None,
            &plain_case(),
        )
        .unwrap();
        assert_eq!(selected.drug_ids, vec!["ciprofloxacin"]);
    }

    #[test]
    fn trimester_specific_block_applies_only_to_that_trimester() {
        // Metronidazole is avoided in the first trimester only. The mild-PCN
        // intra-abdominal regimen contains it.
        let mild: AllergyClassification = serde_json::from_value(json!({
            "severity": "mild_pcn",
            "forbidden_classes": ["penicillin"],
            "allowed_classes": ["cephalosporin", "carbapenem"],
            "cross_reactivity_pct": 2.0
        }))
        .unwrap();

        let first = select_regimen(
            &kb(),
            "intra_abdominal",
            &mild,
            PregnancyState::Trimester1,
            &plain_case(),
        )
        .unwrap();
        assert!(
            !first.drug_ids.contains(&"metronidazole".to_string()),
            "first trimester must not receive metronidazole, got {:?}",
            first.drug_ids
        );

        let second = select_regimen(
            &kb(),
            "intra_abdominal",
            &mild,
            PregnancyState::Trimester2,
            &plain_case(),
        )
        .unwrap();
        assert_eq!(second.drug_ids, vec!["ceftriaxone", "metronidazole"]);
    }

    // ── Belt-and-braces forbidden-class filter ────────────────────────────────

    #[test]
    fn forbidden_class_filter_runs_even_for_matching_allergy_status() {
        // A synthetic classification whose status matches the no-allergy
        // regimen pool but forbids cephalosporins — as would happen if the KB
        // mislabeled a regimen. The ceftriaxone regimen must still be removed.
        let inconsistent: AllergyClassification = serde_json::from_value(json!({
            "severity": "none",
            "forbidden_classes": ["cephalosporin"],
            "allowed_classes": [],
            "cross_reactivity_pct": null
        }))
        .unwrap();

        let result = select_regimen(
            &kb(),
            "pyelonephritis",
            &inconsistent,
            PregnancyState::None,
            &plain_case(),
        );

        match result {
            Err(StewardError::NoRegimen { trace, .. }) => {
                assert!(trace
                    .removals
                    .iter()
                    .any(|r| r.filter == SafetyFilter::ForbiddenClass
                        && r.drug_ids == vec!["ceftriaxone"]));
            }
            other => panic!("expected NoRegimen, got {:?}", other.map(|s| s.drug_ids)),
        }
    }

    // ── MRSA risk gate ────────────────────────────────────────────────────────

    #[test]
    fn mrsa_gated_regimen_is_skipped_without_the_risk() {
        let selected = select_regimen(
            &kb(),
            "hap",
            &AllergyClassification::none(),
            PregnancyState::None,
            &plain_case(),
        )
        .unwrap();
        assert_eq!(selected.drug_ids, vec!["cefepime"]);
    }

    #[test]
    fn mrsa_risk_unlocks_the_gated_regimen() {
        let mut case = plain_case();
        case.risk_factors.push("mrsa_colonization".to_string());

        let selected = select_regimen(
            &kb(),
            "hap",
            &AllergyClassification::none(),
            PregnancyState::None,
            &case,
        )
        .unwrap();
        assert_eq!(selected.drug_ids, vec!["cefepime", "vancomycin"]);
    }

    // ── Route resolution ──────────────────────────────────────────────────────

    #[test]
    fn cystitis_resolves_to_oral_nitrofurantoin() {
        let selected = select_regimen(
            &kb(),
            "cystitis",
            &AllergyClassification::none(),
            PregnancyState::None,
            &plain_case(),
        )
        .unwrap();
        assert_eq!(selected.drug_ids, vec!["nitrofurantoin"]);
        assert_eq!(selected.routes, vec![Route::Po]);
    }

    // ── Structured refusal ────────────────────────────────────────────────────

    #[test]
    fn no_survivor_reports_every_removal() {
        // Severe PCN allergy plus pregnancy for a syndrome whose only
        // severe-safe regimen is a fluoroquinolone: cap.
        let result = select_regimen(
            &kb(),
            "cap",
            &severe_pcn(),
            PregnancyState::Trimester2,
            &plain_case(),
        );

        match result {
            Err(StewardError::NoRegimen { infection_category, trace }) => {
                assert_eq!(infection_category, "cap");
                // Two regimens removed by allergy status, one by pregnancy.
                assert_eq!(trace.removals.len(), 3);
                assert!(trace
                    .removals
                    .iter()
                    .any(|r| r.filter == SafetyFilter::Pregnancy));
                assert!(trace
                    .removals
                    .iter()
                    .filter(|r| r.filter == SafetyFilter::AllergyStatus)
                    .count()
                    >= 2);
            }
            other => panic!("expected NoRegimen, got {:?}", other.map(|s| s.drug_ids)),
        }
    }

    #[test]
    fn unknown_infection_surfaces() {
        assert!(matches!(
            select_regimen(
                &kb(),
                "plague",
                &AllergyClassification::none(),
                PregnancyState::None,
                &plain_case(),
            ),
            Err(StewardError::UnknownInfection { .. })
        ));
    }

    // ── Regimen allergy-status matching table ─────────────────────────────────

    #[test]
    fn multiple_allergy_draws_from_the_severe_pool() {
        let multiple: AllergyClassification = serde_json::from_value(json!({
            "severity": "multiple",
            "forbidden_classes": ["penicillin", "cephalosporin", "carbapenem", "sulfonamide"],
            "allowed_classes": ["monobactam", "glycopeptide"],
            "cross_reactivity_pct": 2.0
        }))
        .unwrap();

        let selected = select_regimen(
            &kb(),
            "bacteremia",
            &multiple,
            PregnancyState::None,
            &plain_case(),
        )
        .unwrap();
        assert_eq!(selected.drug_ids, vec!["aztreonam", "vancomycin"]);
    }
}
