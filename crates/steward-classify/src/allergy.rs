//! Allergy classification.
//!
//! Reduces a free-text allergy description to a severity plus the exact set
//! of forbidden drug classes the selector filters against. Rules are scanned
//! in KB order — severe rules are listed before mild, so the first match
//! governs. Unmatched non-empty text defaults to severe: misreading
//! "anafylaxis" as no allergy is the failure mode this system exists to
//! prevent.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use steward_contracts::classification::{AllergyClassification, AllergySeverity};
use steward_kb::modifiers::{AllergyRule, AllergyRules};

const BUILTIN_NONE_TOKENS: &[&str] = &["none", "nkda", "no known drug allergy", "no known allergies"];

/// Classify an allergy description against the ordered rule table.
///
/// `conservative_default` controls the treatment of non-empty text that
/// matches no rule: `true` (the clinical default) classifies it as severe
/// penicillin allergy with an explanatory note; `false` classifies it as no
/// allergy, still with a note, so the decision is visible either way.
pub fn classify(
    rules: &AllergyRules,
    text: Option<&str>,
    conservative_default: bool,
) -> AllergyClassification {
    let raw = text.unwrap_or("").trim();
    if raw.is_empty() || is_none_token(rules, raw) {
        return AllergyClassification::none();
    }

    let lowered = raw.to_lowercase();

    // Scan in declared order, collecting every matching rule. The first
    // match is primary; matches of other severities upgrade to Multiple.
    let mut matched: Vec<(&AllergyRule, &str)> = Vec::new();
    for rule in &rules.rules {
        if let Some(keyword) = rule
            .keyword_list
            .iter()
            .find(|kw| lowered.contains(&kw.to_lowercase()))
        {
            matched.push((rule, keyword.as_str()));
        }
    }

    if matched.is_empty() {
        return unmatched_fallback(rules, raw, conservative_default);
    }

    let (primary, primary_keyword) = matched[0];
    let mut notes: Vec<String> = matched
        .iter()
        .map(|(rule, kw)| format!("matched '{}' ({})", kw, rule.severity))
        .collect();

    // The first match is primary. A later match only changes the
    // classification when it forbids a class the accumulated set does not
    // already cover — severe-PCN text also matching the mild-PCN rule stays
    // severe, while a genuine second drug family upgrades to Multiple.
    let mut severity = primary.severity;
    let mut forbidden = to_set(&primary.forbidden_classes);
    let mut allowed = to_set(&primary.allowed_classes);

    for (rule, _) in &matched[1..] {
        let adds_new_class = rule
            .forbidden_classes
            .iter()
            .any(|c| !forbidden.contains(c));
        if !adds_new_class {
            continue;
        }
        severity = AllergySeverity::Multiple;
        forbidden.extend(rule.forbidden_classes.iter().cloned());
        let other = to_set(&rule.allowed_classes);
        allowed = allowed.intersection(&other).cloned().collect();
    }

    if severity == AllergySeverity::Multiple {
        allowed = allowed.difference(&forbidden).cloned().collect();
        notes.push("multiple distinct allergy patterns; forbidden sets combined".to_string());
        warn!(text = raw, "allergy text spans multiple drug families; classified as multiple");
    } else {
        debug!(severity = %severity, keyword = primary_keyword, "allergy classified");
    }

    AllergyClassification {
        severity,
        forbidden_classes: forbidden,
        allowed_classes: allowed,
        cross_reactivity_pct: primary.cross_reactivity_pct,
        notes,
        conservative_fallback: false,
    }
}

fn unmatched_fallback(
    rules: &AllergyRules,
    raw: &str,
    conservative_default: bool,
) -> AllergyClassification {
    if !conservative_default {
        warn!(text = raw, "allergy text matched no rule; conservative default disabled");
        let mut classification = AllergyClassification::none();
        classification
            .notes
            .push("no explicit allergy pattern matched; conservative default disabled".to_string());
        classification.conservative_fallback = true;
        return classification;
    }

    // Borrow the severe-PCN rule's forbidden set so the conservative default
    // stays KB-driven; fall back to the union of every rule's forbidden set
    // if the table has no severe-PCN entry.
    let severe = rules
        .rules
        .iter()
        .find(|r| r.severity == AllergySeverity::SeverePcn);
    let (forbidden, allowed) = match severe {
        Some(rule) => (to_set(&rule.forbidden_classes), to_set(&rule.allowed_classes)),
        None => (
            rules
                .rules
                .iter()
                .flat_map(|r| r.forbidden_classes.iter().cloned())
                .collect(),
            BTreeSet::new(),
        ),
    };

    warn!(text = raw, "allergy text matched no rule; treating as severe (conservative default)");

    AllergyClassification {
        severity: AllergySeverity::SeverePcn,
        forbidden_classes: forbidden,
        allowed_classes: allowed,
        cross_reactivity_pct: None,
        notes: vec![
            "no explicit allergy pattern matched — treated conservatively as severe".to_string(),
        ],
        conservative_fallback: true,
    }
}

fn is_none_token(rules: &AllergyRules, raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    rules
        .none_tokens
        .iter()
        .map(String::as_str)
        .chain(BUILTIN_NONE_TOKENS.iter().copied())
        .any(|token| lowered == token)
}

fn to_set(classes: &[String]) -> BTreeSet<String> {
    classes.iter().cloned().collect()
}
