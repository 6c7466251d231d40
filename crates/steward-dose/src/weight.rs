//! Body-weight selection for weight-based dosing.
//!
//! The rules, in order:
//! - no height on the case → total body weight, marked `tbw`;
//! - drug-specific KB override first (e.g. AdjBW when BMI ≥ 35);
//! - TBW below IBW → TBW (never dose a cachectic patient by ideal weight);
//! - TBW above 1.2 × IBW → adjusted body weight;
//! - otherwise IBW.

use steward_contracts::case::Sex;
use steward_contracts::classification::WeightSource;
use steward_kb::drug::WeightPolicy;

/// Devine ideal body weight in kg. 50 kg (male) / 45.5 kg (female) plus
/// 2.3 kg per inch of height over 60 inches; never below the base value.
pub fn ideal_body_weight(sex: Sex, height_cm: f64) -> f64 {
    let inches_over_60 = (height_cm / 2.54 - 60.0).max(0.0);
    let base = match sex {
        Sex::Male => 50.0,
        Sex::Female => 45.5,
    };
    base + 2.3 * inches_over_60
}

/// Adjusted body weight: IBW + 0.4 × (TBW − IBW).
pub fn adjusted_body_weight(ibw: f64, tbw: f64) -> f64 {
    ibw + 0.4 * (tbw - ibw)
}

pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let meters = height_cm / 100.0;
    weight_kg / (meters * meters)
}

/// Choose the weight to dose by.
pub fn select_weight(
    sex: Sex,
    weight_kg: f64,
    height_cm: Option<f64>,
    policy: Option<WeightPolicy>,
) -> (f64, WeightSource) {
    let Some(height) = height_cm else {
        return (weight_kg, WeightSource::Tbw);
    };

    let ibw = ideal_body_weight(sex, height);

    if let Some(WeightPolicy::AdjbwIfBmiGe35) = policy {
        if bmi(weight_kg, height) >= 35.0 {
            return (adjusted_body_weight(ibw, weight_kg), WeightSource::Adjbw);
        }
    }

    if weight_kg < ibw {
        (weight_kg, WeightSource::Tbw)
    } else if weight_kg > 1.2 * ibw {
        (adjusted_body_weight(ibw, weight_kg), WeightSource::Adjbw)
    } else {
        (ibw, WeightSource::Ibw)
    }
}
