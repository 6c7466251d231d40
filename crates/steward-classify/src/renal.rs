//! Renal banding and creatinine-clearance estimation.
//!
//! Dialysis markers on the case win over any numeric CrCl: a patient on HD
//! is dosed by the HD band no matter what the formula says.

use tracing::debug;

use steward_contracts::case::{PatientCase, Sex};
use steward_contracts::classification::CrclBand;
use steward_contracts::error::{StewardError, StewardResult};

/// The resolved renal state for a case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenalState {
    pub band: CrclBand,
    /// The CrCl value used for banding. Zero for dialysis bands, where the
    /// numeric value has no dosing meaning.
    pub crcl: f64,
}

/// Band the case's renal function.
///
/// Resolution order: CVVHDF markers, then HD markers, then the supplied
/// `crcl`, then Cockcroft-Gault from serum creatinine. A case with none of
/// these is invalid.
pub fn renal_state(case: &PatientCase, scr_floor: Option<f64>) -> StewardResult<RenalState> {
    if case.has_risk_factor("cvvhdf") || case.has_risk_factor("crrt") || case.has_risk_factor("cvvh")
    {
        return Ok(RenalState { band: CrclBand::Cvvhdf, crcl: 0.0 });
    }
    // "hd" must be a whole token — substring matching would catch "chd".
    let bare_hd = case
        .risk_factors
        .iter()
        .any(|rf| rf.to_lowercase().trim() == "hd");
    if case.has_risk_factor("dialysis") || bare_hd {
        return Ok(RenalState { band: CrclBand::Hd, crcl: 0.0 });
    }

    let crcl = match case.crcl {
        Some(value) => value,
        None => match case.serum_creatinine {
            Some(scr) => cockcroft_gault(case.age, case.sex, case.weight_kg, scr, scr_floor)?,
            None => {
                return Err(StewardError::BadCase {
                    reason: "neither crcl nor serum_creatinine provided".to_string(),
                })
            }
        },
    };

    if crcl < 0.0 {
        return Err(StewardError::BadCase {
            reason: format!("crcl {} is negative", crcl),
        });
    }

    let band = band_for(crcl);
    debug!(crcl, band = %band, "renal function banded");
    Ok(RenalState { band, crcl })
}

/// Numeric banding. Boundaries are inclusive on the low side of each band:
/// 50 falls in 30–50, 30 falls in 30–50, 10 falls in 10–29.
pub fn band_for(crcl: f64) -> CrclBand {
    if crcl > 50.0 {
        CrclBand::CrclGt50
    } else if crcl >= 30.0 {
        CrclBand::Crcl30_50
    } else if crcl >= 10.0 {
        CrclBand::Crcl10_29
    } else {
        CrclBand::CrclLt10
    }
}

/// Cockcroft-Gault creatinine clearance.
///
/// `CrCl = (140 − age) × weight / (72 × SCr)`, multiplied by 0.85 for
/// female patients. The serum creatinine is used unrounded; deployments
/// that prefer a floor (commonly 0.7 or 1.0 mg/dL for elderly patients
/// with low muscle mass) configure `cockcroft_gault_scr_floor`.
pub fn cockcroft_gault(
    age: u32,
    sex: Sex,
    weight_kg: f64,
    serum_creatinine: f64,
    scr_floor: Option<f64>,
) -> StewardResult<f64> {
    if serum_creatinine <= 0.0 {
        return Err(StewardError::BadCase {
            reason: format!("serum_creatinine {} is not positive", serum_creatinine),
        });
    }
    if age > 140 {
        return Err(StewardError::BadCase {
            reason: format!("age {} is not plausible", age),
        });
    }

    let scr = match scr_floor {
        Some(floor) => serum_creatinine.max(floor),
        None => serum_creatinine,
    };

    let base = (140.0 - age as f64) * weight_kg / (72.0 * scr);
    let crcl = match sex {
        Sex::Male => base,
        Sex::Female => base * 0.85,
    };
    Ok(crcl.max(0.0))
}
