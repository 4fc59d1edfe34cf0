//! Validation and normalization of SLO availability targets
//!
//! Targets are parsed as arbitrary-precision decimals so that values like
//! "0.99999995" survive unchanged into the alert expressions.

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::controller::error::{Error, Result};
use crate::crd::SloSpec;

/// Exclusive lower bound of an availability target (0.9)
pub fn min_availability() -> BigDecimal {
    BigDecimal::new(9.into(), 1)
}

/// Inclusive upper bound of an availability target (1.0)
pub fn max_availability() -> BigDecimal {
    BigDecimal::new(1.into(), 0)
}

/// SLO values ready to be rendered into a PrometheusRule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSlo {
    /// Availability target, e.g. "0.9995"
    pub target: String,
    /// Allowed failure ratio, `1 - target`, e.g. "0.0005"
    pub error_budget: String,
}

/// Parse an availability target and check it lies in (0.9, 1.0]
pub fn validate_availability(text: &str) -> Result<BigDecimal> {
    let value = BigDecimal::from_str(text).map_err(|_| {
        Error::InvalidSlo(format!("target availability {:?} is not a decimal", text))
    })?;

    if value <= min_availability() {
        return Err(Error::InvalidSlo(format!(
            "target availability {} must be greater than {}",
            text,
            min_availability()
        )));
    }

    if value > max_availability() {
        return Err(Error::InvalidSlo(format!(
            "target availability {} must not exceed {}",
            text,
            max_availability()
        )));
    }

    Ok(value)
}

pub fn is_valid_availability(text: &str) -> bool {
    validate_availability(text).is_ok()
}

/// Validate an SLO and derive the values embedded in the alert rule
pub fn normalize_slo(slo: &SloSpec) -> Result<NormalizedSlo> {
    let target = validate_availability(&slo.target_availability_percentile)?;
    let error_budget = max_availability() - &target;

    Ok(NormalizedSlo {
        target: to_plain_string(&target),
        error_budget: to_plain_string(&error_budget),
    })
}

/// Render a decimal without exponent and without trailing zeros
fn to_plain_string(value: &BigDecimal) -> String {
    let (digits, scale) = value.normalized().as_bigint_and_exponent();
    let digits = digits.to_string();
    let (sign, abs) = match digits.strip_prefix('-') {
        Some(abs) => ("-", abs),
        None => ("", digits.as_str()),
    };

    if scale <= 0 {
        let zeros = "0".repeat(scale.unsigned_abs() as usize);
        if abs == "0" {
            return "0".to_string();
        }
        return format!("{}{}{}", sign, abs, zeros);
    }

    let scale = scale as usize;
    let padded = if abs.len() <= scale {
        format!("{}{}", "0".repeat(scale - abs.len() + 1), abs)
    } else {
        abs.to_string()
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{}{}.{}", sign, int_part, frac_part)
}
