//! Field validation shared by the entity drafts.

use crate::models::properties::{PropertyMap, all_finite};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of an entity `code`.
pub const CODE_MAX_LEN: usize = 50;
/// Maximum length of an entity `name`.
pub const NAME_MAX_LEN: usize = 200;

/// `NNNNNNN-NN-N` with 2 to 7 leading digits.
static CAS_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{2,7})-(\d{2})-(\d)$").ok());

/// Requires a non-blank value no longer than `max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    bounded_text(field, value, max)
}

/// Requires a value no longer than `max` characters.
pub fn bounded_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

/// Requires an optional number to be finite.
pub fn finite(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(Error::validation(field, "must be a finite number")),
        _ => Ok(()),
    }
}

/// Requires a composition weight ratio to be finite and non-negative.
pub fn weight_ratio(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(
            "weight_ratio",
            "must be a finite, non-negative percentage",
        ));
    }
    Ok(())
}

/// Requires every number in a property map to be finite.
pub fn properties(field: &str, map: &PropertyMap) -> Result<()> {
    if all_finite(map) {
        Ok(())
    } else {
        Err(Error::validation(field, "numeric values must be finite"))
    }
}

/// Accepts an empty string or a CAS registry number with a valid check digit.
pub fn cas_number(value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if !is_valid_cas(value) {
        return Err(Error::validation(
            "cas_number",
            format!("'{value}' is not a valid CAS registry number"),
        ));
    }
    Ok(())
}

/// Checks the CAS format and check digit.
///
/// The check digit is the sum of the other digits, each weighted by its
/// position counted from the right, modulo 10.
fn is_valid_cas(value: &str) -> bool {
    let Some(caps) = CAS_PATTERN.as_ref().and_then(|re| re.captures(value)) else {
        return false;
    };
    let body = format!("{}{}", &caps[1], &caps[2]);
    let Some(check) = caps[3].chars().next().and_then(|c| c.to_digit(10)) else {
        return false;
    };
    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip(1..)
        .map(|(digit, weight)| digit * weight)
        .sum();
    sum % 10 == check
}
