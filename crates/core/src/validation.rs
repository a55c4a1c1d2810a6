//! Input validation utilities.
//!
//! Dates and validity inputs are checked here, before anything reaches the expiry
//! engine. The engine itself assumes well-formed calendar dates.

use crate::constants::DATE_INPUT_FORMAT;
use crate::expiry::derive_expiry_date;
use crate::{ExamError, ExamResult};
use chrono::NaiveDate;

/// Upper bound on validity, in days. Longer spans are almost certainly typos.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Parses a strict `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `ExamError::InvalidDate` naming `field` if the value is blank or malformed.
pub fn parse_date(field: &'static str, value: &str) -> ExamResult<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, DATE_INPUT_FORMAT)
        .ok()
        .filter(|_| trimmed.len() == 10)
        .ok_or_else(|| ExamError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

/// Parses an optional date, treating blank input as absent.
pub fn parse_optional_date(field: &'static str, value: Option<&str>) -> ExamResult<Option<NaiveDate>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_date(field, v))
        .transpose()
}

/// Resolves the expiry date to persist from the registration inputs.
///
/// Exactly one rule applies everywhere (form preview and persisted value alike):
/// - validity only: `realization + validity` days;
/// - explicit expiry only: the explicit date;
/// - both: they must agree, otherwise `ExamError::ExpiryMismatch`.
///
/// # Errors
///
/// Returns `ExamError::InvalidInput` if neither is given, the validity exceeds
/// [`MAX_VALIDITY_DAYS`], or the expiry precedes the realization date.
pub fn resolve_expiry(
    realization_date: NaiveDate,
    validity_days: Option<u32>,
    explicit_expiry: Option<NaiveDate>,
) -> ExamResult<NaiveDate> {
    if let Some(days) = validity_days {
        if days > MAX_VALIDITY_DAYS {
            return Err(ExamError::InvalidInput(format!(
                "validity_days exceeds maximum of {MAX_VALIDITY_DAYS} days"
            )));
        }
    }

    let expiry = match (validity_days, explicit_expiry) {
        (None, None) => {
            return Err(ExamError::InvalidInput(
                "either validity_days or expiry_date is required".into(),
            ))
        }
        (Some(days), None) => derive_expiry_date(realization_date, days),
        (None, Some(explicit)) => explicit,
        (Some(days), Some(explicit)) => {
            let derived = derive_expiry_date(realization_date, days);
            if derived != explicit {
                return Err(ExamError::ExpiryMismatch { explicit, derived });
            }
            derived
        }
    };

    if expiry < realization_date {
        return Err(ExamError::InvalidInput(format!(
            "expiry date {expiry} precedes realization date {realization_date}"
        )));
    }

    Ok(expiry)
}

/// Expiry date a registration form would show for raw inputs.
///
/// Goes through [`resolve_expiry`], so the preview always equals what would be stored.
pub fn preview_expiry(
    realization_date: &str,
    validity_days: Option<u32>,
    expiry_date: Option<&str>,
) -> ExamResult<NaiveDate> {
    let realization_date = parse_date("realization_date", realization_date)?;
    let explicit_expiry = parse_optional_date("expiry_date", expiry_date)?;
    resolve_expiry(realization_date, validity_days, explicit_expiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_iso_dates_with_surrounding_whitespace() {
        assert_eq!(parse_date("d", " 2024-06-01 ").unwrap(), date("2024-06-01"));
    }

    #[test]
    fn rejects_non_iso_or_impossible_dates() {
        for bad in ["", "2024-6-1", "01/06/2024", "2024-02-30", "2024-06-01T10:00"] {
            let err = parse_date("realization_date", bad).unwrap_err();
            assert!(
                matches!(err, ExamError::InvalidDate { field: "realization_date", .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn blank_optional_date_is_absent() {
        assert_eq!(parse_optional_date("expiry_date", Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_date("expiry_date", None).unwrap(), None);
    }

    #[test]
    fn resolve_uses_plain_day_addition() {
        let expiry = resolve_expiry(date("2024-01-01"), Some(365), None).unwrap();
        assert_eq!(expiry, date("2025-01-01"));
    }

    #[test]
    fn resolve_accepts_agreeing_inputs() {
        let expiry =
            resolve_expiry(date("2024-01-01"), Some(365), Some(date("2025-01-01"))).unwrap();
        assert_eq!(expiry, date("2025-01-01"));
    }

    #[test]
    fn resolve_rejects_off_by_one_expiry() {
        let err = resolve_expiry(date("2024-01-01"), Some(365), Some(date("2025-01-02")))
            .unwrap_err();
        match err {
            ExamError::ExpiryMismatch { explicit, derived } => {
                assert_eq!(explicit, date("2025-01-02"));
                assert_eq!(derived, date("2025-01-01"));
            }
            other => panic!("expected ExpiryMismatch, got {other:?}"),
        }
    }

    #[test]
    fn resolve_rejects_missing_inputs_and_huge_validity() {
        assert!(resolve_expiry(date("2024-01-01"), None, None).is_err());
        assert!(resolve_expiry(date("2024-01-01"), Some(MAX_VALIDITY_DAYS + 1), None).is_err());
    }

    #[test]
    fn resolve_allows_zero_validity_and_past_expiry() {
        assert_eq!(
            resolve_expiry(date("2020-01-01"), Some(0), None).unwrap(),
            date("2020-01-01")
        );
    }

    #[test]
    fn preview_matches_persisted_rule() {
        assert_eq!(
            preview_expiry("2024-01-01", Some(365), None).unwrap(),
            date("2025-01-01")
        );
        assert_eq!(
            preview_expiry("2024-01-01", None, Some("2024-03-01")).unwrap(),
            date("2024-03-01")
        );
        assert!(preview_expiry("2024-13-01", Some(1), None).is_err());
    }
}
