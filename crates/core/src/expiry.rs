//! Expiry classification.
//!
//! Every place that shows or acts on an exam's status (dashboards, listings, the
//! notifier) goes through [`classify`]. It differences calendar days only: time of day
//! is dropped on both sides before subtracting, so an exam expiring today has
//! `days_to_expire == 0` no matter what time it is.
//!
//! "Today" is always a parameter. Use a [`crate::clock::Clock`] to obtain it.

use crate::exam::ExamRecord;
use chrono::{DateTime, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Compliance status of a single exam, recomputed on every read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    Valid,
    ExpiringSoon,
    Expired,
}

impl ExamStatus {
    /// Whether someone has to act on this exam.
    pub fn needs_attention(self) -> bool {
        matches!(self, ExamStatus::ExpiringSoon | ExamStatus::Expired)
    }

    /// pt-BR label, as shown to users.
    pub fn label(self) -> &'static str {
        match self {
            ExamStatus::Valid => "Válido",
            ExamStatus::ExpiringSoon => "Próximo do vencimento",
            ExamStatus::Expired => "Vencido",
        }
    }
}

impl std::fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExamStatus::Valid => "valid",
            ExamStatus::ExpiringSoon => "expiring_soon",
            ExamStatus::Expired => "expired",
        })
    }
}

/// Result of [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: ExamStatus,
    /// Whole calendar days until expiry; negative once expired.
    pub days_to_expire: i64,
}

/// Anything that denotes a calendar day.
///
/// Implemented for dates and for naive date-times (whose time of day is discarded).
/// Zoned instants must first be projected onto the reference offset with
/// [`calendar_day_in`], so that "today" and stored dates use the same calendar.
pub trait CalendarDay {
    fn calendar_day(&self) -> NaiveDate;
}

impl CalendarDay for NaiveDate {
    fn calendar_day(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<T: CalendarDay + ?Sized> CalendarDay for &T {
    fn calendar_day(&self) -> NaiveDate {
        (**self).calendar_day()
    }
}

/// The calendar day an instant falls on in the reference offset.
pub fn calendar_day_in<Tz: TimeZone>(instant: &DateTime<Tz>, reference: FixedOffset) -> NaiveDate {
    instant.with_timezone(&reference).date_naive()
}

/// Classifies an exam expiring on `expiry_date` as seen on `today`.
///
/// - `days_to_expire < 0` → [`ExamStatus::Expired`]
/// - `0 ≤ days_to_expire ≤ alert_threshold_days` → [`ExamStatus::ExpiringSoon`]
/// - otherwise → [`ExamStatus::Valid`]
pub fn classify(
    expiry_date: impl CalendarDay,
    alert_threshold_days: u32,
    today: impl CalendarDay,
) -> Classification {
    let days_to_expire = (expiry_date.calendar_day() - today.calendar_day()).num_days();

    let status = if days_to_expire < 0 {
        ExamStatus::Expired
    } else if days_to_expire <= i64::from(alert_threshold_days) {
        ExamStatus::ExpiringSoon
    } else {
        ExamStatus::Valid
    };

    Classification {
        status,
        days_to_expire,
    }
}

/// Days that make up one year of validity.
const DAYS_PER_VALIDITY_YEAR: u32 = 365;

/// Expiry date for an exam realized on `realization_date` and valid for `validity_days`.
///
/// No extra day is added. Each whole block of 365 days counts as one calendar year, so
/// an annual exam falls due on its anniversary even across a leap day: 2024-01-01 + 365
/// is 2025-01-01 and 2023-01-01 + 365 is 2024-01-01. Leftover days are added as plain
/// calendar days. An anniversary landing on a missing Feb 29 moves back to Feb 28. The
/// result saturates at the latest representable date.
pub fn derive_expiry_date(realization_date: NaiveDate, validity_days: u32) -> NaiveDate {
    let years = validity_days / DAYS_PER_VALIDITY_YEAR;
    let days = validity_days % DAYS_PER_VALIDITY_YEAR;
    realization_date
        .checked_add_months(Months::new(years.saturating_mul(12)))
        .and_then(|anniversary| anniversary.checked_add_days(Days::new(u64::from(days))))
        .unwrap_or(NaiveDate::MAX)
}

/// An exam record with its status as of a given day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedExamView {
    #[serde(flatten)]
    pub record: ExamRecord,
    pub status: ExamStatus,
    pub days_to_expire: i64,
}

impl DerivedExamView {
    pub fn derive(record: ExamRecord, alert_threshold_days: u32, today: NaiveDate) -> Self {
        let Classification {
            status,
            days_to_expire,
        } = classify(record.expiry_date, alert_threshold_days, today);

        Self {
            record,
            status,
            days_to_expire,
        }
    }
}
