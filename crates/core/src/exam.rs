//! Exam records, exam types and procedures.
//!
//! An [`ExamRecord`] stores what the user registered: the realization date, the validity
//! (or an explicit expiry date) and the resulting expiry date. Status and days-to-expire
//! are never stored; see [`crate::expiry`].

use crate::constants::DEFAULT_ALERT_THRESHOLD_DAYS;
use crate::money::Money;
use crate::validation::{parse_date, parse_optional_date, resolve_expiry};
use crate::{ExamError, ExamResult};
use chrono::NaiveDate;
use exames_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// A category of medical exam or certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExamType {
    pub id: String,
    pub name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Days before expiry at which the exam becomes "expiring soon".
    ///
    /// `None` means [`DEFAULT_ALERT_THRESHOLD_DAYS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_threshold_days: Option<u32>,
}

impl ExamType {
    /// The effective alert threshold, substituting the 30-day default when unset.
    pub fn alert_threshold_days(&self) -> u32 {
        self.alert_threshold_days
            .unwrap_or(DEFAULT_ALERT_THRESHOLD_DAYS)
    }
}

/// A procedure covered by certificate-style exams (e.g. "NR-35", "NR-10").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Procedure {
    pub id: String,
    pub name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A single registered exam.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExamRecord {
    pub id: String,
    pub colaborador_id: String,
    pub exam_type_id: String,
    /// Procedures covered by this exam, in whatever order they were captured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub procedure_ids: Vec<String>,
    pub realization_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_days: Option<u32>,
    pub expiry_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AsRef<ExamRecord> for ExamRecord {
    fn as_ref(&self) -> &ExamRecord {
        self
    }
}

impl ExamRecord {
    /// Creates the next record for the same colaborador, type and procedures.
    ///
    /// The old record is left untouched and becomes history once this one is stored.
    /// When `validity_days` is `None` the previous validity is reused; if the previous
    /// record only had an explicit expiry date, its span in days is reused instead.
    ///
    /// # Errors
    ///
    /// Returns a validation error under the same rules as registration, e.g. a validity
    /// above [`crate::validation::MAX_VALIDITY_DAYS`].
    pub fn renew(
        &self,
        id: String,
        realization_date: NaiveDate,
        validity_days: Option<u32>,
    ) -> ExamResult<ExamRecord> {
        let validity = validity_days
            .or(self.validity_days)
            .unwrap_or_else(|| self.span_days());
        let expiry_date = resolve_expiry(realization_date, Some(validity), None)?;

        Ok(ExamRecord {
            id,
            colaborador_id: self.colaborador_id.clone(),
            exam_type_id: self.exam_type_id.clone(),
            procedure_ids: self.procedure_ids.clone(),
            realization_date,
            validity_days: Some(validity),
            expiry_date,
            value: None,
            notes: None,
        })
    }

    /// Applies an edit.
    ///
    /// The expiry date is recomputed only when the realization date or the validity
    /// changed. An explicit expiry date without a validity detaches the record from
    /// its validity (the stored expiry becomes authoritative).
    ///
    /// # Errors
    ///
    /// Returns a validation error if an explicit expiry disagrees with a validity sent
    /// in the same update, or if the resulting expiry precedes the realization date.
    pub fn apply_update(&mut self, update: ExamUpdate) -> ExamResult<()> {
        let realization_date = match update.realization_date.as_deref() {
            Some(raw) => parse_date("realization_date", raw)?,
            None => self.realization_date,
        };
        let explicit_expiry = parse_optional_date("expiry_date", update.expiry_date.as_deref())?;
        let source_changed =
            realization_date != self.realization_date || update.validity_days.is_some();

        let (validity_days, expiry_date) = match (explicit_expiry, update.validity_days) {
            (Some(_), Some(_)) | (None, Some(_)) => {
                let expiry =
                    resolve_expiry(realization_date, update.validity_days, explicit_expiry)?;
                (update.validity_days, expiry)
            }
            (Some(explicit), None) => (None, resolve_expiry(realization_date, None, Some(explicit))?),
            (None, None) => match self.validity_days {
                Some(days) if source_changed => {
                    (Some(days), resolve_expiry(realization_date, Some(days), None)?)
                }
                _ => (
                    self.validity_days,
                    resolve_expiry(realization_date, None, Some(self.expiry_date))?,
                ),
            },
        };

        self.realization_date = realization_date;
        self.validity_days = validity_days;
        self.expiry_date = expiry_date;

        if let Some(procedure_ids) = update.procedure_ids {
            self.procedure_ids = procedure_ids;
        }
        if let Some(value) = update.value {
            self.value = Some(value);
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes).filter(|n| !n.trim().is_empty());
        }

        Ok(())
    }

    /// Days between realization and expiry (never negative).
    pub fn span_days(&self) -> u32 {
        let days = (self.expiry_date - self.realization_date).num_days();
        u32::try_from(days.max(0)).unwrap_or(u32::MAX)
    }
}

/// Input for registering an exam, as captured by a form or the CLI.
///
/// Dates are raw `YYYY-MM-DD` strings; [`NewExam::into_record`] validates them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewExam {
    pub colaborador_id: String,
    pub exam_type_id: String,
    #[serde(default)]
    pub procedure_ids: Vec<String>,
    pub realization_date: String,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub value: Option<Money>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewExam {
    /// Validates the input and builds the record to persist.
    ///
    /// # Errors
    ///
    /// Returns a validation error if ids are blank, the realization date is missing or
    /// malformed, neither validity nor expiry is given, or they disagree.
    pub fn into_record(self, id: String) -> ExamResult<ExamRecord> {
        if self.colaborador_id.trim().is_empty() {
            return Err(ExamError::InvalidInput("colaborador_id is required".into()));
        }
        if self.exam_type_id.trim().is_empty() {
            return Err(ExamError::InvalidInput("exam_type_id is required".into()));
        }
        if self.procedure_ids.iter().any(|p| p.trim().is_empty()) {
            return Err(ExamError::InvalidInput(
                "procedure ids cannot be blank".into(),
            ));
        }

        let realization_date = parse_date("realization_date", &self.realization_date)?;
        let explicit_expiry = parse_optional_date("expiry_date", self.expiry_date.as_deref())?;
        let expiry_date = resolve_expiry(realization_date, self.validity_days, explicit_expiry)?;

        Ok(ExamRecord {
            id,
            colaborador_id: self.colaborador_id.trim().to_string(),
            exam_type_id: self.exam_type_id.trim().to_string(),
            procedure_ids: self
                .procedure_ids
                .into_iter()
                .map(|p| p.trim().to_string())
                .collect(),
            realization_date,
            validity_days: self.validity_days,
            expiry_date,
            value: self.value,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Partial edit of an existing exam. `None` fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamUpdate {
    #[serde(default)]
    pub realization_date: Option<String>,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub procedure_ids: Option<Vec<String>>,
    #[serde(default)]
    pub value: Option<Money>,
    #[serde(default)]
    pub notes: Option<String>,
}
