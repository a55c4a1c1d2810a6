//! Wire types for the REST API.
//!
//! Dates travel as `YYYY-MM-DD` strings and money as reais; the core types stay free of
//! OpenAPI concerns.

use chrono::NaiveDate;
use exames_core::constants::DATE_INPUT_FORMAT;
use exames_core::dashboard::{DashboardSummary, ListingEntry, ProcedureCell, ProcedureMatrix};
use exames_core::notification::{NotificationLine, NotificationReport, TenantReport};
use exames_core::{
    AttentionItem, ExamRecord, ExamUpdate, Money, NewExam, TenantNotification, TenantOutcome,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn day(date: NaiveDate) -> String {
    date.format(DATE_INPUT_FORMAT).to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Query parameters shared by read endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TodayQuery {
    /// Evaluate as of this day (YYYY-MM-DD) instead of the server clock.
    pub today: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExamsQuery {
    /// Evaluate as of this day (YYYY-MM-DD) instead of the server clock.
    pub today: Option<String>,
    /// Only list this colaborador's exams.
    pub colaborador: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttentionItemRes {
    pub exam_id: String,
    pub colaborador_id: String,
    pub colaborador_name: String,
    pub exam_label: String,
    pub expiry_date: String,
    pub days_to_expire: i64,
    pub status: String,
    pub is_overdue: bool,
}

impl From<AttentionItem> for AttentionItemRes {
    fn from(item: AttentionItem) -> Self {
        Self {
            exam_id: item.view.record.id,
            colaborador_id: item.colaborador_id,
            colaborador_name: item.colaborador_name,
            exam_label: item.exam_label,
            expiry_date: day(item.expiry_date),
            days_to_expire: item.view.days_to_expire,
            status: item.view.status.to_string(),
            is_overdue: item.is_overdue,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardRes {
    pub generated_on: String,
    pub active_colaboradores: usize,
    pub active_exams: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    pub total_cost: f64,
    /// Total cost formatted as Brazilian Real, e.g. `R$ 1.234,56`.
    pub total_cost_display: String,
    pub attention: Vec<AttentionItemRes>,
}

impl From<DashboardSummary> for DashboardRes {
    fn from(summary: DashboardSummary) -> Self {
        Self {
            generated_on: day(summary.generated_on),
            active_colaboradores: summary.active_colaboradores,
            active_exams: summary.active_exams,
            expiring_soon: summary.expiring_soon,
            expired: summary.expired,
            total_cost: summary.total_cost.as_reais(),
            total_cost_display: summary.total_cost.format_brl(),
            attention: summary.attention.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcedureRes {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcedureCellRes {
    pub exam_id: String,
    pub exam_label: String,
    pub expiry_date: String,
    pub status: String,
    pub days_to_expire: i64,
}

impl From<ProcedureCell> for ProcedureCellRes {
    fn from(cell: ProcedureCell) -> Self {
        Self {
            exam_id: cell.exam_id,
            exam_label: cell.exam_label,
            expiry_date: day(cell.expiry_date),
            status: cell.status.to_string(),
            days_to_expire: cell.days_to_expire,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MatrixRowRes {
    pub colaborador_id: String,
    pub colaborador_name: String,
    /// Aligned with `procedures`; `null` where the procedure was never covered.
    pub cells: Vec<Option<ProcedureCellRes>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcedureMatrixRes {
    pub generated_on: String,
    pub procedures: Vec<ProcedureRes>,
    pub rows: Vec<MatrixRowRes>,
}

impl From<ProcedureMatrix> for ProcedureMatrixRes {
    fn from(matrix: ProcedureMatrix) -> Self {
        Self {
            generated_on: day(matrix.generated_on),
            procedures: matrix
                .procedures
                .into_iter()
                .map(|p| ProcedureRes {
                    id: p.id,
                    name: p.name.to_string(),
                })
                .collect(),
            rows: matrix
                .rows
                .into_iter()
                .map(|row| MatrixRowRes {
                    colaborador_id: row.colaborador_id,
                    colaborador_name: row.colaborador_name,
                    cells: row
                        .cells
                        .into_iter()
                        .map(|cell| cell.map(Into::into))
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExamRes {
    pub id: String,
    pub colaborador_id: String,
    pub exam_type_id: String,
    pub procedure_ids: Vec<String>,
    pub realization_date: String,
    pub validity_days: Option<u32>,
    pub expiry_date: String,
    pub value: Option<f64>,
    pub notes: Option<String>,
}

impl From<ExamRecord> for ExamRes {
    fn from(record: ExamRecord) -> Self {
        Self {
            id: record.id,
            colaborador_id: record.colaborador_id,
            exam_type_id: record.exam_type_id,
            procedure_ids: record.procedure_ids,
            realization_date: day(record.realization_date),
            validity_days: record.validity_days,
            expiry_date: day(record.expiry_date),
            value: record.value.map(|v| v.as_reais()),
            notes: record.notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExamEntryRes {
    #[serde(flatten)]
    pub exam: ExamRes,
    pub colaborador_name: String,
    pub exam_label: String,
    pub status: String,
    pub days_to_expire: i64,
    /// Whether this is the active record of its group.
    pub active: bool,
}

impl From<ListingEntry> for ExamEntryRes {
    fn from(entry: ListingEntry) -> Self {
        Self {
            status: entry.view.status.to_string(),
            days_to_expire: entry.view.days_to_expire,
            exam: entry.view.record.into(),
            colaborador_name: entry.colaborador_name,
            exam_label: entry.exam_label,
            active: entry.active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListExamsRes {
    pub exams: Vec<ExamEntryRes>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterExamReq {
    pub colaborador_id: String,
    pub exam_type_id: String,
    #[serde(default)]
    pub procedure_ids: Vec<String>,
    pub realization_date: String,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    /// Cost in reais.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RegisterExamReq {
    /// Converts to the core input; `None` if `value` is not a finite amount.
    pub fn into_new_exam(self) -> Option<NewExam> {
        let value = match self.value {
            Some(reais) => Some(Money::from_reais(reais)?),
            None => None,
        };
        Some(NewExam {
            colaborador_id: self.colaborador_id,
            exam_type_id: self.exam_type_id,
            procedure_ids: self.procedure_ids,
            realization_date: self.realization_date,
            validity_days: self.validity_days,
            expiry_date: self.expiry_date,
            value,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RenewExamReq {
    pub realization_date: String,
    /// Defaults to the validity of the exam being renewed.
    #[serde(default)]
    pub validity_days: Option<u32>,
}

/// Partial edit of an exam; absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateExamReq {
    #[serde(default)]
    pub realization_date: Option<String>,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub procedure_ids: Option<Vec<String>>,
    /// Cost in reais.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UpdateExamReq {
    /// Converts to the core input; `None` if `value` is not a finite amount.
    pub fn into_update(self) -> Option<ExamUpdate> {
        let value = match self.value {
            Some(reais) => Some(Money::from_reais(reais)?),
            None => None,
        };
        Some(ExamUpdate {
            realization_date: self.realization_date,
            validity_days: self.validity_days,
            expiry_date: self.expiry_date,
            procedure_ids: self.procedure_ids,
            value,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpiryPreviewReq {
    pub realization_date: String,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpiryPreviewRes {
    pub expiry_date: String,
}

impl ExpiryPreviewRes {
    pub fn new(expiry_date: NaiveDate) -> Self {
        Self {
            expiry_date: day(expiry_date),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationLineRes {
    pub colaborador_name: String,
    pub exam_label: String,
    pub expiry_date: String,
    pub days_to_expire: i64,
    pub is_overdue: bool,
}

impl From<NotificationLine> for NotificationLineRes {
    fn from(line: NotificationLine) -> Self {
        Self {
            colaborador_name: line.colaborador_name,
            exam_label: line.exam_label,
            expiry_date: day(line.expiry_date),
            days_to_expire: line.days_to_expire,
            is_overdue: line.is_overdue,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationPreviewRes {
    pub tenant_id: String,
    pub tenant_name: String,
    pub recipients: Vec<String>,
    pub generated_on: String,
    pub lines: Vec<NotificationLineRes>,
}

impl From<TenantNotification> for NotificationPreviewRes {
    fn from(notification: TenantNotification) -> Self {
        Self {
            tenant_id: notification.tenant_id,
            tenant_name: notification.tenant_name,
            recipients: notification
                .recipients
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
            generated_on: day(notification.generated_on),
            lines: notification.lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantReportRes {
    pub tenant_id: String,
    pub items: usize,
    /// `sent`, `skipped_no_recipients` or `failed`.
    pub outcome: String,
    pub recipients: Option<usize>,
    pub reason: Option<String>,
}

impl From<TenantReport> for TenantReportRes {
    fn from(report: TenantReport) -> Self {
        let (outcome, recipients, reason) = match report.outcome {
            TenantOutcome::Sent { recipients } => ("sent", Some(recipients), None),
            TenantOutcome::SkippedNoRecipients => ("skipped_no_recipients", None, None),
            TenantOutcome::Failed { reason } => ("failed", None, Some(reason)),
        };
        Self {
            tenant_id: report.tenant_id,
            items: report.items,
            outcome: outcome.to_string(),
            recipients,
            reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationRunRes {
    pub generated_on: String,
    pub tenants: Vec<TenantReportRes>,
}

impl From<NotificationReport> for NotificationRunRes {
    fn from(report: NotificationReport) -> Self {
        Self {
            generated_on: day(report.generated_on),
            tenants: report.tenants.into_iter().map(Into::into).collect(),
        }
    }
}
