//! Exam service.
//!
//! Ties the record store to the engine for the operations the CLI and REST API expose.

use crate::dashboard::{exam_listing, procedure_matrix, summarize, DashboardSummary, ListingEntry, ProcedureMatrix};
use crate::exam::{ExamRecord, ExamUpdate, NewExam};
use crate::notification::{attention_items, TenantNotification};
use crate::repositories::RecordStore;
use crate::validation::parse_date;
use crate::ExamResult;
use chrono::NaiveDate;
use std::sync::Arc;

/// Exam operations over a [`RecordStore`] - no transport concerns.
#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn RecordStore>,
}

impl ExamService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Dashboard summary of one tenant.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NotFound` if the tenant does not exist.
    pub fn dashboard(&self, tenant_id: &str, today: NaiveDate) -> ExamResult<DashboardSummary> {
        self.store.tenant(tenant_id)?;
        let colaboradores = self.store.colaboradores(tenant_id)?;
        let rows = self.store.exam_rows_for_tenant(tenant_id)?;
        Ok(summarize(&colaboradores, &rows, today))
    }

    /// Colaborador × procedure matrix of one tenant, columns ordered by procedure name.
    pub fn procedure_matrix(&self, tenant_id: &str, today: NaiveDate) -> ExamResult<ProcedureMatrix> {
        self.store.tenant(tenant_id)?;
        let colaboradores = self.store.colaboradores(tenant_id)?;
        let procedures = self.store.procedures()?;
        let rows = self.store.exam_rows_for_tenant(tenant_id)?;
        Ok(procedure_matrix(&colaboradores, &procedures, &rows, today))
    }

    /// All records of one tenant, history included.
    pub fn exams(
        &self,
        tenant_id: &str,
        colaborador_id: Option<&str>,
        today: NaiveDate,
    ) -> ExamResult<Vec<ListingEntry>> {
        self.store.tenant(tenant_id)?;
        let rows = self.store.exam_rows_for_tenant(tenant_id)?;
        Ok(exam_listing(&rows, colaborador_id, today))
    }

    /// The alert that would be sent to a tenant today, without sending it.
    pub fn notification_preview(
        &self,
        tenant_id: &str,
        today: NaiveDate,
    ) -> ExamResult<TenantNotification> {
        let tenant = self.store.tenant(tenant_id)?;
        let recipients = self.store.recipients(tenant_id)?;
        let rows = self.store.exam_rows_for_tenant(tenant_id)?;
        let items = attention_items(&rows, today);
        Ok(TenantNotification::build(&tenant, recipients, items, today))
    }

    /// Validates and stores a new exam under a freshly generated id.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or `ExamError::NotFound` if the
    /// colaborador, exam type or a procedure does not exist.
    pub fn register(&self, exam: NewExam) -> ExamResult<ExamRecord> {
        let record = exam.into_record(new_exam_id())?;
        let record = self.store.insert_exam(record)?;
        tracing::info!(
            exam_id = %record.id,
            expiry_date = %record.expiry_date,
            "registered exam"
        );
        Ok(record)
    }

    /// Stores a renewal of `exam_id` realized on `realization_date`.
    ///
    /// The renewed record is left in place and becomes history.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad date or a validity over the registration
    /// limit, or `ExamError::NotFound` if `exam_id` does not exist.
    pub fn renew(
        &self,
        exam_id: &str,
        realization_date: &str,
        validity_days: Option<u32>,
    ) -> ExamResult<ExamRecord> {
        let previous = self.store.exam(exam_id)?;
        let realization_date = parse_date("realization_date", realization_date)?;
        let renewed = previous.renew(new_exam_id(), realization_date, validity_days)?;
        let renewed = self.store.insert_exam(renewed)?;
        tracing::info!(
            previous_id = %previous.id,
            exam_id = %renewed.id,
            expiry_date = %renewed.expiry_date,
            "renewed exam"
        );
        Ok(renewed)
    }

    /// Applies an edit to an existing exam.
    pub fn update(&self, exam_id: &str, update: ExamUpdate) -> ExamResult<ExamRecord> {
        let mut record = self.store.exam(exam_id)?;
        record.apply_update(update)?;
        self.store.update_exam(record.clone())?;
        Ok(record)
    }
}

fn new_exam_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
