//! Record store access.
//!
//! Persistence and querying belong to the hosted backend. The core only needs the
//! joined rows and a handful of lookups, described by [`RecordStore`]. The
//! [`snapshot::SnapshotStore`] adapter serves them from a YAML export.

pub mod snapshot;

use crate::colaborador::Colaborador;
use crate::exam::{ExamRecord, ExamType, Procedure};
use crate::row::ExamRow;
use crate::tenant::Tenant;
use crate::ExamResult;
use exames_types::EmailAddress;

/// Boundary to the external record store.
///
/// Implementations enforce tenant scoping: `*_for_tenant` methods never return rows
/// belonging to another tenant.
pub trait RecordStore: Send + Sync {
    /// All exam rows across tenants, joined with colaborador, type and procedures.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn exam_rows(&self) -> ExamResult<Vec<ExamRow>>;

    /// Exam rows whose colaborador belongs to `tenant_id`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn exam_rows_for_tenant(&self, tenant_id: &str) -> ExamResult<Vec<ExamRow>> {
        Ok(self
            .exam_rows()?
            .into_iter()
            .filter(|row| row.tenant_id() == tenant_id)
            .collect())
    }

    /// Colaboradores of a tenant, active or not, ordered by name.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn colaboradores(&self, tenant_id: &str) -> ExamResult<Vec<Colaborador>>;

    /// Exam types ordered by name.
    fn exam_types(&self) -> ExamResult<Vec<ExamType>>;

    /// Procedures ordered by name.
    fn procedures(&self) -> ExamResult<Vec<Procedure>>;

    /// # Errors
    /// Returns `ExamError::NotFound` if the tenant does not exist.
    fn tenant(&self, tenant_id: &str) -> ExamResult<Tenant>;

    fn tenants(&self) -> ExamResult<Vec<Tenant>>;

    /// Notification recipients of a tenant (possibly empty).
    fn recipients(&self, tenant_id: &str) -> ExamResult<Vec<EmailAddress>>;

    /// # Errors
    /// Returns `ExamError::NotFound` if no exam has this id.
    fn exam(&self, exam_id: &str) -> ExamResult<ExamRecord>;

    /// Stores a new record.
    ///
    /// # Errors
    /// Returns an error if the id is taken or the record references unknown entities.
    fn insert_exam(&self, record: ExamRecord) -> ExamResult<ExamRecord>;

    /// Replaces an existing record with the same id.
    ///
    /// # Errors
    /// Returns `ExamError::NotFound` if no exam has this id.
    fn update_exam(&self, record: ExamRecord) -> ExamResult<()>;
}
