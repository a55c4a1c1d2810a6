//! YAML snapshot record store.
//!
//! The snapshot is a single YAML document exported from the hosted database:
//!
//! ```yaml
//! tenants: [{ id: acme, name: ACME Industrial }]
//! recipients: [{ id: r1, tenant_id: acme, email: sst@acme.com.br }]
//! colaboradores: [{ id: c1, tenant_id: acme, name: Ana, admission_date: 2020-01-06 }]
//! exam_types: [{ id: t1, name: Periódico, alert_threshold_days: 30 }]
//! procedures: [{ id: p1, name: NR-35 }]
//! exams:
//!   - { id: e1, colaborador_id: c1, exam_type_id: t1, realization_date: 2024-01-01,
//!       validity_days: 365, expiry_date: 2025-01-01 }
//! ```
//!
//! Referential integrity is checked on load and on every write. Writes go to a
//! temporary file next to the snapshot which is then renamed over it.

use crate::colaborador::Colaborador;
use crate::exam::{ExamRecord, ExamType, Procedure};
use crate::repositories::RecordStore;
use crate::row::ExamRow;
use crate::tenant::{Recipient, Tenant};
use crate::{ExamError, ExamResult};
use exames_types::EmailAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Full contents of a snapshot file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub colaboradores: Vec<Colaborador>,
    #[serde(default)]
    pub exam_types: Vec<ExamType>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub exams: Vec<ExamRecord>,
}

impl Snapshot {
    /// Parses snapshot YAML, reporting the path of the first field that does not fit.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::SnapshotSchema` on a schema mismatch, or a reference error if
    /// the parsed snapshot is inconsistent.
    pub fn parse(yaml_text: &str) -> ExamResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let snapshot = match serde_path_to_error::deserialize::<_, Snapshot>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(ExamError::SnapshotSchema {
                    path,
                    message: err.into_inner().to_string(),
                });
            }
        };

        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Renders the snapshot as YAML.
    pub fn render(&self) -> ExamResult<String> {
        serde_yaml::to_string(self).map_err(ExamError::YamlSerialization)
    }

    /// Checks id uniqueness and that every reference resolves.
    pub fn validate(&self) -> ExamResult<()> {
        let tenants = unique_ids("tenant", self.tenants.iter().map(|t| t.id.as_str()))?;
        unique_ids("recipient", self.recipients.iter().map(|r| r.id.as_str()))?;
        let colaboradores =
            unique_ids("colaborador", self.colaboradores.iter().map(|c| c.id.as_str()))?;
        let exam_types = unique_ids("exam type", self.exam_types.iter().map(|t| t.id.as_str()))?;
        let procedures = unique_ids("procedure", self.procedures.iter().map(|p| p.id.as_str()))?;
        unique_ids("exam", self.exams.iter().map(|e| e.id.as_str()))?;

        for recipient in &self.recipients {
            require("tenant", &tenants, &recipient.tenant_id)?;
        }
        for colaborador in &self.colaboradores {
            require("tenant", &tenants, &colaborador.tenant_id)?;
        }
        for exam in &self.exams {
            check_exam_references(exam, &colaboradores, &exam_types, &procedures)?;
        }

        Ok(())
    }

    fn check_references(&self, exam: &ExamRecord) -> ExamResult<()> {
        let colaboradores = self.colaboradores.iter().map(|c| c.id.as_str()).collect();
        let exam_types = self.exam_types.iter().map(|t| t.id.as_str()).collect();
        let procedures = self.procedures.iter().map(|p| p.id.as_str()).collect();
        check_exam_references(exam, &colaboradores, &exam_types, &procedures)
    }

    fn join(&self, exam: &ExamRecord) -> ExamResult<ExamRow> {
        let colaborador = self
            .colaboradores
            .iter()
            .find(|c| c.id == exam.colaborador_id)
            .ok_or_else(|| not_found("colaborador", &exam.colaborador_id))?;
        let exam_type = self
            .exam_types
            .iter()
            .find(|t| t.id == exam.exam_type_id)
            .ok_or_else(|| not_found("exam type", &exam.exam_type_id))?;
        let procedures = exam
            .procedure_ids
            .iter()
            .map(|id| {
                self.procedures
                    .iter()
                    .find(|p| &p.id == id)
                    .cloned()
                    .ok_or_else(|| not_found("procedure", id))
            })
            .collect::<ExamResult<Vec<_>>>()?;

        Ok(ExamRow {
            record: exam.clone(),
            colaborador: colaborador.clone(),
            exam_type: exam_type.clone(),
            procedures,
        })
    }
}

fn not_found(kind: &'static str, id: &str) -> ExamError {
    ExamError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn unique_ids<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> ExamResult<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(ExamError::InvalidInput(format!("{kind} id cannot be empty")));
        }
        if !seen.insert(id) {
            return Err(ExamError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

fn require(kind: &'static str, known: &HashSet<&str>, id: &str) -> ExamResult<()> {
    if known.contains(id) {
        Ok(())
    } else {
        Err(not_found(kind, id))
    }
}

fn check_exam_references(
    exam: &ExamRecord,
    colaboradores: &HashSet<&str>,
    exam_types: &HashSet<&str>,
    procedures: &HashSet<&str>,
) -> ExamResult<()> {
    require("colaborador", colaboradores, &exam.colaborador_id)?;
    require("exam type", exam_types, &exam.exam_type_id)?;
    for procedure_id in &exam.procedure_ids {
        require("procedure", procedures, procedure_id)?;
    }
    Ok(())
}

/// [`RecordStore`] backed by a [`Snapshot`], optionally persisted to a YAML file.
#[derive(Debug)]
pub struct SnapshotStore {
    path: Option<PathBuf>,
    state: RwLock<Snapshot>,
}

impl SnapshotStore {
    /// Opens the snapshot file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::FileRead` if the file cannot be read, or a schema/reference
    /// error if its contents are invalid.
    pub fn open(path: impl AsRef<Path>) -> ExamResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(ExamError::FileRead)?;
        let snapshot = Snapshot::parse(&text)?;

        tracing::info!(
            path = %path.display(),
            tenants = snapshot.tenants.len(),
            colaboradores = snapshot.colaboradores.len(),
            exams = snapshot.exams.len(),
            "loaded record snapshot"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: RwLock::new(snapshot),
        })
    }

    /// Wraps an in-memory snapshot. Writes are kept in memory only.
    ///
    /// # Errors
    ///
    /// Returns a reference error if the snapshot is inconsistent.
    pub fn in_memory(snapshot: Snapshot) -> ExamResult<Self> {
        snapshot.validate()?;
        Ok(Self {
            path: None,
            state: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> ExamResult<Snapshot> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> ExamResult<RwLockReadGuard<'_, Snapshot>> {
        self.state.read().map_err(|_| ExamError::StorePoisoned)
    }

    fn write(&self) -> ExamResult<RwLockWriteGuard<'_, Snapshot>> {
        self.state.write().map_err(|_| ExamError::StorePoisoned)
    }

    fn persist(&self, snapshot: &Snapshot) -> ExamResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let text = snapshot.render()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, text).map_err(ExamError::FileWrite)?;
        fs::rename(&tmp, path).map_err(ExamError::FileWrite)?;
        Ok(())
    }
}

impl RecordStore for SnapshotStore {
    fn exam_rows(&self) -> ExamResult<Vec<ExamRow>> {
        let snapshot = self.read()?;
        let mut rows = snapshot
            .exams
            .iter()
            .map(|exam| snapshot.join(exam))
            .collect::<ExamResult<Vec<_>>>()?;
        rows.sort_by(|a, b| {
            a.record
                .expiry_date
                .cmp(&b.record.expiry_date)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        Ok(rows)
    }

    fn colaboradores(&self, tenant_id: &str) -> ExamResult<Vec<Colaborador>> {
        let snapshot = self.read()?;
        let mut colaboradores: Vec<Colaborador> = snapshot
            .colaboradores
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        colaboradores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(colaboradores)
    }

    fn exam_types(&self) -> ExamResult<Vec<ExamType>> {
        let mut exam_types = self.read()?.exam_types.clone();
        exam_types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(exam_types)
    }

    fn procedures(&self) -> ExamResult<Vec<Procedure>> {
        let mut procedures = self.read()?.procedures.clone();
        procedures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(procedures)
    }

    fn tenant(&self, tenant_id: &str) -> ExamResult<Tenant> {
        self.read()?
            .tenants
            .iter()
            .find(|t| t.id == tenant_id)
            .cloned()
            .ok_or_else(|| not_found("tenant", tenant_id))
    }

    fn tenants(&self) -> ExamResult<Vec<Tenant>> {
        Ok(self.read()?.tenants.clone())
    }

    fn recipients(&self, tenant_id: &str) -> ExamResult<Vec<EmailAddress>> {
        let snapshot = self.read()?;
        let mut recipients: Vec<EmailAddress> = snapshot
            .recipients
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.email.clone())
            .collect();
        recipients.sort();
        recipients.dedup();
        Ok(recipients)
    }

    fn exam(&self, exam_id: &str) -> ExamResult<ExamRecord> {
        self.read()?
            .exams
            .iter()
            .find(|e| e.id == exam_id)
            .cloned()
            .ok_or_else(|| not_found("exam", exam_id))
    }

    fn insert_exam(&self, record: ExamRecord) -> ExamResult<ExamRecord> {
        let mut snapshot = self.write()?;

        if record.id.trim().is_empty() {
            return Err(ExamError::InvalidInput("exam id cannot be empty".into()));
        }
        if snapshot.exams.iter().any(|e| e.id == record.id) {
            return Err(ExamError::DuplicateId {
                kind: "exam",
                id: record.id,
            });
        }
        snapshot.check_references(&record)?;

        snapshot.exams.push(record.clone());
        if let Err(err) = self.persist(&snapshot) {
            snapshot.exams.pop();
            return Err(err);
        }

        tracing::info!(exam_id = %record.id, colaborador_id = %record.colaborador_id, "stored exam");
        Ok(record)
    }

    fn update_exam(&self, record: ExamRecord) -> ExamResult<()> {
        let mut snapshot = self.write()?;
        snapshot.check_references(&record)?;

        let index = snapshot
            .exams
            .iter()
            .position(|e| e.id == record.id)
            .ok_or_else(|| not_found("exam", &record.id))?;

        let previous = std::mem::replace(&mut snapshot.exams[index], record);
        if let Err(err) = self.persist(&snapshot) {
            snapshot.exams[index] = previous;
            return Err(err);
        }

        tracing::info!(exam_id = %snapshot.exams[index].id, "updated exam");
        Ok(())
    }
}
