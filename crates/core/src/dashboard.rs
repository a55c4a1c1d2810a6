//! Dashboard read models.
//!
//! Every figure here comes out of the expiry engine: active selection through
//! [`select_active_by`], status through [`DerivedExamView::derive`]. No date arithmetic
//! happens in this module.

use crate::active::{select_active_by, GroupKey};
use crate::colaborador::Colaborador;
use crate::exam::{ExamRecord, Procedure};
use crate::expiry::{DerivedExamView, ExamStatus};
use crate::money::Money;
use crate::notification::{attention_items, AttentionItem};
use crate::row::ExamRow;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Headline figures for one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub generated_on: NaiveDate,
    pub active_colaboradores: usize,
    /// Active records of active colaboradores.
    pub active_exams: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    /// Spend over every record, history included.
    pub total_cost: Money,
    pub attention: Vec<AttentionItem>,
}

/// Builds the summary from a tenant's colaboradores and exam rows.
pub fn summarize(colaboradores: &[Colaborador], rows: &[ExamRow], today: NaiveDate) -> DashboardSummary {
    let active_colaboradores = colaboradores.iter().filter(|c| c.active).count();

    let active_exams = select_active_by(
        rows.iter().filter(|row| row.colaborador.active),
        |row| GroupKey::for_record(&row.record),
    )
    .active_len();

    let attention = attention_items(rows, today);
    let expired = attention
        .iter()
        .filter(|item| item.view.status == ExamStatus::Expired)
        .count();

    DashboardSummary {
        generated_on: today,
        active_colaboradores,
        active_exams,
        expiring_soon: attention.len() - expired,
        expired,
        total_cost: rows.iter().filter_map(|row| row.record.value).sum(),
        attention,
    }
}

/// Latest record covering one procedure for one colaborador.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcedureCell {
    pub exam_id: String,
    pub exam_label: String,
    pub expiry_date: NaiveDate,
    pub status: ExamStatus,
    pub days_to_expire: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub colaborador_id: String,
    pub colaborador_name: String,
    /// One cell per entry of [`ProcedureMatrix::procedures`]; `None` if never covered.
    pub cells: Vec<Option<ProcedureCell>>,
}

/// Colaborador × procedure grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcedureMatrix {
    pub generated_on: NaiveDate,
    pub procedures: Vec<Procedure>,
    pub rows: Vec<MatrixRow>,
}

struct Coverage<'a> {
    row: &'a ExamRow,
    procedure_id: &'a str,
}

impl AsRef<ExamRecord> for Coverage<'_> {
    fn as_ref(&self) -> &ExamRecord {
        &self.row.record
    }
}

/// Builds the procedure matrix for the active colaboradores in `colaboradores`.
///
/// Columns follow the order of `procedures`.
pub fn procedure_matrix(
    colaboradores: &[Colaborador],
    procedures: &[Procedure],
    rows: &[ExamRow],
    today: NaiveDate,
) -> ProcedureMatrix {
    let coverage = rows.iter().flat_map(|row| {
        row.record
            .procedure_ids
            .iter()
            .map(move |procedure_id| Coverage {
                row,
                procedure_id: procedure_id.as_str(),
            })
    });
    let latest = select_active_by(coverage, |c| {
        (c.row.colaborador.id.clone(), c.procedure_id.to_string())
    })
    .active;

    let matrix_rows = colaboradores
        .iter()
        .filter(|c| c.active)
        .map(|colaborador| MatrixRow {
            colaborador_id: colaborador.id.clone(),
            colaborador_name: colaborador.name.to_string(),
            cells: procedures
                .iter()
                .map(|procedure| {
                    latest
                        .get(&(colaborador.id.clone(), procedure.id.clone()))
                        .map(|c| cell(c.row, today))
                })
                .collect(),
        })
        .collect();

    ProcedureMatrix {
        generated_on: today,
        procedures: procedures.to_vec(),
        rows: matrix_rows,
    }
}

fn cell(row: &ExamRow, today: NaiveDate) -> ProcedureCell {
    let view = DerivedExamView::derive(row.record.clone(), row.alert_threshold_days(), today);
    ProcedureCell {
        exam_id: view.record.id.clone(),
        exam_label: row.exam_label(),
        expiry_date: view.record.expiry_date,
        status: view.status,
        days_to_expire: view.days_to_expire,
    }
}

/// A record in the exam listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    #[serde(flatten)]
    pub view: DerivedExamView,
    pub colaborador_name: String,
    pub exam_label: String,
    /// Whether this is the active record of its group.
    pub active: bool,
}

/// Every record with its status, ordered by expiry date.
///
/// History is included. When `colaborador_id` is given only that colaborador's records
/// are listed.
pub fn exam_listing(
    rows: &[ExamRow],
    colaborador_id: Option<&str>,
    today: NaiveDate,
) -> Vec<ListingEntry> {
    let active: BTreeMap<GroupKey, &ExamRow> =
        select_active_by(rows.iter(), |row| GroupKey::for_record(&row.record)).active;
    let is_active = |row: &ExamRow| {
        active
            .get(&GroupKey::for_record(&row.record))
            .is_some_and(|winner| winner.record.id == row.record.id)
    };

    let mut entries: Vec<ListingEntry> = rows
        .iter()
        .filter(|row| match colaborador_id {
            Some(id) => row.colaborador.id == id,
            None => true,
        })
        .map(|row| ListingEntry {
            view: DerivedExamView::derive(row.record.clone(), row.alert_threshold_days(), today),
            colaborador_name: row.colaborador.name.to_string(),
            exam_label: row.exam_label(),
            active: is_active(row),
        })
        .collect();

    entries.sort_by(|a, b| {
        a.view
            .record
            .expiry_date
            .cmp(&b.view.record.expiry_date)
            .then_with(|| a.view.record.id.cmp(&b.view.record.id))
    });
    entries
}
