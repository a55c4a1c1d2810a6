//! Joined exam rows as supplied by the record store.

use crate::colaborador::Colaborador;
use crate::exam::{ExamRecord, ExamType, Procedure};

/// An exam record joined with its colaborador, exam type and procedures.
///
/// This is the unit the expiry engine works on when it needs more than dates: the
/// alert threshold comes from the exam type and the tenant from the colaborador.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExamRow {
    pub record: ExamRecord,
    pub colaborador: Colaborador,
    pub exam_type: ExamType,
    /// Procedures referenced by `record.procedure_ids`, in the same order.
    pub procedures: Vec<Procedure>,
}

impl AsRef<ExamRecord> for ExamRow {
    fn as_ref(&self) -> &ExamRecord {
        &self.record
    }
}

impl ExamRow {
    pub fn tenant_id(&self) -> &str {
        &self.colaborador.tenant_id
    }

    pub fn alert_threshold_days(&self) -> u32 {
        self.exam_type.alert_threshold_days()
    }

    /// Human-readable exam name.
    ///
    /// Exams covering procedures are labelled with them, e.g. `Certificado (NR-10, NR-35)`;
    /// procedure names are sorted so the label does not depend on capture order.
    pub fn exam_label(&self) -> String {
        if self.procedures.is_empty() {
            return self.exam_type.name.to_string();
        }

        let mut names: Vec<&str> = self.procedures.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        format!("{} ({})", self.exam_type.name, names.join(", "))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;

    #[test]
    fn label_is_type_name_without_procedures() {
        let c = colaborador("c1", "acme", "Ana");
        let t = exam_type("t1", "Periódico", None);
        let row = row(record("e1", "c1", "t1", "2024-01-01", 365), &c, &t);
        assert_eq!(row.exam_label(), "Periódico");
        assert_eq!(row.tenant_id(), "acme");
        assert_eq!(row.alert_threshold_days(), 30);
    }

    #[test]
    fn label_lists_sorted_procedures() {
        let c = colaborador("c1", "acme", "Ana");
        let t = exam_type("t1", "Certificado", Some(60));
        let mut row = row(record("e1", "c1", "t1", "2024-01-01", 730), &c, &t);
        row.procedures = vec![procedure("p2", "NR-35"), procedure("p1", "NR-10")];
        assert_eq!(row.exam_label(), "Certificado (NR-10, NR-35)");
    }
}
