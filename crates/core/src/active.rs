//! Active-record selection.
//!
//! A colaborador accumulates several records for the same exam over time (renewals are
//! new records). For each grouping key exactly one record is *active*: the one with the
//! latest expiry date. Everything else is history.
//!
//! The key is built by [`GroupKey::for_record`]. Certificate-style exams are further
//! split by the set of procedures they cover; the set is normalised (sorted and
//! de-duplicated) so `[p2, p1]` and `[p1, p2]` land in the same group.

use crate::exam::ExamRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Order-insensitive signature of a procedure set. Empty for exams without procedures.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProcedureSignature(Vec<String>);

impl ProcedureSignature {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        Self(ids)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

/// Grouping key: (colaborador, exam type, procedure signature).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub colaborador_id: String,
    pub exam_type_id: String,
    pub procedures: ProcedureSignature,
}

impl GroupKey {
    pub fn for_record(record: &ExamRecord) -> Self {
        Self {
            colaborador_id: record.colaborador_id.clone(),
            exam_type_id: record.exam_type_id.clone(),
            procedures: ProcedureSignature::from_ids(&record.procedure_ids),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/[{}]",
            self.colaborador_id,
            self.exam_type_id,
            self.procedures.ids().join(", ")
        )
    }
}

/// Total order deciding which of two records in the same group is active.
///
/// `Greater` means `a` wins: later expiry, then later realization, then the
/// lexicographically smaller id.
pub fn precedence(a: &ExamRecord, b: &ExamRecord) -> Ordering {
    a.expiry_date
        .cmp(&b.expiry_date)
        .then_with(|| a.realization_date.cmp(&b.realization_date))
        .then_with(|| b.id.cmp(&a.id))
}

/// Outcome of active-record selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveSet<K, T> {
    /// The winning item per key.
    pub active: BTreeMap<K, T>,
    /// Superseded items, newest realization first.
    pub historical: Vec<T>,
}

/// Selection over plain records keyed by [`GroupKey`].
pub type ActiveExamSet = ActiveSet<GroupKey, ExamRecord>;

impl<K, T> Default for ActiveSet<K, T> {
    fn default() -> Self {
        Self {
            active: BTreeMap::new(),
            historical: Vec::new(),
        }
    }
}

impl<K: Ord, T: AsRef<ExamRecord>> ActiveSet<K, T> {
    pub fn is_active(&self, record_id: &str) -> bool {
        self.active
            .values()
            .any(|item| item.as_ref().id == record_id)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn into_active(self) -> Vec<T> {
        self.active.into_values().collect()
    }
}

/// Selects the active record per [`GroupKey`].
pub fn select_active<I>(records: I) -> ActiveExamSet
where
    I: IntoIterator<Item = ExamRecord>,
{
    select_active_by(records, GroupKey::for_record)
}

/// Selects the active item per key produced by `key_fn`.
///
/// Items may be records or anything carrying one (joined rows, references). Runs in
/// one pass; the outcome does not depend on input order, except for the relative order
/// of historical items sharing a realization date.
pub fn select_active_by<I, T, K, F>(items: I, key_fn: F) -> ActiveSet<K, T>
where
    I: IntoIterator<Item = T>,
    T: AsRef<ExamRecord>,
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut selection = ActiveSet::default();

    for item in items {
        match selection.active.entry(key_fn(&item)) {
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
            Entry::Occupied(mut slot) => {
                if precedence(item.as_ref(), slot.get().as_ref()) == Ordering::Greater {
                    let superseded = slot.insert(item);
                    selection.historical.push(superseded);
                } else {
                    selection.historical.push(item);
                }
            }
        }
    }

    selection
        .historical
        .sort_by(|a, b| b.as_ref().realization_date.cmp(&a.as_ref().realization_date));

    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(id: &str, colaborador: &str, exam_type: &str, realized: &str, expiry: &str) -> ExamRecord {
        ExamRecord {
            id: id.into(),
            colaborador_id: colaborador.into(),
            exam_type_id: exam_type.into(),
            procedure_ids: vec![],
            realization_date: date(realized),
            validity_days: None,
            expiry_date: date(expiry),
            value: None,
            notes: None,
        }
    }

    fn with_procedures(mut r: ExamRecord, procedures: &[&str]) -> ExamRecord {
        r.procedure_ids = procedures.iter().map(|p| p.to_string()).collect();
        r
    }

    #[test]
    fn empty_input_gives_empty_selection() {
        let selection = select_active(Vec::new());
        assert!(selection.active.is_empty());
        assert!(selection.historical.is_empty());
    }

    #[test]
    fn latest_expiry_wins() {
        let old = record("e1", "C1", "T1", "2023-01-01", "2024-01-01");
        let new = record("e2", "C1", "T1", "2023-06-01", "2024-06-01");

        let selection = select_active(vec![new.clone(), old.clone()]);

        assert_eq!(selection.active.len(), 1);
        assert!(selection.is_active("e2"));
        assert_eq!(selection.historical, vec![old]);
    }

    #[test]
    fn procedure_order_does_not_split_groups() {
        let a = with_procedures(record("e1", "C1", "T1", "2023-01-01", "2024-01-01"), &["P2", "P1"]);
        let b = with_procedures(record("e2", "C1", "T1", "2024-01-01", "2025-01-01"), &["P1", "P2"]);

        assert_eq!(GroupKey::for_record(&a), GroupKey::for_record(&b));

        let selection = select_active(vec![a, b]);
        assert_eq!(selection.active.len(), 1);
        assert!(selection.is_active("e2"));
        assert_eq!(selection.historical.len(), 1);
    }

    #[test]
    fn different_procedure_sets_are_separate_groups() {
        let a = with_procedures(record("e1", "C1", "T1", "2023-01-01", "2024-01-01"), &["P1"]);
        let b = with_procedures(record("e2", "C1", "T1", "2024-01-01", "2025-01-01"), &["P1", "P2"]);
        let c = record("e3", "C1", "T1", "2024-01-01", "2025-01-01");

        let selection = select_active(vec![a, b, c]);
        assert_eq!(selection.active.len(), 3);
        assert!(selection.historical.is_empty());
    }

    #[test]
    fn ids_containing_commas_do_not_merge_sets() {
        let joined = with_procedures(record("e1", "C1", "T1", "2023-01-01", "2024-01-01"), &["P1,P2"]);
        let split = with_procedures(record("e2", "C1", "T1", "2024-01-01", "2025-01-01"), &["P1", "P2"]);

        assert_ne!(GroupKey::for_record(&joined), GroupKey::for_record(&split));

        let selection = select_active(vec![joined, split]);
        assert_eq!(selection.active.len(), 2);
        assert!(selection.is_active("e1"));
        assert!(selection.historical.is_empty());
    }

    #[test]
    fn signature_trims_and_dedups() {
        let sig = ProcedureSignature::from_ids([" P2", "P1", "P2", ""]);
        assert_eq!(sig.ids(), ["P1", "P2"]);
        assert!(ProcedureSignature::from_ids(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn ties_break_on_realization_then_smallest_id() {
        let early = record("e1", "C1", "T1", "2024-01-01", "2025-01-01");
        let late = record("e2", "C1", "T1", "2024-02-01", "2025-01-01");
        let selection = select_active(vec![late, early]);
        assert!(selection.is_active("e2"));

        let b = record("b", "C1", "T1", "2024-01-01", "2025-01-01");
        let a = record("a", "C1", "T1", "2024-01-01", "2025-01-01");
        let forward = select_active(vec![a.clone(), b.clone()]);
        let backward = select_active(vec![b, a]);
        assert!(forward.is_active("a"));
        assert!(backward.is_active("a"));
    }

    #[test]
    fn selection_is_idempotent() {
        let records = vec![
            record("e1", "C1", "T1", "2022-01-01", "2023-01-01"),
            record("e2", "C1", "T1", "2023-01-01", "2024-01-01"),
            record("e3", "C1", "T2", "2023-01-01", "2024-01-01"),
            record("e4", "C2", "T1", "2023-01-01", "2024-01-01"),
            record("e5", "C2", "T1", "2023-01-01", "2024-01-01"),
        ];

        let first = select_active(records.clone());
        let second = select_active(records);
        assert_eq!(first.active, second.active);

        let again = select_active(first.active.values().cloned().collect::<Vec<_>>());
        assert_eq!(again.active, first.active);
        assert!(again.historical.is_empty());
    }

    #[test]
    fn historical_is_sorted_by_realization_descending() {
        let records = vec![
            record("e1", "C1", "T1", "2021-01-01", "2022-01-01"),
            record("e2", "C1", "T1", "2023-01-01", "2024-01-01"),
            record("e3", "C1", "T1", "2022-01-01", "2023-01-01"),
            record("e4", "C1", "T1", "2024-01-01", "2025-01-01"),
        ];

        let selection = select_active(records);
        let ids: Vec<&str> = selection.historical.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e3", "e1"]);
    }

    #[test]
    fn custom_key_selects_over_references() {
        let records = vec![
            record("e1", "C1", "T1", "2023-01-01", "2024-01-01"),
            record("e2", "C1", "T2", "2023-01-01", "2024-06-01"),
        ];

        let per_colaborador = select_active_by(records.iter(), |r| r.colaborador_id.clone());
        assert_eq!(per_colaborador.active.len(), 1);
        assert_eq!(per_colaborador.active["C1"].id, "e2");
    }

    fn records_strategy() -> impl Strategy<Value = Vec<ExamRecord>> {
        let row = (
            0..3usize,
            0..2usize,
            prop::collection::vec(0..3usize, 0..3),
            0i64..60,
            0i64..60,
        );
        prop::collection::vec(row, 0..24).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (colaborador, exam_type, procedures, realized, span))| {
                    let realization_date = date("2023-01-01") + chrono::Duration::days(realized);
                    ExamRecord {
                        id: format!("e{i:02}"),
                        colaborador_id: format!("C{colaborador}"),
                        exam_type_id: format!("T{exam_type}"),
                        procedure_ids: procedures.iter().map(|p| format!("P{p}")).collect(),
                        realization_date,
                        validity_days: None,
                        expiry_date: realization_date + chrono::Duration::days(span),
                        value: None,
                        notes: None,
                    }
                })
                .collect()
        })
    }

    fn ids(records: &[ExamRecord]) -> Vec<&str> {
        let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids
    }

    proptest! {
        #[test]
        fn input_order_does_not_change_the_selection(
            (records, shuffled) in records_strategy()
                .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle()))
        ) {
            let forward = select_active(records);
            let reordered = select_active(shuffled);

            prop_assert_eq!(&forward.active, &reordered.active);
            prop_assert_eq!(ids(&forward.historical), ids(&reordered.historical));
        }

        #[test]
        fn selecting_the_active_set_again_changes_nothing(records in records_strategy()) {
            let total = records.len();
            let first = select_active(records);
            prop_assert_eq!(first.active.len() + first.historical.len(), total);

            let again = select_active(first.active.values().cloned().collect::<Vec<_>>());
            prop_assert_eq!(&again.active, &first.active);
            prop_assert!(again.historical.is_empty());
        }
    }
}
