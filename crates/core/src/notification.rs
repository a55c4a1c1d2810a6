//! Expiry notifications.
//!
//! [`aggregate_for_notification`] turns joined rows into per-tenant attention lists.
//! [`NotificationService`] runs it against the record store and hands one
//! [`TenantNotification`] per tenant to a [`NotificationTransport`].

use crate::active::{select_active_by, GroupKey};
use crate::expiry::DerivedExamView;
use crate::repositories::RecordStore;
use crate::row::ExamRow;
use crate::tenant::Tenant;
use crate::transport::NotificationTransport;
use crate::ExamResult;
use chrono::NaiveDate;
use exames_types::EmailAddress;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An active exam that is expired or about to expire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttentionItem {
    pub tenant_id: String,
    pub colaborador_id: String,
    pub colaborador_name: String,
    pub exam_label: String,
    pub expiry_date: NaiveDate,
    pub is_overdue: bool,
    pub view: DerivedExamView,
}

impl AttentionItem {
    fn from_row(row: &ExamRow, view: DerivedExamView) -> Self {
        Self {
            tenant_id: row.tenant_id().to_string(),
            colaborador_id: row.colaborador.id.clone(),
            colaborador_name: row.colaborador.name.to_string(),
            exam_label: row.exam_label(),
            expiry_date: view.record.expiry_date,
            is_overdue: view.days_to_expire < 0,
            view,
        }
    }
}

/// Active exams needing attention, ordered by expiry date, colaborador and label.
///
/// Rows of inactive colaboradores are ignored entirely.
pub fn attention_items<'a, I>(rows: I, today: NaiveDate) -> Vec<AttentionItem>
where
    I: IntoIterator<Item = &'a ExamRow>,
{
    let active_rows = rows.into_iter().filter(|row| row.colaborador.active);
    let selection = select_active_by(active_rows, |row| GroupKey::for_record(&row.record));

    let mut items: Vec<AttentionItem> = selection
        .into_active()
        .into_iter()
        .filter_map(|row| {
            let view =
                DerivedExamView::derive(row.record.clone(), row.alert_threshold_days(), today);
            view.status
                .needs_attention()
                .then(|| AttentionItem::from_row(row, view))
        })
        .collect();

    items.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.colaborador_name.cmp(&b.colaborador_name))
            .then_with(|| a.exam_label.cmp(&b.exam_label))
    });
    items
}

/// Groups [`attention_items`] by tenant. Tenants with nothing to report are absent.
pub fn aggregate_for_notification<'a, I>(
    rows: I,
    today: NaiveDate,
) -> BTreeMap<String, Vec<AttentionItem>>
where
    I: IntoIterator<Item = &'a ExamRow>,
{
    let mut by_tenant: BTreeMap<String, Vec<AttentionItem>> = BTreeMap::new();
    for item in attention_items(rows, today) {
        by_tenant
            .entry(item.tenant_id.clone())
            .or_default()
            .push(item);
    }
    by_tenant
}

/// One line of an alert message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationLine {
    pub colaborador_name: String,
    pub exam_label: String,
    pub expiry_date: NaiveDate,
    pub days_to_expire: i64,
    pub is_overdue: bool,
}

impl From<AttentionItem> for NotificationLine {
    fn from(item: AttentionItem) -> Self {
        Self {
            colaborador_name: item.colaborador_name,
            exam_label: item.exam_label,
            expiry_date: item.expiry_date,
            days_to_expire: item.view.days_to_expire,
            is_overdue: item.is_overdue,
        }
    }
}

/// Everything a transport needs to alert one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantNotification {
    pub tenant_id: String,
    pub tenant_name: String,
    pub recipients: Vec<EmailAddress>,
    pub generated_on: NaiveDate,
    pub lines: Vec<NotificationLine>,
}

impl TenantNotification {
    pub fn build(
        tenant: &Tenant,
        recipients: Vec<EmailAddress>,
        items: Vec<AttentionItem>,
        generated_on: NaiveDate,
    ) -> Self {
        Self {
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.to_string(),
            recipients,
            generated_on,
            lines: items.into_iter().map(NotificationLine::from).collect(),
        }
    }

    pub fn overdue_count(&self) -> usize {
        self.lines.iter().filter(|line| line.is_overdue).count()
    }
}

/// What happened to one tenant during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TenantOutcome {
    Sent { recipients: usize },
    SkippedNoRecipients,
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantReport {
    pub tenant_id: String,
    pub items: usize,
    pub outcome: TenantOutcome,
}

/// Result of a notification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub generated_on: NaiveDate,
    pub tenants: Vec<TenantReport>,
}

impl NotificationReport {
    pub fn sent(&self) -> usize {
        self.tenants
            .iter()
            .filter(|t| matches!(t.outcome, TenantOutcome::Sent { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.tenants
            .iter()
            .filter(|t| matches!(t.outcome, TenantOutcome::Failed { .. }))
            .count()
    }
}

/// Runs the expiry notifier over every tenant in the store.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RecordStore>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self { store, transport }
    }

    /// Notifies every tenant that has exams needing attention on `today`.
    ///
    /// Tenants are processed one after another. A failure for one tenant is recorded in
    /// its [`TenantReport`] and the run continues with the next.
    ///
    /// # Errors
    ///
    /// Returns an error only if the exam rows cannot be loaded at all.
    pub fn run(&self, today: NaiveDate) -> ExamResult<NotificationReport> {
        let rows = self.store.exam_rows()?;
        let groups = aggregate_for_notification(&rows, today);

        tracing::info!(%today, tenants = groups.len(), "starting expiry notification run");

        let mut tenants = Vec::with_capacity(groups.len());
        for (tenant_id, items) in groups {
            let item_count = items.len();
            let outcome = match self.notify_tenant(&tenant_id, items, today) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(tenant_id = %tenant_id, error = %err, "tenant notification failed");
                    TenantOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            tenants.push(TenantReport {
                tenant_id,
                items: item_count,
                outcome,
            });
        }

        let report = NotificationReport {
            generated_on: today,
            tenants,
        };
        tracing::info!(
            sent = report.sent(),
            failed = report.failed(),
            "expiry notification run finished"
        );
        Ok(report)
    }

    fn notify_tenant(
        &self,
        tenant_id: &str,
        items: Vec<AttentionItem>,
        today: NaiveDate,
    ) -> ExamResult<TenantOutcome> {
        let tenant = self.store.tenant(tenant_id)?;
        let recipients = self.store.recipients(tenant_id)?;

        if recipients.is_empty() {
            tracing::warn!(tenant_id, "no notification recipients configured, skipping");
            return Ok(TenantOutcome::SkippedNoRecipients);
        }

        let notification = TenantNotification::build(&tenant, recipients, items, today);
        self.transport.deliver(&notification)?;

        tracing::info!(
            tenant_id,
            lines = notification.lines.len(),
            overdue = notification.overdue_count(),
            "tenant notified"
        );
        Ok(TenantOutcome::Sent {
            recipients: notification.recipients.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::ExamStatus;
    use crate::repositories::snapshot::{Snapshot, SnapshotStore};
    use crate::row::fixtures::*;
    use crate::tenant::Recipient;
    use crate::ExamError;
    use exames_types::NonEmptyText;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<TenantNotification>>,
        fail_for: Option<String>,
    }

    impl NotificationTransport for RecordingTransport {
        fn deliver(&self, notification: &TenantNotification) -> ExamResult<()> {
            if self.fail_for.as_deref() == Some(notification.tenant_id.as_str()) {
                return Err(ExamError::Transport("mailbox unavailable".into()));
            }
            self.delivered.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn tenant(id: &str, name: &str) -> Tenant {
        Tenant {
            id: id.into(),
            name: NonEmptyText::new(name).unwrap(),
        }
    }

    fn recipient(id: &str, tenant_id: &str, email: &str) -> Recipient {
        Recipient {
            id: id.into(),
            tenant_id: tenant_id.into(),
            email: EmailAddress::new(email).unwrap(),
        }
    }

    #[test]
    fn periodic_exam_scenario() {
        let ana = colaborador("c1", "acme", "Ana");
        let periodico = exam_type("t1", "Periódico", Some(30));
        let old = row(record("e1", "c1", "t1", "2023-01-01", 365), &ana, &periodico);
        let new = row(record("e2", "c1", "t1", "2024-01-01", 365), &ana, &periodico);
        let rows = vec![old, new];

        let groups = aggregate_for_notification(&rows, date("2024-12-15"));

        let items = &groups["acme"];
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.view.record.id, "e2");
        assert_eq!(item.expiry_date, date("2025-01-01"));
        assert_eq!(item.view.days_to_expire, 17);
        assert_eq!(item.view.status, ExamStatus::ExpiringSoon);
        assert!(!item.is_overdue);
        assert_eq!(item.colaborador_name, "Ana");
        assert_eq!(item.exam_label, "Periódico");
    }

    #[test]
    fn tenants_never_see_each_others_items() {
        let ana = colaborador("c1", "acme", "Ana");
        let bruno = colaborador("c2", "beta", "Bruno");
        let t = exam_type("t1", "Periódico", None);
        let rows = vec![
            row(record("e1", "c1", "t1", "2023-06-01", 365), &ana, &t),
            row(record("e2", "c2", "t1", "2023-07-01", 365), &bruno, &t),
        ];

        let groups = aggregate_for_notification(&rows, date("2024-06-15"));

        assert_eq!(groups.len(), 2);
        assert!(groups["acme"].iter().all(|i| i.tenant_id == "acme"));
        assert!(groups["beta"].iter().all(|i| i.tenant_id == "beta"));
        assert!(groups["acme"][0].is_overdue);
        assert!(!groups["beta"][0].is_overdue);
    }

    #[test]
    fn valid_and_inactive_are_left_out() {
        let ana = colaborador("c1", "acme", "Ana");
        let mut gone = colaborador("c2", "acme", "Gustavo");
        gone.active = false;
        let t = exam_type("t1", "Periódico", Some(30));
        let rows = vec![
            row(record("e1", "c1", "t1", "2024-06-01", 365), &ana, &t),
            row(record("e2", "c2", "t1", "2022-01-01", 365), &gone, &t),
        ];

        assert!(aggregate_for_notification(&rows, date("2024-07-01")).is_empty());
        assert!(aggregate_for_notification(Vec::<&ExamRow>::new(), date("2024-07-01")).is_empty());
    }

    #[test]
    fn items_are_sorted_by_expiry() {
        let ana = colaborador("c1", "acme", "Ana");
        let carlos = colaborador("c2", "acme", "Carlos");
        let t1 = exam_type("t1", "Periódico", Some(60));
        let t2 = exam_type("t2", "Audiometria", Some(60));
        let rows = vec![
            row(record("e1", "c1", "t1", "2023-08-01", 365), &ana, &t1),
            row(record("e2", "c2", "t1", "2023-07-01", 365), &carlos, &t1),
            row(record("e3", "c1", "t2", "2023-07-01", 365), &ana, &t2),
        ];

        let items = attention_items(&rows, date("2024-07-15"));
        let order: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.colaborador_name.as_str(), i.exam_label.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("Ana", "Audiometria"), ("Carlos", "Periódico"), ("Ana", "Periódico")]
        );
    }

    fn store() -> Arc<SnapshotStore> {
        let ana = colaborador("c1", "acme", "Ana");
        let bruno = colaborador("c2", "beta", "Bruno");
        let carla = colaborador("c3", "gamma", "Carla");
        let snapshot = Snapshot {
            tenants: vec![
                tenant("acme", "ACME"),
                tenant("beta", "Beta"),
                tenant("gamma", "Gamma"),
            ],
            recipients: vec![
                recipient("r1", "acme", "sst@acme.com.br"),
                recipient("r2", "beta", "rh@beta.com.br"),
            ],
            colaboradores: vec![ana, bruno, carla],
            exam_types: vec![exam_type("t1", "Periódico", Some(30))],
            procedures: vec![],
            exams: vec![
                record("e1", "c1", "t1", "2024-01-01", 365),
                record("e2", "c2", "t1", "2023-01-01", 365),
                record("e3", "c3", "t1", "2024-01-01", 365),
            ],
        };
        Arc::new(SnapshotStore::in_memory(snapshot).unwrap())
    }

    #[test]
    fn run_reports_each_tenant() {
        let transport = Arc::new(RecordingTransport::default());
        let service = NotificationService::new(store(), transport.clone());

        let report = service.run(date("2024-12-15")).unwrap();

        let outcomes: Vec<(&str, &TenantOutcome)> = report
            .tenants
            .iter()
            .map(|t| (t.tenant_id.as_str(), &t.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("acme", &TenantOutcome::Sent { recipients: 1 }),
                ("beta", &TenantOutcome::Sent { recipients: 1 }),
                ("gamma", &TenantOutcome::SkippedNoRecipients),
            ]
        );

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].tenant_name, "ACME");
        assert_eq!(delivered[0].lines[0].days_to_expire, 17);
        assert_eq!(delivered[1].overdue_count(), 1);
    }

    #[test]
    fn one_failing_tenant_does_not_stop_the_run() {
        let transport = Arc::new(RecordingTransport {
            fail_for: Some("acme".into()),
            ..RecordingTransport::default()
        });
        let service = NotificationService::new(store(), transport.clone());

        let report = service.run(date("2024-12-15")).unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.sent(), 1);
        assert!(matches!(
            &report.tenants[0].outcome,
            TenantOutcome::Failed { reason } if reason.contains("mailbox unavailable")
        ));
        assert_eq!(transport.delivered.lock().unwrap()[0].tenant_id, "beta");
    }
}
