//! # Exames Core
//!
//! Core business logic for occupational-health exam tracking.
//!
//! This crate contains the expiry engine and the services built on it:
//! - Expiry classification and expiry-date derivation ([`expiry`])
//! - Active-record selection per colaborador, exam type and procedure set ([`active`])
//! - Per-tenant notification aggregation and the notifier ([`notification`])
//! - Dashboard read models ([`dashboard`])
//! - Record store and notification transport ports, with file-backed adapters
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest` and `cli`.

pub mod active;
pub mod clock;
pub mod colaborador;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod exam;
pub mod expiry;
pub mod money;
pub mod notification;
pub mod repositories;
pub mod row;
pub mod service;
pub mod tenant;
pub mod transport;
pub mod validation;

pub use active::{select_active, select_active_by, ActiveExamSet, ActiveSet, GroupKey};
pub use clock::{Clock, FixedClock, SystemClock};
pub use colaborador::Colaborador;
pub use config::CoreConfig;
pub use error::{ExamError, ExamResult};
pub use exam::{ExamRecord, ExamType, ExamUpdate, NewExam, Procedure};
pub use expiry::{classify, derive_expiry_date, Classification, DerivedExamView, ExamStatus};
pub use money::Money;
pub use notification::{
    aggregate_for_notification, AttentionItem, NotificationReport, NotificationService,
    TenantNotification, TenantOutcome,
};
pub use repositories::snapshot::{Snapshot, SnapshotStore};
pub use repositories::RecordStore;
pub use row::ExamRow;
pub use service::ExamService;
pub use tenant::{Recipient, Tenant};
pub use transport::{LogTransport, NotificationTransport, OutboxTransport};

pub use exames_types::{EmailAddress, NonEmptyText};
