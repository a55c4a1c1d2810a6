//! Notification delivery.
//!
//! Sending email is the job of an external mail service. The core only renders the
//! message and hands it to a [`NotificationTransport`]. Two adapters ship with the crate:
//! [`outbox::OutboxTransport`] writes each message as an `.eml` file for a mail relay to
//! pick up, and [`LogTransport`] just logs it.

pub mod outbox;

use crate::notification::TenantNotification;
use crate::ExamResult;

pub use outbox::OutboxTransport;

pub trait NotificationTransport: Send + Sync {
    /// Delivers one tenant's alert.
    ///
    /// # Errors
    /// Returns `ExamError::Transport` (or an I/O error) if the message could not be handed off.
    fn deliver(&self, notification: &TenantNotification) -> ExamResult<()>;
}

/// Transport that only emits `tracing` events. Useful for dry runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTransport;

impl NotificationTransport for LogTransport {
    fn deliver(&self, notification: &TenantNotification) -> ExamResult<()> {
        let recipients: Vec<&str> = notification
            .recipients
            .iter()
            .map(|r| r.as_str())
            .collect();

        tracing::info!(
            tenant_id = %notification.tenant_id,
            recipients = ?recipients,
            lines = notification.lines.len(),
            "expiry alert (log only)"
        );
        for line in &notification.lines {
            tracing::info!(
                tenant_id = %notification.tenant_id,
                colaborador = %line.colaborador_name,
                exam = %line.exam_label,
                expiry_date = %line.expiry_date,
                overdue = line.is_overdue,
                "expiry alert line"
            );
        }
        Ok(())
    }
}
