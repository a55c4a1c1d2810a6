//! File outbox transport.

use crate::constants::{DATE_DISPLAY_FORMAT, NOTIFICATION_SENDER_NAME, NOTIFICATION_SUBJECT};
use crate::notification::TenantNotification;
use crate::transport::NotificationTransport;
use crate::{ExamError, ExamResult};
use exames_types::EmailAddress;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes each alert as an HTML email (`.eml`) into a directory.
///
/// Files are named `<generated_on>-<encoded tenant_id>.eml`; a second run on the same day for the
/// same tenant replaces the earlier file.
#[derive(Clone, Debug)]
pub struct OutboxTransport {
    dir: PathBuf,
    sender: EmailAddress,
}

impl OutboxTransport {
    pub fn new(dir: impl Into<PathBuf>, sender: EmailAddress) -> Self {
        Self {
            dir: dir.into(),
            sender,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the message for `notification` is written to.
    ///
    /// The tenant id is percent-encoded byte by byte outside `[A-Za-z0-9_-]`, so distinct
    /// tenants never share a file and the name cannot leave the outbox directory.
    pub fn message_path(&self, notification: &TenantNotification) -> PathBuf {
        let mut tenant = String::with_capacity(notification.tenant_id.len());
        for byte in notification.tenant_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                tenant.push(char::from(byte));
            } else {
                tenant.push_str(&format!("%{byte:02X}"));
            }
        }
        self.dir
            .join(format!("{}-{}.eml", notification.generated_on, tenant))
    }

    /// Renders the full message: headers, a blank line and the HTML body.
    pub fn render(&self, notification: &TenantNotification) -> String {
        let to: Vec<&str> = notification
            .recipients
            .iter()
            .map(|r| r.as_str())
            .collect();

        let mut message = format!(
            "From: {} <{}>\nTo: {}\nSubject: {}\n",
            NOTIFICATION_SENDER_NAME,
            self.sender.as_str(),
            to.join(", "),
            NOTIFICATION_SUBJECT
        );
        message.push_str("MIME-Version: 1.0\n");
        message.push_str("Content-Type: text/html; charset=utf-8\n");
        message.push('\n');
        message.push_str(&render_html(notification));
        message
    }
}

fn render_html(notification: &TenantNotification) -> String {
    let mut html = String::new();
    html.push_str("<html><body>\n");
    html.push_str(&format!("<h2>{}</h2>\n", escape(NOTIFICATION_SUBJECT)));
    html.push_str(&format!(
        "<p>{}: os exames abaixo estão vencidos ou próximos do vencimento.</p>\n",
        escape(&notification.tenant_name)
    ));
    html.push_str("<table border=\"1\" cellpadding=\"4\" cellspacing=\"0\">\n");
    html.push_str(
        "<tr><th>Colaborador</th><th>Exame</th><th>Vencimento</th><th>Situação</th></tr>\n",
    );

    for line in &notification.lines {
        let situation = if line.is_overdue {
            "<strong style=\"color:#b00020\">VENCIDO</strong>".to_string()
        } else {
            format!("vence em {} dia(s)", line.days_to_expire)
        };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&line.colaborador_name),
            escape(&line.exam_label),
            line.expiry_date.format(DATE_DISPLAY_FORMAT),
            situation
        ));
    }

    html.push_str("</table>\n");
    html.push_str(&format!(
        "<p>Gerado em {}.</p>\n",
        notification.generated_on.format(DATE_DISPLAY_FORMAT)
    ));
    html.push_str("</body></html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl NotificationTransport for OutboxTransport {
    fn deliver(&self, notification: &TenantNotification) -> ExamResult<()> {
        if notification.recipients.is_empty() {
            return Err(ExamError::Transport(format!(
                "no recipients for tenant {}",
                notification.tenant_id
            )));
        }

        fs::create_dir_all(&self.dir).map_err(ExamError::DirCreation)?;
        let path = self.message_path(notification);
        fs::write(&path, self.render(notification)).map_err(ExamError::FileWrite)?;

        tracing::debug!(path = %path.display(), "wrote alert to outbox");
        Ok(())
    }
}
