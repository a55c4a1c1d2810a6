//! Constants used throughout the Exames core crate.
//!
//! Defaults that callers rely on (alert threshold, file locations, notification
//! wording) live here so the CLI, the REST API and the notifier agree on them.

/// Alert threshold applied when an exam type does not define one.
pub const DEFAULT_ALERT_THRESHOLD_DAYS: u32 = 30;

/// Default location of the record store snapshot.
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/exames.yaml";

/// Default directory for rendered notification messages.
pub const DEFAULT_OUTBOX_DIR: &str = "outbox";

/// Reference UTC offset used to decide what "today" is (Brasília time).
pub const DEFAULT_UTC_OFFSET: &str = "-03:00";

/// Default interval between notification runs, in seconds.
pub const DEFAULT_NOTIFY_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default sender address for expiry alerts.
pub const DEFAULT_SENDER: &str = "alertas@exames.local";

/// Subject line of expiry alert messages.
pub const NOTIFICATION_SUBJECT: &str = "Alerta: Exames Vencendo";

/// Display name used in the `From` header of expiry alerts.
pub const NOTIFICATION_SENDER_NAME: &str = "Controle de Exames";

/// Input format for calendar dates.
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Display format for calendar dates (pt-BR).
pub const DATE_DISPLAY_FORMAT: &str = "%d/%m/%Y";
