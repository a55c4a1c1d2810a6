//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Environment variables are read by the binaries only; the helpers here take the raw
//! optional values so they can be tested without touching the process environment.

use crate::constants::{
    DEFAULT_NOTIFY_INTERVAL_SECS, DEFAULT_OUTBOX_DIR, DEFAULT_SENDER, DEFAULT_SNAPSHOT_PATH,
    DEFAULT_UTC_OFFSET,
};
use crate::{ExamError, ExamResult};
use chrono::FixedOffset;
use exames_types::EmailAddress;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    snapshot_path: PathBuf,
    outbox_dir: PathBuf,
    reference_offset: FixedOffset,
    notify_interval: Duration,
    sender: EmailAddress,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::InvalidInput` if the notification interval is zero.
    pub fn new(
        snapshot_path: PathBuf,
        outbox_dir: PathBuf,
        reference_offset: FixedOffset,
        notify_interval: Duration,
        sender: EmailAddress,
    ) -> ExamResult<Self> {
        if notify_interval.is_zero() {
            return Err(ExamError::InvalidInput(
                "notification interval must be greater than zero".into(),
            ));
        }

        Ok(Self {
            snapshot_path,
            outbox_dir,
            reference_offset,
            notify_interval,
            sender,
        })
    }

    /// Build a configuration from raw (possibly unset) values, applying defaults.
    ///
    /// Arguments mirror `EXAMES_SNAPSHOT`, `EXAMES_OUTBOX_DIR`, `EXAMES_UTC_OFFSET`,
    /// `EXAMES_NOTIFY_INTERVAL_SECS` and `EXAMES_SENDER`.
    pub fn from_values(
        snapshot_path: Option<String>,
        outbox_dir: Option<String>,
        utc_offset: Option<String>,
        notify_interval_secs: Option<String>,
        sender: Option<String>,
    ) -> ExamResult<Self> {
        let snapshot_path = non_blank(snapshot_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH));
        let outbox_dir = non_blank(outbox_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTBOX_DIR));
        let sender = EmailAddress::new(
            non_blank(sender).unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        )?;

        Self::new(
            snapshot_path,
            outbox_dir,
            utc_offset_from_env_value(utc_offset)?,
            notify_interval_from_env_value(notify_interval_secs)?,
            sender,
        )
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn outbox_dir(&self) -> &Path {
        &self.outbox_dir
    }

    /// Offset used to project the wall clock onto a calendar day.
    pub fn reference_offset(&self) -> FixedOffset {
        self.reference_offset
    }

    pub fn notify_interval(&self) -> Duration {
        self.notify_interval
    }

    pub fn sender(&self) -> &EmailAddress {
        &self.sender
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a `±HH:MM` UTC offset.
///
/// If `value` is `None` or blank, returns the default reference offset (`-03:00`).
pub fn utc_offset_from_env_value(value: Option<String>) -> ExamResult<FixedOffset> {
    let raw = non_blank(value).unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
    let invalid = || ExamError::InvalidInput(format!("invalid UTC offset {raw:?} (expected ±HH:MM)"));

    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parse the notification interval in seconds, defaulting to one day.
pub fn notify_interval_from_env_value(value: Option<String>) -> ExamResult<Duration> {
    match non_blank(value) {
        None => Ok(Duration::from_secs(DEFAULT_NOTIFY_INTERVAL_SECS)),
        Some(raw) => {
            let secs: u64 = raw.parse().map_err(|_| {
                ExamError::InvalidInput(format!("invalid notification interval {raw:?}"))
            })?;
            if secs == 0 {
                return Err(ExamError::InvalidInput(
                    "notification interval must be greater than zero".into(),
                ));
            }
            Ok(Duration::from_secs(secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_values_are_missing() {
        let cfg = CoreConfig::from_values(None, Some("  ".into()), None, None, None).unwrap();
        assert_eq!(cfg.snapshot_path(), Path::new(DEFAULT_SNAPSHOT_PATH));
        assert_eq!(cfg.outbox_dir(), Path::new(DEFAULT_OUTBOX_DIR));
        assert_eq!(cfg.reference_offset().local_minus_utc(), -3 * 3600);
        assert_eq!(cfg.notify_interval(), Duration::from_secs(86_400));
        assert_eq!(cfg.sender().as_str(), DEFAULT_SENDER);
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(
            utc_offset_from_env_value(Some("+05:30".into()))
                .unwrap()
                .local_minus_utc(),
            5 * 3600 + 30 * 60
        );
        assert_eq!(
            utc_offset_from_env_value(Some("-00:00".into()))
                .unwrap()
                .local_minus_utc(),
            0
        );
    }

    #[test]
    fn rejects_malformed_offsets() {
        for bad in ["03:00", "+3:00", "+03", "+25:00", "-03:75", "abc"] {
            assert!(
                utc_offset_from_env_value(Some(bad.into())).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_or_garbage_interval() {
        assert!(notify_interval_from_env_value(Some("0".into())).is_err());
        assert!(notify_interval_from_env_value(Some("daily".into())).is_err());
        assert_eq!(
            notify_interval_from_env_value(Some("3600".into())).unwrap(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn rejects_invalid_sender() {
        let err = CoreConfig::from_values(None, None, None, None, Some("nobody".into()))
            .unwrap_err();
        assert!(matches!(err, ExamError::Email(_)));
    }
}
