//! Source of "today".
//!
//! Nothing in the engine reads the system clock directly. Services take a [`Clock`] and
//! pass the resulting date down, so a whole run sees one consistent day.

use crate::expiry::calendar_day_in;
use chrono::{FixedOffset, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    /// The current calendar day in the reference offset.
    fn today(&self) -> NaiveDate;
}

/// Wall clock projected onto a fixed reference offset.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        calendar_day_in(&Utc::now(), self.offset)
    }
}

/// A clock stuck on one day. Used by tests and `--today` overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
