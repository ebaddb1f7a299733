//! Reporting periods.
//!
//! A period is a bounded reporting window. Exactly one period is open
//! (`ended_at == None`) at any time; resetting closes it and opens the next
//! one in sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
  pub period_id:  Uuid,
  /// Strictly increasing across all periods, starting at 1.
  pub seq:        i64,
  pub started_at: DateTime<Utc>,
  pub ended_at:   Option<DateTime<Utc>>,
}

impl Period {
  pub fn is_open(&self) -> bool { self.ended_at.is_none() }
}

/// Result of [`crate::store::MusterStore::reset_period`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodReset {
  pub closed: Period,
  pub opened: Period,
}
