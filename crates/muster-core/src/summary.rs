//! Computed read models over the active roster.
//!
//! Never stored; always derived at query time by left-joining the active
//! roster to the current period's reports, so every active member is counted
//! exactly once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::member::Grade;

/// Summary bucket: a reported [`crate::report::Status`], or `no_report` for
/// active members who have not submitted in the period.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CountStatus {
  Safe,
  Evacuating,
  NeedHelp,
  Unknown,
  NoReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
  pub status: CountStatus,
  pub n:      u64,
}

/// Status counts for the current period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
  pub total_roster: u64,
  pub counts:       Vec<SummaryItem>,
  /// Same counts keyed by roster group; members without a group land
  /// under `"-"`.
  pub by_group:     BTreeMap<String, Vec<SummaryItem>>,
}

impl Summary {
  /// Count for one bucket, zero if absent.
  pub fn count(&self, status: CountStatus) -> u64 {
    self
      .counts
      .iter()
      .find(|c| c.status == status)
      .map_or(0, |c| c.n)
  }
}

/// An active roster member with no report in the current period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Absentee {
  pub user_id:    Uuid,
  pub grade:      Grade,
  pub name:       String,
  pub email:      Option<String>,
  pub group_name: Option<String>,
}
