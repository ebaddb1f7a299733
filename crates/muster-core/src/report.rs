//! Check-in reports.
//!
//! Each member has at most one report per period. Resubmitting replaces every
//! mutable field wholesale; the previous state is noted in an append-only
//! history table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, member::Grade};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Self-reported safety status.
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
pub enum Status {
  Safe,
  Evacuating,
  NeedHelp,
  Unknown,
}

impl Status {
  pub const ALL: [Status; 4] =
    [Status::Safe, Status::Evacuating, Status::NeedHelp, Status::Unknown];

  /// Parse the wire form (`safe`, `need_help`, ...).
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::InvalidStatus(s.to_owned()))
  }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Fields ──────────────────────────────────────────────────────────────────

/// Every mutable column of a report. Applied wholesale on each submission:
/// a `None` here clears the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFields {
  pub status:        Status,
  pub contact_email: Option<String>,
  pub shelter_name:  Option<String>,
  pub shelter_type:  Option<String>,
  pub shelter_addr:  Option<String>,
  pub shelter_lat:   Option<f64>,
  pub shelter_lng:   Option<f64>,
  pub damage_level:  Option<String>,
  pub damage_notes:  Option<String>,
}

impl ReportFields {
  pub fn new(status: Status) -> Self {
    Self {
      status,
      contact_email: None,
      shelter_name: None,
      shelter_type: None,
      shelter_addr: None,
      shelter_lat: None,
      shelter_lng: None,
      damage_level: None,
      damage_notes: None,
    }
  }

  /// Names of the fields whose values differ between `self` and `next`.
  pub fn changed_fields(&self, next: &ReportFields) -> Vec<&'static str> {
    let mut changed = Vec::new();
    macro_rules! cmp {
      ($($field:ident),*) => {
        $(if self.$field != next.$field { changed.push(stringify!($field)); })*
      };
    }
    cmp!(
      status,
      contact_email,
      shelter_name,
      shelter_type,
      shelter_addr,
      shelter_lat,
      shelter_lng,
      damage_level,
      damage_notes
    );
    changed
  }
}

/// Unvalidated report fields as they arrive from a form. Blank strings are
/// treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportDraft {
  pub status:        Option<String>,
  pub contact_email: Option<String>,
  pub shelter_name:  Option<String>,
  pub shelter_type:  Option<String>,
  pub shelter_addr:  Option<String>,
  pub shelter_lat:   Option<String>,
  pub shelter_lng:   Option<String>,
  pub damage_level:  Option<String>,
  pub damage_notes:  Option<String>,
}

impl ReportDraft {
  pub fn into_fields(self) -> Result<ReportFields> {
    let status = Status::parse(self.status.as_deref().unwrap_or_default())?;
    Ok(ReportFields {
      status,
      contact_email: blank_to_none(self.contact_email),
      shelter_name: blank_to_none(self.shelter_name),
      shelter_type: blank_to_none(self.shelter_type),
      shelter_addr: blank_to_none(self.shelter_addr),
      shelter_lat: parse_coord("shelter_lat", self.shelter_lat)?,
      shelter_lng: parse_coord("shelter_lng", self.shelter_lng)?,
      damage_level: blank_to_none(self.damage_level),
      damage_notes: blank_to_none(self.damage_notes),
    })
  }
}

fn blank_to_none(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

fn parse_coord(field: &'static str, raw: Option<String>) -> Result<Option<f64>> {
  let Some(raw) = blank_to_none(raw) else {
    return Ok(None);
  };
  match raw.parse::<f64>() {
    Ok(v) if v.is_finite() => Ok(Some(v)),
    _ => Err(Error::InvalidNumber { field, value: raw }),
  }
}

// ─── Stored records ──────────────────────────────────────────────────────────

/// The single current report of one user in one period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
  pub period_id:  Uuid,
  pub user_id:    Uuid,
  #[serde(flatten)]
  pub fields:     ReportFields,
  pub updated_at: DateTime<Utc>,
}

/// One append-only audit entry, written whenever an existing report is
/// overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportHistory {
  pub history_id: Uuid,
  pub period_id:  Uuid,
  pub user_id:    Uuid,
  pub changed_at: DateTime<Utc>,
  /// Opaque JSON marker; see [`HistoryDiff`].
  pub diff:       Option<String>,
}

/// Payload written to [`ReportHistory::diff`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDiff {
  pub previous_updated_at: DateTime<Utc>,
  pub changed:             Vec<String>,
}

impl HistoryDiff {
  pub fn between(previous: &Report, next: &ReportFields) -> Self {
    Self {
      previous_updated_at: previous.updated_at,
      changed:             previous
        .fields
        .changed_fields(next)
        .into_iter()
        .map(str::to_owned)
        .collect(),
    }
  }

  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }
}

/// Result of [`crate::store::MusterStore::upsert_report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upserted {
  pub report:  Report,
  /// `true` on first submission in the period, `false` on overwrite.
  pub created: bool,
}

// ─── Admin view ──────────────────────────────────────────────────────────────

/// A report joined with the submitting user and their roster group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
  pub user_id:    Uuid,
  pub grade:      Grade,
  pub name:       String,
  pub email:      Option<String>,
  pub group_name: Option<String>,
  #[serde(flatten)]
  pub fields:     ReportFields,
  pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_wire_names() {
    assert_eq!(Status::parse("need_help").unwrap(), Status::NeedHelp);
    assert_eq!(Status::Evacuating.as_str(), "evacuating");
    assert_eq!(Status::Safe.to_string(), "safe");
    assert!(matches!(Status::parse("fine"), Err(Error::InvalidStatus(_))));
  }

  #[test]
  fn draft_blanks_become_none() {
    let fields = ReportDraft {
      status: Some("safe".into()),
      shelter_name: Some("  ".into()),
      shelter_lat: Some("".into()),
      damage_notes: Some(" roof tiles ".into()),
      ..Default::default()
    }
    .into_fields()
    .unwrap();
    assert_eq!(fields.shelter_name, None);
    assert_eq!(fields.shelter_lat, None);
    assert_eq!(fields.damage_notes.as_deref(), Some("roof tiles"));
  }

  #[test]
  fn draft_rejects_bad_coordinates() {
    let err = ReportDraft {
      status: Some("safe".into()),
      shelter_lng: Some("east".into()),
      ..Default::default()
    }
    .into_fields()
    .unwrap_err();
    assert!(matches!(err, Error::InvalidNumber { field: "shelter_lng", .. }));
  }

  #[test]
  fn draft_requires_status() {
    let err = ReportDraft::default().into_fields().unwrap_err();
    assert!(matches!(err, Error::InvalidStatus(_)));
  }

  #[test]
  fn changed_fields_lists_differences() {
    let a = ReportFields::new(Status::Safe);
    let mut b = a.clone();
    assert!(a.changed_fields(&b).is_empty());

    b.status = Status::NeedHelp;
    b.shelter_lat = Some(35.0);
    assert_eq!(a.changed_fields(&b), vec!["status", "shelter_lat"]);
  }
}
