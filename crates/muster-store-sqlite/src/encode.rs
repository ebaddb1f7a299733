//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision, so string order equals time order in `ORDER BY`. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use muster_core::{
  member::{Grade, Member, Role, RosterEntry, User},
  period::Period,
  report::{Report, ReportFields, ReportHistory, ReportRow, Status},
  summary::{Absentee, CountStatus},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<Status> {
  s.parse().map_err(|_| Error::UnknownValue {
    column: "status",
    value:  s.to_owned(),
  })
}

pub fn decode_count_status(s: &str) -> Result<CountStatus> {
  s.parse().map_err(|_| Error::UnknownValue {
    column: "status",
    value:  s.to_owned(),
  })
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "member" => Ok(Role::Member),
    "admin" => Ok(Role::Admin),
    other => Err(Error::UnknownValue {
      column: "role",
      value:  other.to_owned(),
    }),
  }
}

// ─── Periods ─────────────────────────────────────────────────────────────────

pub const PERIOD_COLS: &str = "period_id, seq, started_at, ended_at";

/// Raw values from a `periods` row.
pub struct RawPeriod {
  pub period_id:  String,
  pub seq:        i64,
  pub started_at: String,
  pub ended_at:   Option<String>,
}

impl RawPeriod {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_id:  row.get(0)?,
      seq:        row.get(1)?,
      started_at: row.get(2)?,
      ended_at:   row.get(3)?,
    })
  }

  pub fn into_period(self) -> Result<Period> {
    Ok(Period {
      period_id:  decode_uuid(&self.period_id)?,
      seq:        self.seq,
      started_at: decode_dt(&self.started_at)?,
      ended_at:   self.ended_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

// ─── Members ─────────────────────────────────────────────────────────────────

/// `users u LEFT JOIN rosters r` column list matching [`RawMember::from_row`].
pub const MEMBER_COLS: &str = "u.user_id, u.email, u.grade, u.name, u.dept, \
                               u.phone, u.role, r.roster_id, r.is_active, \
                               r.group_name";

pub struct RawMember {
  pub user_id:    String,
  pub email:      Option<String>,
  pub grade:      String,
  pub name:       String,
  pub dept:       Option<String>,
  pub phone:      Option<String>,
  pub role:       String,
  pub roster_id:  Option<String>,
  pub is_active:  Option<bool>,
  pub group_name: Option<String>,
}

impl RawMember {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      email:      row.get(1)?,
      grade:      row.get(2)?,
      name:       row.get(3)?,
      dept:       row.get(4)?,
      phone:      row.get(5)?,
      role:       row.get(6)?,
      roster_id:  row.get(7)?,
      is_active:  row.get(8)?,
      group_name: row.get(9)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    let user_id = decode_uuid(&self.user_id)?;
    let roster = match self.roster_id {
      Some(id) => Some(RosterEntry {
        roster_id: decode_uuid(&id)?,
        user_id,
        is_active: self.is_active.unwrap_or(false),
        group_name: self.group_name,
      }),
      None => None,
    };
    Ok(Member {
      user: User {
        user_id,
        email: self.email,
        grade: Grade::from_stored(self.grade),
        name: self.name,
        dept: self.dept,
        phone: self.phone,
        role: decode_role(&self.role)?,
      },
      roster,
    })
  }
}

// ─── Report fields ───────────────────────────────────────────────────────────

/// The mutable `reports_p` columns in [`ReportFields`] order. Selected and
/// written as one block so the field list lives in exactly one place.
pub const FIELD_COLS: &str = "status, contact_email, shelter_name, \
                              shelter_type, shelter_addr, shelter_lat, \
                              shelter_lng, damage_level, damage_notes";

/// Number of columns in [`FIELD_COLS`].
pub const FIELD_COUNT: usize = 9;

pub struct RawFields {
  pub status:        String,
  pub contact_email: Option<String>,
  pub shelter_name:  Option<String>,
  pub shelter_type:  Option<String>,
  pub shelter_addr:  Option<String>,
  pub shelter_lat:   Option<f64>,
  pub shelter_lng:   Option<f64>,
  pub damage_level:  Option<String>,
  pub damage_notes:  Option<String>,
}

impl RawFields {
  /// Read [`FIELD_COLS`] starting at column index `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      status:        row.get(at)?,
      contact_email: row.get(at + 1)?,
      shelter_name:  row.get(at + 2)?,
      shelter_type:  row.get(at + 3)?,
      shelter_addr:  row.get(at + 4)?,
      shelter_lat:   row.get(at + 5)?,
      shelter_lng:   row.get(at + 6)?,
      damage_level:  row.get(at + 7)?,
      damage_notes:  row.get(at + 8)?,
    })
  }

  pub fn encode(f: &ReportFields) -> Self {
    Self {
      status:        f.status.as_str().to_owned(),
      contact_email: f.contact_email.clone(),
      shelter_name:  f.shelter_name.clone(),
      shelter_type:  f.shelter_type.clone(),
      shelter_addr:  f.shelter_addr.clone(),
      shelter_lat:   f.shelter_lat,
      shelter_lng:   f.shelter_lng,
      damage_level:  f.damage_level.clone(),
      damage_notes:  f.damage_notes.clone(),
    }
  }

  pub fn into_fields(self) -> Result<ReportFields> {
    Ok(ReportFields {
      status:        decode_status(&self.status)?,
      contact_email: self.contact_email,
      shelter_name:  self.shelter_name,
      shelter_type:  self.shelter_type,
      shelter_addr:  self.shelter_addr,
      shelter_lat:   self.shelter_lat,
      shelter_lng:   self.shelter_lng,
      damage_level:  self.damage_level,
      damage_notes:  self.damage_notes,
    })
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// A `reports_p` row: `period_id, user_id, <FIELD_COLS>, updated_at`.
pub struct RawReport {
  pub period_id:  String,
  pub user_id:    String,
  pub fields:     RawFields,
  pub updated_at: String,
}

impl RawReport {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_id:  row.get(0)?,
      user_id:    row.get(1)?,
      fields:     RawFields::from_row(row, 2)?,
      updated_at: row.get(2 + FIELD_COUNT)?,
    })
  }

  pub fn into_report(self) -> Result<Report> {
    Ok(Report {
      period_id:  decode_uuid(&self.period_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      fields:     self.fields.into_fields()?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Joined admin view:
/// `u.user_id, u.grade, u.name, u.email, r.group_name, <FIELD_COLS>, updated_at`.
pub struct RawReportRow {
  pub user_id:    String,
  pub grade:      String,
  pub name:       String,
  pub email:      Option<String>,
  pub group_name: Option<String>,
  pub fields:     RawFields,
  pub updated_at: String,
}

impl RawReportRow {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      grade:      row.get(1)?,
      name:       row.get(2)?,
      email:      row.get(3)?,
      group_name: row.get(4)?,
      fields:     RawFields::from_row(row, 5)?,
      updated_at: row.get(5 + FIELD_COUNT)?,
    })
  }

  pub fn into_row(self) -> Result<ReportRow> {
    Ok(ReportRow {
      user_id:    decode_uuid(&self.user_id)?,
      grade:      Grade::from_stored(self.grade),
      name:       self.name,
      email:      self.email,
      group_name: self.group_name,
      fields:     self.fields.into_fields()?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawHistory {
  pub history_id: String,
  pub period_id:  String,
  pub user_id:    String,
  pub changed_at: String,
  pub diff:       Option<String>,
}

impl RawHistory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id: row.get(0)?,
      period_id:  row.get(1)?,
      user_id:    row.get(2)?,
      changed_at: row.get(3)?,
      diff:       row.get(4)?,
    })
  }

  pub fn into_history(self) -> Result<ReportHistory> {
    Ok(ReportHistory {
      history_id: decode_uuid(&self.history_id)?,
      period_id:  decode_uuid(&self.period_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      changed_at: decode_dt(&self.changed_at)?,
      diff:       self.diff,
    })
  }
}

pub struct RawAbsentee {
  pub user_id:    String,
  pub grade:      String,
  pub name:       String,
  pub email:      Option<String>,
  pub group_name: Option<String>,
}

impl RawAbsentee {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      grade:      row.get(1)?,
      name:       row.get(2)?,
      email:      row.get(3)?,
      group_name: row.get(4)?,
    })
  }

  pub fn into_absentee(self) -> Result<Absentee> {
    Ok(Absentee {
      user_id:    decode_uuid(&self.user_id)?,
      grade:      Grade::from_stored(self.grade),
      name:       self.name,
      email:      self.email,
      group_name: self.group_name,
    })
  }
}
