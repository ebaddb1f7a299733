//! Users, roster entries and member identity.
//!
//! A user is the identity record; a roster entry marks whether that user is
//! currently expected to check in. The public form identifies members by
//! `(grade, name)` rather than email, since email addresses may be shared or
//! missing.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Grade ───────────────────────────────────────────────────────────────────

/// A member category such as `Staff` or `Doctor`. Always stored normalised.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grade(String);

impl Grade {
  /// Grades offered by the public form, in display order.
  pub const KNOWN: [&'static str; 5] =
    ["Staff", "Doctor", "Master", "Bachelor", "Researcher"];

  /// Normalise free-form input: known aliases (including common misspellings
  /// and single-letter abbreviations) map to their canonical name; anything
  /// else is title-cased.
  pub fn normalize(raw: &str) -> Self {
    let lowered = raw.trim().to_lowercase();
    let canonical = match lowered.as_str() {
      "staff" => "Staff",
      "doctor" => "Doctor",
      "master" | "m" => "Master",
      "bachelor" | "bacholar" | "bachelar" | "b" => "Bachelor",
      "researcher" | "r" => "Researcher",
      _ => return Self(title_case(&lowered)),
    };
    Self(canonical.to_owned())
  }

  /// Wrap a value read back from storage, which was normalised on write.
  pub fn from_stored(s: impl Into<String>) -> Self { Self(s.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for Grade {
  fn default() -> Self { Self("Staff".to_owned()) }
}

impl fmt::Display for Grade {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Uppercase the first letter of every alphabetic run.
fn title_case(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut prev_alpha = false;
  for c in s.chars() {
    if c.is_alphabetic() && !prev_alpha {
      out.extend(c.to_uppercase());
    } else {
      out.push(c);
    }
    prev_alpha = c.is_alphabetic();
  }
  out
}

// ─── User ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Member,
  Admin,
}

/// An identity record. `(grade, name)` is unique across all users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id: Uuid,
  pub email:   Option<String>,
  pub grade:   Grade,
  pub name:    String,
  pub dept:    Option<String>,
  pub phone:   Option<String>,
  pub role:    Role,
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// At most one per user. Inactive entries are invisible to every summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
  pub roster_id:  Uuid,
  pub user_id:    Uuid,
  pub is_active:  bool,
  pub group_name: Option<String>,
}

/// A user together with their roster entry, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
  pub user:   User,
  pub roster: Option<RosterEntry>,
}

impl Member {
  /// `true` if the member has a roster entry flagged active.
  pub fn is_active(&self) -> bool {
    self.roster.as_ref().is_some_and(|r| r.is_active)
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// How a public request identifies the member it is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  GradeName { grade: Grade, name: String },
  Email(String),
}

impl Identity {
  /// Build an identity from optional request fields. Grade + name wins over
  /// email when both are present; blank strings count as absent.
  pub fn from_parts(
    grade: Option<&str>,
    name: Option<&str>,
    email: Option<&str>,
  ) -> Result<Self> {
    let grade = non_blank(grade);
    let name = non_blank(name);
    match (grade, name, non_blank(email)) {
      (Some(g), Some(n), _) => Ok(Self::GradeName {
        grade: Grade::normalize(g),
        name:  n.to_owned(),
      }),
      (_, _, Some(e)) => Ok(Self::Email(e.to_owned())),
      _ => Err(Error::MissingIdentity),
    }
  }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|s| !s.is_empty())
}

// ─── Import ──────────────────────────────────────────────────────────────────

/// One roster row from an uploaded table, already trimmed and normalised.
#[derive(Debug, Clone)]
pub struct RosterImportRow {
  pub grade:      Option<Grade>,
  pub name:       String,
  pub email:      Option<String>,
  pub dept:       Option<String>,
  pub phone:      Option<String>,
  pub group_name: Option<String>,
  pub is_active:  bool,
}

impl RosterImportRow {
  pub fn new(grade: Option<Grade>, name: impl Into<String>) -> Self {
    Self {
      grade,
      name: name.into(),
      email: None,
      dept: None,
      phone: None,
      group_name: None,
      is_active: true,
    }
  }
}

/// Outcome of [`crate::store::MusterStore::import_roster`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
  pub created: usize,
  pub updated: usize,
  pub skipped: usize,
}

/// Parse a spreadsheet-style boolean. Blank means `default`.
pub fn parse_flag(raw: Option<&str>, default: bool) -> bool {
  match non_blank(raw) {
    None => default,
    Some(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "y"),
  }
}
