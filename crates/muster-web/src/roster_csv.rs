//! CSV tables: roster upload, roster template and report export.
//!
//! Every file written here starts with a UTF-8 BOM so spreadsheet software
//! picks the right encoding; uploads may carry one too.

use chrono::SecondsFormat;
use muster_core::{
  member::{Grade, RosterImportRow, parse_flag},
  report::ReportRow,
};
use serde::Deserialize;

const BOM: &[u8] = b"\xEF\xBB\xBF";

pub const ROSTER_HEADER: [&str; 7] =
  ["grade", "name", "email", "dept", "phone", "group_name", "is_active"];

pub const EXPORT_HEADER: [&str; 11] = [
  "grade",
  "name",
  "email",
  "group_name",
  "status",
  "updated_at",
  "shelter_type",
  "shelter_name",
  "shelter_addr",
  "damage_level",
  "damage_notes",
];

/// One uploaded line. Missing columns read as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRosterRow {
  grade:      Option<String>,
  name:       Option<String>,
  email:      Option<String>,
  dept:       Option<String>,
  phone:      Option<String>,
  group_name: Option<String>,
  is_active:  Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvEmailRow {
  email: Option<String>,
}

/// Rows ready for import plus the number of lines dropped while parsing.
#[derive(Debug, Default)]
pub struct ParsedRoster {
  pub rows:    Vec<RosterImportRow>,
  pub skipped: usize,
}

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
  let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
  csv::ReaderBuilder::new()
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(bytes)
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Parse an uploaded roster. Lines without a name, or with neither grade
/// nor email, are counted as skipped.
pub fn parse_roster(bytes: &[u8]) -> Result<ParsedRoster, csv::Error> {
  let mut parsed = ParsedRoster::default();
  for record in reader(bytes).deserialize::<CsvRosterRow>() {
    let raw = record?;
    let grade = non_blank(raw.grade).map(|g| Grade::normalize(&g));
    let email = non_blank(raw.email);
    let Some(name) = non_blank(raw.name) else {
      parsed.skipped += 1;
      continue;
    };
    if grade.is_none() && email.is_none() {
      parsed.skipped += 1;
      continue;
    }

    let mut row = RosterImportRow::new(grade, name);
    row.email = email;
    row.dept = non_blank(raw.dept);
    row.phone = non_blank(raw.phone);
    row.group_name = non_blank(raw.group_name);
    row.is_active = parse_flag(raw.is_active.as_deref(), true);
    parsed.rows.push(row);
  }
  Ok(parsed)
}

/// The non-blank values of the `email` column.
pub fn parse_emails(bytes: &[u8]) -> Result<Vec<String>, csv::Error> {
  let mut emails = Vec::new();
  for record in reader(bytes).deserialize::<CsvEmailRow>() {
    if let Some(email) = non_blank(record?.email) {
      emails.push(email);
    }
  }
  Ok(emails)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
  writer.into_inner().map_err(|e| e.into_error().into())
}

fn writer() -> csv::Writer<Vec<u8>> { csv::Writer::from_writer(BOM.to_vec()) }

/// A downloadable example roster.
pub fn roster_template() -> Result<Vec<u8>, csv::Error> {
  let mut w = writer();
  w.write_record(ROSTER_HEADER)?;
  w.write_record([
    "Staff", "Alice", "alice@example.com", "Dept A", "090-0000-0000", "Lab A", "true",
  ])?;
  w.write_record([
    "Doctor", "Bob", "bob@example.com", "Dept B", "090-0000-0001", "Lab B", "true",
  ])?;
  w.write_record(["Master", "Carol", "", "Dept A", "", "Lab A", "true"])?;
  w.write_record(["Bachelor", "Dave", "", "Dept C", "", "Lab C", "false"])?;
  finish(w)
}

/// Report rows in [`EXPORT_HEADER`] order. Absent values are empty cells.
pub fn export_reports(rows: &[ReportRow]) -> Result<Vec<u8>, csv::Error> {
  let mut w = writer();
  w.write_record(EXPORT_HEADER)?;
  for r in rows {
    let f = &r.fields;
    let updated_at = r.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    w.write_record([
      r.grade.as_str(),
      r.name.as_str(),
      r.email.as_deref().unwrap_or_default(),
      r.group_name.as_deref().unwrap_or_default(),
      f.status.as_str(),
      updated_at.as_str(),
      f.shelter_type.as_deref().unwrap_or_default(),
      f.shelter_name.as_deref().unwrap_or_default(),
      f.shelter_addr.as_deref().unwrap_or_default(),
      f.damage_level.as_deref().unwrap_or_default(),
      f.damage_notes.as_deref().unwrap_or_default(),
    ])?;
  }
  finish(w)
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use muster_core::report::{ReportFields, Status};
  use uuid::Uuid;

  use super::*;

  #[test]
  fn parses_roster_with_bom_and_missing_columns() {
    let csv = "\u{feff}grade,name,email,group_name\n\
               m,Carol,,Lab A\n\
               ,Dave,dave@example.com,\n\
               ,Nobody,,\n\
               Staff,,x@example.com,\n";
    let parsed = parse_roster(csv.as_bytes()).unwrap();
    assert_eq!(parsed.skipped, 2);
    assert_eq!(parsed.rows.len(), 2);

    let carol = &parsed.rows[0];
    assert_eq!(carol.grade.as_ref().map(Grade::as_str), Some("Master"));
    assert_eq!(carol.email, None);
    assert_eq!(carol.group_name.as_deref(), Some("Lab A"));
    assert!(carol.is_active);

    let dave = &parsed.rows[1];
    assert!(dave.grade.is_none());
    assert_eq!(dave.email.as_deref(), Some("dave@example.com"));
  }

  #[test]
  fn parses_active_flag() {
    let csv = "grade,name,is_active\nStaff,A,no\nStaff,B,YES\nStaff,C,\n";
    let rows = parse_roster(csv.as_bytes()).unwrap().rows;
    let flags: Vec<_> = rows.iter().map(|r| r.is_active).collect();
    assert_eq!(flags, vec![false, true, true]);
  }

  #[test]
  fn parses_emails() {
    let csv = "name,email\nA,a@example.com\nB,\nC, c@example.com \n";
    assert_eq!(
      parse_emails(csv.as_bytes()).unwrap(),
      vec!["a@example.com", "c@example.com"]
    );
  }

  #[test]
  fn template_reimports_cleanly() {
    let bytes = roster_template().unwrap();
    assert!(bytes.starts_with(BOM));
    let parsed = parse_roster(&bytes).unwrap();
    assert_eq!(parsed.skipped, 0);
    assert_eq!(parsed.rows.len(), 4);
    assert!(!parsed.rows[3].is_active);
  }

  #[test]
  fn export_has_bom_header_and_blank_cells() {
    let mut fields = ReportFields::new(Status::NeedHelp);
    fields.damage_notes = Some("roof, partly".into());
    let row = ReportRow {
      user_id: Uuid::new_v4(),
      grade: Grade::normalize("doctor"),
      name: "Bob".into(),
      email: None,
      group_name: Some("Lab B".into()),
      fields,
      updated_at: Utc::now(),
    };
    let bytes = export_reports(&[row]).unwrap();
    let text = std::str::from_utf8(&bytes[BOM.len()..]).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next().unwrap(), EXPORT_HEADER.join(","));
    let line = lines.next().unwrap();
    assert!(line.starts_with("Doctor,Bob,,Lab B,need_help,"), "{line}");
    assert!(line.ends_with(",,,,,\"roof, partly\""), "{line}");
  }
}
