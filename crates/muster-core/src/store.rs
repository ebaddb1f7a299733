//! The `MusterStore` trait.
//!
//! Implemented by storage backends (e.g. `muster-store-sqlite`). The HTTP
//! layers (`muster-api`, `muster-web`) depend on this abstraction, not on any
//! concrete backend.

use std::{collections::BTreeMap, future::Future};

use uuid::Uuid;

use crate::{
  member::{Identity, ImportSummary, Member, RosterImportRow},
  period::{Period, PeriodReset},
  report::{Report, ReportFields, ReportHistory, ReportRow, Status, Upserted},
  summary::{Absentee, Summary},
};

/// Abstraction over a Muster storage backend.
///
/// Every write runs as a single transaction. Implementations must guarantee
/// that at most one period is open at any time and that each
/// `(period, user)` pair has at most one report, even under concurrent calls.
pub trait MusterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Periods ───────────────────────────────────────────────────────────

  /// The open period, if any.
  fn current_period(
    &self,
  ) -> impl Future<Output = Result<Option<Period>, Self::Error>> + Send + '_;

  /// The open period, creating `max(seq) + 1` if none is open.
  fn get_or_create_current_period(
    &self,
  ) -> impl Future<Output = Result<Period, Self::Error>> + Send + '_;

  /// Close the open period (creating it first if needed) and open the next.
  fn reset_period(
    &self,
  ) -> impl Future<Output = Result<PeriodReset, Self::Error>> + Send + '_;

  // ── Roster ────────────────────────────────────────────────────────────

  /// Look up a user and their roster entry. Email lookups that match more
  /// than one user return `None`.
  fn find_member(
    &self,
    identity: Identity,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + '_;

  /// Active roster names grouped by grade, both sorted.
  fn active_roster_by_grade(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<String, Vec<String>>, Self::Error>>
  + Send
  + '_;

  /// Upsert users and roster entries. With `replace`, every existing roster
  /// entry is deactivated first so only the imported set stays active.
  fn import_roster(
    &self,
    rows: Vec<RosterImportRow>,
    replace: bool,
  ) -> impl Future<Output = Result<ImportSummary, Self::Error>> + Send + '_;

  /// Delete the roster entries of users with any of these emails. Users and
  /// their reports are kept. Returns the number of entries removed.
  fn remove_from_roster(
    &self,
    emails: Vec<String>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reports ───────────────────────────────────────────────────────────

  /// Insert or wholesale-overwrite the report for `(period_id, user_id)`.
  /// Overwrites append a history row first. Fails if the period is closed.
  fn upsert_report(
    &self,
    period_id: Uuid,
    user_id: Uuid,
    fields: ReportFields,
  ) -> impl Future<Output = Result<Upserted, Self::Error>> + Send + '_;

  /// Like [`MusterStore::upsert_report`], against whichever period is open
  /// when the write transaction starts. `None` if no period is open. A reset
  /// racing the submission either lands before it (the report goes to the new
  /// period) or after it.
  fn upsert_current_report(
    &self,
    user_id: Uuid,
    fields: ReportFields,
  ) -> impl Future<Output = Result<Option<Upserted>, Self::Error>> + Send + '_;

  fn get_report(
    &self,
    period_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + '_;

  /// History rows for one member in one period, oldest first.
  fn report_history(
    &self,
    period_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ReportHistory>, Self::Error>> + Send + '_;

  /// Reports in the period joined with user and roster data, newest first.
  fn list_reports(
    &self,
    period_id: Uuid,
    status: Option<Status>,
  ) -> impl Future<Output = Result<Vec<ReportRow>, Self::Error>> + Send + '_;

  fn get_report_row(
    &self,
    period_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<ReportRow>, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  fn summary(
    &self,
    period_id: Uuid,
  ) -> impl Future<Output = Result<Summary, Self::Error>> + Send + '_;

  /// Active members without a report in the period, ordered by name.
  fn absentees(
    &self,
    period_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Absentee>, Self::Error>> + Send + '_;
}
