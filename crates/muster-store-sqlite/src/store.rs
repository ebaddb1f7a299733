//! [`SqliteStore`], the SQLite implementation of [`MusterStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use muster_core::{
  member::{Grade, Identity, ImportSummary, Member, RosterImportRow},
  period::{Period, PeriodReset},
  report::{
    HistoryDiff, Report, ReportFields, ReportHistory, ReportRow, Status, Upserted,
  },
  store::MusterStore,
  summary::{Absentee, Summary, SummaryItem},
};

use crate::{
  encode::{
    decode_count_status, decode_dt, decode_uuid, encode_dt, encode_uuid, RawAbsentee,
    RawFields, RawHistory, RawMember, RawPeriod, RawReport, RawReportRow, FIELD_COLS,
    MEMBER_COLS, PERIOD_COLS,
  },
  migrate,
  schema::{INDEXES, SCHEMA},
  Error, Result,
};

/// Joined admin view column list matching [`RawReportRow::from_row`].
fn report_row_select() -> String {
  format!(
    "SELECT u.user_id, u.grade, u.name, u.email, r.group_name,
            {FIELD_COLS}, rp.updated_at
     FROM reports_p rp
     JOIN users u        ON u.user_id = rp.user_id
     LEFT JOIN rosters r ON r.user_id = rp.user_id"
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, migrating older databases.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        migrate::bootstrap(conn)?;
        conn.execute_batch(INDEXES)?;
        migrate::ensure_grade_name_unique(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn select_open_period(
  conn: &rusqlite::Connection,
) -> rusqlite::Result<Option<RawPeriod>> {
  conn
    .query_row(
      &format!("SELECT {PERIOD_COLS} FROM periods WHERE ended_at IS NULL"),
      [],
      RawPeriod::from_row,
    )
    .optional()
}

/// Insert the period following the highest `seq` so far (1 on an empty table).
fn open_next_period(
  conn: &rusqlite::Connection,
  now: &str,
) -> rusqlite::Result<RawPeriod> {
  let seq: i64 = conn.query_row(
    "SELECT COALESCE(MAX(seq), 0) + 1 FROM periods",
    [],
    |r| r.get(0),
  )?;
  let raw = RawPeriod {
    period_id:  encode_uuid(Uuid::new_v4()),
    seq,
    started_at: now.to_owned(),
    ended_at:   None,
  };
  conn.execute(
    "INSERT INTO periods (period_id, seq, started_at) VALUES (?1, ?2, ?3)",
    rusqlite::params![raw.period_id, raw.seq, raw.started_at],
  )?;
  Ok(raw)
}

fn find_user_id(
  conn: &rusqlite::Connection,
  grade: &str,
  name: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT user_id FROM users WHERE grade = ?1 AND name = ?2",
      rusqlite::params![grade, name],
      |r| r.get(0),
    )
    .optional()
}

/// Decode failures inside a connection closure surface as database errors.
fn in_call(e: impl std::error::Error + Send + Sync + 'static) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Record `next` as the report for `(period_id, user_id)` inside an open
/// transaction, first appending a history row if a report is being replaced.
/// Returns `true` if no report existed.
fn write_report(
  tx: &rusqlite::Transaction<'_>,
  pid_str: &str,
  uid_str: &str,
  next: &ReportFields,
  now: &str,
) -> std::result::Result<bool, tokio_rusqlite::Error> {
  let previous = tx
    .query_row(
      &format!(
        "SELECT period_id, user_id, {FIELD_COLS}, updated_at FROM reports_p
         WHERE period_id = ?1 AND user_id = ?2"
      ),
      rusqlite::params![pid_str, uid_str],
      RawReport::from_row,
    )
    .optional()?;

  let created = previous.is_none();
  if let Some(previous) = previous {
    let previous = previous.into_report().map_err(in_call)?;
    let diff = HistoryDiff::between(&previous, next)
      .to_json()
      .map_err(in_call)?;
    tx.execute(
      "INSERT INTO report_history_p (history_id, period_id, user_id, changed_at, diff)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![encode_uuid(Uuid::new_v4()), pid_str, uid_str, now, diff],
    )?;
  }

  let raw = RawFields::encode(next);
  tx.execute(
    &format!(
      "INSERT INTO reports_p (period_id, user_id, {FIELD_COLS}, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
       ON CONFLICT(period_id, user_id) DO UPDATE SET
         status        = excluded.status,
         contact_email = excluded.contact_email,
         shelter_name  = excluded.shelter_name,
         shelter_type  = excluded.shelter_type,
         shelter_addr  = excluded.shelter_addr,
         shelter_lat   = excluded.shelter_lat,
         shelter_lng   = excluded.shelter_lng,
         damage_level  = excluded.damage_level,
         damage_notes  = excluded.damage_notes,
         updated_at    = excluded.updated_at"
    ),
    rusqlite::params![
      pid_str,
      uid_str,
      raw.status,
      raw.contact_email,
      raw.shelter_name,
      raw.shelter_type,
      raw.shelter_addr,
      raw.shelter_lat,
      raw.shelter_lng,
      raw.damage_level,
      raw.damage_notes,
      now,
    ],
  )?;
  Ok(created)
}

/// What `upsert_report` found inside its transaction.
enum UpsertOutcome {
  PeriodMissing,
  PeriodClosed,
  Written { created: bool },
}

// ─── MusterStore impl ────────────────────────────────────────────────────────

impl MusterStore for SqliteStore {
  type Error = Error;

  // ── Periods ───────────────────────────────────────────────────────────────

  async fn current_period(&self) -> Result<Option<Period>> {
    let raw = self
      .conn
      .call(|conn| Ok(select_open_period(conn)?))
      .await?;
    raw.map(RawPeriod::into_period).transpose()
  }

  async fn get_or_create_current_period(&self) -> Result<Period> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = match select_open_period(&tx)? {
          Some(open) => open,
          None => open_next_period(&tx, &now)?,
        };
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_period()
  }

  async fn reset_period(&self) -> Result<PeriodReset> {
    let now = encode_dt(Utc::now());

    let (closed, opened) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut closed = match select_open_period(&tx)? {
          Some(open) => open,
          None => open_next_period(&tx, &now)?,
        };
        tx.execute(
          "UPDATE periods SET ended_at = ?2 WHERE period_id = ?1",
          rusqlite::params![closed.period_id, now],
        )?;
        closed.ended_at = Some(now.clone());
        let opened = open_next_period(&tx, &now)?;
        tx.commit()?;
        Ok((closed, opened))
      })
      .await?;

    Ok(PeriodReset {
      closed: closed.into_period()?,
      opened: opened.into_period()?,
    })
  }

  // ── Roster ────────────────────────────────────────────────────────────────

  async fn find_member(&self, identity: Identity) -> Result<Option<Member>> {
    let raws: Vec<RawMember> = self
      .conn
      .call(move |conn| {
        let base = format!(
          "SELECT {MEMBER_COLS} FROM users u
           LEFT JOIN rosters r ON r.user_id = u.user_id"
        );
        let rows = match identity {
          Identity::GradeName { grade, name } => {
            let mut stmt =
              conn.prepare(&format!("{base} WHERE u.grade = ?1 AND u.name = ?2"))?;
            stmt
              .query_map(
                rusqlite::params![grade.as_str(), name],
                RawMember::from_row,
              )?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
          Identity::Email(email) => {
            let mut stmt =
              conn.prepare(&format!("{base} WHERE u.email = ?1 LIMIT 2"))?;
            stmt
              .query_map(rusqlite::params![email], RawMember::from_row)?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
        };
        Ok(rows)
      })
      .await?;

    // A shared email cannot identify anyone.
    if raws.len() != 1 {
      return Ok(None);
    }
    raws.into_iter().next().map(RawMember::into_member).transpose()
  }

  async fn active_roster_by_grade(&self) -> Result<BTreeMap<String, Vec<String>>> {
    let pairs: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT u.grade, u.name FROM rosters r
           JOIN users u ON u.user_id = r.user_id
           WHERE r.is_active = 1
           ORDER BY u.grade, u.name",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut by_grade: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (grade, name) in pairs {
      by_grade.entry(grade).or_default().push(name);
    }
    Ok(by_grade)
  }

  async fn import_roster(
    &self,
    rows: Vec<RosterImportRow>,
    replace: bool,
  ) -> Result<ImportSummary> {
    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if replace {
          tx.execute("UPDATE rosters SET is_active = 0", [])?;
        }

        let mut summary = ImportSummary::default();
        for row in rows {
          let name = row.name.trim();
          if name.is_empty() || (row.grade.is_none() && row.email.is_none()) {
            summary.skipped += 1;
            continue;
          }

          let existing = match (&row.grade, &row.email) {
            (Some(grade), _) => find_user_id(&tx, grade.as_str(), name)?,
            (None, Some(email)) => {
              let by_email = tx
                .query_row(
                  "SELECT user_id FROM users WHERE email = ?1 LIMIT 1",
                  rusqlite::params![email],
                  |r| r.get(0),
                )
                .optional()?;
              match by_email {
                Some(id) => Some(id),
                None => find_user_id(&tx, Grade::default().as_str(), name)?,
              }
            }
            (None, None) => None,
          };

          let user_id = match existing {
            Some(user_id) => {
              tx.execute(
                "UPDATE users SET email = COALESCE(?2, email),
                                  dept  = COALESCE(?3, dept),
                                  phone = COALESCE(?4, phone)
                 WHERE user_id = ?1",
                rusqlite::params![user_id, row.email, row.dept, row.phone],
              )?;
              summary.updated += 1;
              user_id
            }
            None => {
              let user_id = encode_uuid(Uuid::new_v4());
              let grade = row.grade.clone().unwrap_or_default();
              tx.execute(
                "INSERT INTO users (user_id, email, grade, name, dept, phone)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                  user_id,
                  row.email,
                  grade.as_str(),
                  name,
                  row.dept,
                  row.phone,
                ],
              )?;
              summary.created += 1;
              user_id
            }
          };

          tx.execute(
            "INSERT INTO rosters (roster_id, user_id, is_active, group_name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
               is_active  = excluded.is_active,
               group_name = excluded.group_name",
            rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              user_id,
              row.is_active,
              row.group_name,
            ],
          )?;
        }

        tx.commit()?;
        Ok(summary)
      })
      .await?;

    Ok(summary)
  }

  async fn remove_from_roster(&self, emails: Vec<String>) -> Result<usize> {
    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut removed = 0;
        for email in emails.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
          removed += tx.execute(
            "DELETE FROM rosters
             WHERE user_id IN (SELECT user_id FROM users WHERE email = ?1)",
            rusqlite::params![email],
          )?;
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;

    Ok(removed)
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  async fn upsert_report(
    &self,
    period_id: Uuid,
    user_id:   Uuid,
    fields:    ReportFields,
  ) -> Result<Upserted> {
    let now     = encode_dt(Utc::now());
    let pid_str = encode_uuid(period_id);
    let uid_str = encode_uuid(user_id);
    let next    = fields.clone();

    let (outcome, updated_at) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ended: Option<Option<String>> = tx
          .query_row(
            "SELECT ended_at FROM periods WHERE period_id = ?1",
            rusqlite::params![pid_str],
            |r| r.get(0),
          )
          .optional()?;
        match ended {
          None => return Ok((UpsertOutcome::PeriodMissing, now)),
          Some(Some(_)) => return Ok((UpsertOutcome::PeriodClosed, now)),
          Some(None) => {}
        }

        let created = write_report(&tx, &pid_str, &uid_str, &next, &now)?;
        tx.commit()?;
        Ok((UpsertOutcome::Written { created }, now))
      })
      .await?;

    match outcome {
      UpsertOutcome::PeriodMissing => Err(Error::PeriodNotFound(period_id)),
      UpsertOutcome::PeriodClosed => Err(Error::PeriodClosed(period_id)),
      UpsertOutcome::Written { created } => Ok(Upserted {
        report: Report {
          period_id,
          user_id,
          fields,
          updated_at: decode_dt(&updated_at)?,
        },
        created,
      }),
    }
  }

  async fn upsert_current_report(
    &self,
    user_id: Uuid,
    fields:  ReportFields,
  ) -> Result<Option<Upserted>> {
    let now     = encode_dt(Utc::now());
    let uid_str = encode_uuid(user_id);
    let next    = fields.clone();

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(open) = select_open_period(&tx)? else {
          return Ok(None);
        };
        let created = write_report(&tx, &open.period_id, &uid_str, &next, &now)?;
        tx.commit()?;
        Ok(Some((open.period_id, created, now)))
      })
      .await?;

    let Some((period_id, created, updated_at)) = written else {
      return Ok(None);
    };
    Ok(Some(Upserted {
      report: Report {
        period_id: decode_uuid(&period_id)?,
        user_id,
        fields,
        updated_at: decode_dt(&updated_at)?,
      },
      created,
    }))
  }

  async fn get_report(&self, period_id: Uuid, user_id: Uuid) -> Result<Option<Report>> {
    let pid_str = encode_uuid(period_id);
    let uid_str = encode_uuid(user_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT period_id, user_id, {FIELD_COLS}, updated_at FROM reports_p
                 WHERE period_id = ?1 AND user_id = ?2"
              ),
              rusqlite::params![pid_str, uid_str],
              RawReport::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReport::into_report).transpose()
  }

  async fn report_history(
    &self,
    period_id: Uuid,
    user_id: Uuid,
  ) -> Result<Vec<ReportHistory>> {
    let pid_str = encode_uuid(period_id);
    let uid_str = encode_uuid(user_id);

    let raws: Vec<RawHistory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT history_id, period_id, user_id, changed_at, diff
           FROM report_history_p
           WHERE period_id = ?1 AND user_id = ?2
           ORDER BY changed_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pid_str, uid_str], RawHistory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_history).collect()
  }

  async fn list_reports(
    &self,
    period_id: Uuid,
    status: Option<Status>,
  ) -> Result<Vec<ReportRow>> {
    let pid_str    = encode_uuid(period_id);
    let status_str = status.map(Status::as_str);

    let raws: Vec<RawReportRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{}
           WHERE rp.period_id = ?1 AND (?2 IS NULL OR rp.status = ?2)
           ORDER BY rp.updated_at DESC",
          report_row_select()
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pid_str, status_str], RawReportRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReportRow::into_row).collect()
  }

  async fn get_report_row(
    &self,
    period_id: Uuid,
    user_id: Uuid,
  ) -> Result<Option<ReportRow>> {
    let pid_str = encode_uuid(period_id);
    let uid_str = encode_uuid(user_id);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "{} WHERE rp.period_id = ?1 AND rp.user_id = ?2",
                report_row_select()
              ),
              rusqlite::params![pid_str, uid_str],
              RawReportRow::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReportRow::into_row).transpose()
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn summary(&self, period_id: Uuid) -> Result<Summary> {
    let pid_str = encode_uuid(period_id);

    let (total, counts, groups) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM rosters WHERE is_active = 1",
          [],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(
          "SELECT COALESCE(rp.status, 'no_report') AS s, COUNT(*)
           FROM rosters r
           LEFT JOIN reports_p rp
             ON rp.user_id = r.user_id AND rp.period_id = ?1
           WHERE r.is_active = 1
           GROUP BY s
           ORDER BY s",
        )?;
        let counts = stmt
          .query_map(rusqlite::params![pid_str], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT COALESCE(r.group_name, '-') AS g,
                  COALESCE(rp.status, 'no_report') AS s,
                  COUNT(*)
           FROM rosters r
           LEFT JOIN reports_p rp
             ON rp.user_id = r.user_id AND rp.period_id = ?1
           WHERE r.is_active = 1
           GROUP BY g, s
           ORDER BY g, s",
        )?;
        let groups = stmt
          .query_map(rusqlite::params![pid_str], |r| {
            Ok((
              r.get::<_, String>(0)?,
              r.get::<_, String>(1)?,
              r.get::<_, i64>(2)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, counts, groups))
      })
      .await?;

    let counts = counts
      .into_iter()
      .map(|(s, n)| {
        Ok(SummaryItem {
          status: decode_count_status(&s)?,
          n:      n as u64,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let mut by_group: BTreeMap<String, Vec<SummaryItem>> = BTreeMap::new();
    for (group, s, n) in groups {
      by_group.entry(group).or_default().push(SummaryItem {
        status: decode_count_status(&s)?,
        n:      n as u64,
      });
    }

    Ok(Summary {
      total_roster: total as u64,
      counts,
      by_group,
    })
  }

  async fn absentees(&self, period_id: Uuid) -> Result<Vec<Absentee>> {
    let pid_str = encode_uuid(period_id);

    let raws: Vec<RawAbsentee> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.grade, u.name, u.email, r.group_name
           FROM rosters r
           JOIN users u ON u.user_id = r.user_id
           LEFT JOIN reports_p rp
             ON rp.user_id = r.user_id AND rp.period_id = ?1
           WHERE r.is_active = 1 AND rp.user_id IS NULL
           ORDER BY u.name, u.grade",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pid_str], RawAbsentee::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAbsentee::into_absentee).collect()
  }
}
