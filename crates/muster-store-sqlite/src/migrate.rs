//! In-place column migrations for databases created by older releases.
//!
//! Each step checks `PRAGMA table_info` first, so running this on an
//! up-to-date database is a no-op.

use rusqlite::Connection;

use crate::schema::GRADE_NAME_UNIQUE;

/// Bring an existing database up to the current column set.
pub fn bootstrap(conn: &Connection) -> rusqlite::Result<()> {
  // Older rosters identified members by email only.
  if !has_column(conn, "users", "grade")? {
    tracing::info!("migrating: adding users.grade (existing rows default to Staff)");
    conn.execute_batch(
      "ALTER TABLE users ADD COLUMN grade TEXT NOT NULL DEFAULT 'Staff';",
    )?;
  }

  if !has_column(conn, "reports_p", "contact_email")? {
    tracing::info!("migrating: adding reports_p.contact_email");
    conn.execute_batch("ALTER TABLE reports_p ADD COLUMN contact_email TEXT;")?;
  }

  Ok(())
}

/// Create the `(grade, name)` unique index unless existing rows collide.
///
/// Back-filling `grade` can leave legacy users that were told apart only by
/// email sharing `(Staff, name)`. Those pairs are logged and the index is left
/// out until an admin renames them; lookups by grade and name then match
/// nobody for the colliding pairs.
pub fn ensure_grade_name_unique(conn: &Connection) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare(
    "SELECT grade, name, COUNT(*) FROM users
     GROUP BY grade, name HAVING COUNT(*) > 1
     ORDER BY grade, name",
  )?;
  let dupes = stmt
    .query_map([], |r| {
      Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  if dupes.is_empty() {
    return conn.execute_batch(GRADE_NAME_UNIQUE);
  }
  for (grade, name, n) in &dupes {
    tracing::warn!(%grade, %name, users = n, "duplicate grade and name");
  }
  tracing::warn!(
    pairs = dupes.len(),
    "skipping users_grade_name unique index until duplicates are resolved"
  );
  Ok(())
}

fn has_column(
  conn: &Connection,
  table: &str,
  column: &str,
) -> rusqlite::Result<bool> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
  let names = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(names.iter().any(|n| n == column))
}
