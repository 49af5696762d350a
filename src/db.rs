use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("roster.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            grade_level TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            enrollment_date TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    // No FOREIGN KEY on student_id: deleting a student intentionally leaves
    // history rows behind, and reads degrade them to a placeholder label.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            day_key TEXT NOT NULL,
            status TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT,
            updated_at TEXT,
            UNIQUE(student_id, day_key)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            assignment_name TEXT NOT NULL,
            score REAL NOT NULL,
            max_score REAL NOT NULL,
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            day_key TEXT NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Early workspaces stored dates without a normalized day key. Add and
    // backfill before any index touches the column.
    ensure_day_key(&conn, "attendance_records")?;
    ensure_day_key(&conn, "grades")?;
    dedupe_attendance_days(&conn)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_day ON attendance_records(day_key)",
        [],
    )?;
    // Tables created before the one-record-per-day rule carry no table-level
    // UNIQUE; this index enforces it for them and is the conflict target for
    // the mark upsert.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_student_day
         ON attendance_records(student_id, day_key)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_subject ON grades(subject)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_day ON grades(day_key)",
        [],
    )?;

    Ok(conn)
}

/// Legacy tables written before the one-record-per-day rule may hold several
/// rows for a (student, day); the newest write wins so the unique index can
/// be created.
fn dedupe_attendance_days(conn: &Connection) -> anyhow::Result<()> {
    let removed = conn.execute(
        "DELETE FROM attendance_records WHERE rowid NOT IN (
            SELECT MAX(rowid) FROM attendance_records GROUP BY student_id, day_key
        )",
        [],
    )?;
    if removed > 0 {
        tracing::warn!(removed, "dropped older duplicate attendance rows");
    }
    Ok(())
}

fn ensure_day_key(conn: &Connection, table: &str) -> anyhow::Result<()> {
    if table_has_column(conn, table, "day_key")? {
        return Ok(());
    }
    conn.execute(
        &format!(
            "ALTER TABLE {} ADD COLUMN day_key TEXT NOT NULL DEFAULT ''",
            table
        ),
        [],
    )?;

    let mut stmt = conn.prepare(&format!("SELECT id, date FROM {} ORDER BY rowid", table))?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, date) in rows {
        match crate::calendar::day_key(&date) {
            Some(d) => {
                conn.execute(
                    &format!("UPDATE {} SET day_key = ? WHERE id = ?", table),
                    (&d.format("%Y-%m-%d").to_string(), &id),
                )?;
            }
            None => {
                // The row stays reachable in unfiltered lists but no
                // day-keyed view will ever show it.
                tracing::warn!(table, id = %id, date = %date, "unparseable date left without day key");
            }
        }
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, &raw),
    )?;
    Ok(())
}

pub fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
