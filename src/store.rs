//! Typed row loaders shared by the handlers. Every function takes the
//! connection explicitly; there is no ambient database handle anywhere.

use crate::model::{AttendanceRecord, Grade, Student};
use rusqlite::{Connection, OptionalExtension, Row};

fn student_from_row(r: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        email: r.get(3)?,
        phone: r.get(4)?,
        grade_level: r.get(5)?,
        status: r.get(6)?,
        enrollment_date: r.get(7)?,
        sort_order: r.get(8)?,
    })
}

const STUDENT_COLS: &str =
    "id, first_name, last_name, email, phone, grade_level, status, enrollment_date, sort_order";

pub fn load_students(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM students ORDER BY sort_order",
        STUDENT_COLS
    ))?;
    let rows = stmt.query_map([], |r| student_from_row(r))?;
    rows.collect()
}

pub fn load_student(conn: &Connection, id: &str) -> rusqlite::Result<Option<Student>> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLS),
        [id],
        |r| student_from_row(r),
    )
    .optional()
}

pub fn student_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM students WHERE id = ?", [id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

pub fn next_student_sort_order(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students",
        [],
        |r| r.get(0),
    )
}

fn attendance_from_row(r: &Row) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        date: r.get(2)?,
        day_key: r.get(3)?,
        status: r.get(4)?,
        notes: r.get(5)?,
    })
}

const ATTENDANCE_COLS: &str = "id, student_id, date, day_key, status, notes";

/// All attendance rows in date order. Insertion order breaks day ties so the
/// trailing-window metrics see a stable sequence.
pub fn load_attendance(conn: &Connection) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attendance_records ORDER BY day_key, rowid",
        ATTENDANCE_COLS
    ))?;
    let rows = stmt.query_map([], |r| attendance_from_row(r))?;
    rows.collect()
}

pub fn load_attendance_for_student(
    conn: &Connection,
    student_id: &str,
) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attendance_records WHERE student_id = ? ORDER BY day_key, rowid",
        ATTENDANCE_COLS
    ))?;
    let rows = stmt.query_map([student_id], |r| attendance_from_row(r))?;
    rows.collect()
}

pub fn load_attendance_for_day(
    conn: &Connection,
    day_key: &str,
) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attendance_records WHERE day_key = ? ORDER BY rowid",
        ATTENDANCE_COLS
    ))?;
    let rows = stmt.query_map([day_key], |r| attendance_from_row(r))?;
    rows.collect()
}

pub fn load_attendance_record(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<AttendanceRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM attendance_records WHERE id = ?", ATTENDANCE_COLS),
        [id],
        |r| attendance_from_row(r),
    )
    .optional()
}

pub fn find_attendance_for_student_day(
    conn: &Connection,
    student_id: &str,
    day_key: &str,
) -> rusqlite::Result<Option<AttendanceRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM attendance_records WHERE student_id = ? AND day_key = ?",
            ATTENDANCE_COLS
        ),
        [student_id, day_key],
        |r| attendance_from_row(r),
    )
    .optional()
}

fn grade_from_row(r: &Row) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject: r.get(2)?,
        assignment_name: r.get(3)?,
        score: r.get(4)?,
        max_score: r.get(5)?,
        category: r.get(6)?,
        date: r.get(7)?,
        day_key: r.get(8)?,
    })
}

const GRADE_COLS: &str =
    "id, student_id, subject, assignment_name, score, max_score, category, date, day_key";

pub fn load_grades(conn: &Connection) -> rusqlite::Result<Vec<Grade>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grades ORDER BY day_key, rowid",
        GRADE_COLS
    ))?;
    let rows = stmt.query_map([], |r| grade_from_row(r))?;
    rows.collect()
}

pub fn load_grades_for_student(
    conn: &Connection,
    student_id: &str,
) -> rusqlite::Result<Vec<Grade>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grades WHERE student_id = ? ORDER BY day_key, rowid",
        GRADE_COLS
    ))?;
    let rows = stmt.query_map([student_id], |r| grade_from_row(r))?;
    rows.collect()
}

pub fn load_grade(conn: &Connection, id: &str) -> rusqlite::Result<Option<Grade>> {
    conn.query_row(
        &format!("SELECT {} FROM grades WHERE id = ?", GRADE_COLS),
        [id],
        |r| grade_from_row(r),
    )
    .optional()
}
