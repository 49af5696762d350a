use crate::calendar;
use crate::db;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceDraft, AttendanceRecord, AttendanceStatus};
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn record_json(r: &AttendanceRecord) -> serde_json::Value {
    serde_json::to_value(r).unwrap_or_else(|_| json!({}))
}

fn duplicate_err(student_id: &str, day_key: &str) -> HandlerErr {
    HandlerErr {
        code: "duplicate_attendance",
        message: format!("attendance already recorded for {} on {}", student_id, day_key),
        details: Some(json!({ "studentId": student_id, "dayKey": day_key })),
    }
}

fn require_day_key(raw: &str) -> Result<String, HandlerErr> {
    calendar::day_key(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| HandlerErr::bad_params("date must be YYYY-MM-DD or an RFC3339 timestamp"))
}

fn require_student(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    if !store::student_exists(conn, student_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(())
}

fn attendance_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let records = match get_optional_str(params, "studentId") {
        Some(student_id) => {
            store::load_attendance_for_student(conn, &student_id).map_err(HandlerErr::query)?
        }
        None => store::load_attendance(conn).map_err(HandlerErr::query)?,
    };
    let records = match get_optional_str(params, "date") {
        Some(raw) => {
            let key = require_day_key(&raw)?;
            records.into_iter().filter(|r| r.day_key == key).collect()
        }
        None => records,
    };
    let rows: Vec<serde_json::Value> = records.iter().map(record_json).collect();
    Ok(json!({ "records": rows }))
}

fn attendance_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let draft = AttendanceDraft::parse(params).map_err(HandlerErr::bad_params)?;
    require_student(conn, &draft.student_id)?;
    if store::find_attendance_for_student_day(conn, &draft.student_id, &draft.day_key)
        .map_err(HandlerErr::query)?
        .is_some()
    {
        return Err(duplicate_err(&draft.student_id, &draft.day_key));
    }

    let id = Uuid::new_v4().to_string();
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO attendance_records(id, student_id, date, day_key, status, notes, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &draft.student_id,
            &draft.date,
            &draft.day_key,
            draft.status.as_str(),
            &draft.notes,
            &now,
            &now,
        ),
    )
    .map_err(|e| HandlerErr::insert(e, "attendance_records"))?;

    let created = store::load_attendance_record(conn, &id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "record": record_json(&created) }))
}

/// The sanctioned upsert: create-or-overwrite the one record allowed per
/// (student, day).
fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let draft = AttendanceDraft::parse(params).map_err(HandlerErr::bad_params)?;
    require_student(conn, &draft.student_id)?;

    let id = Uuid::new_v4().to_string();
    let now = db::now_ts();
    let existing =
        store::find_attendance_for_student_day(conn, &draft.student_id, &draft.day_key)
            .map_err(HandlerErr::query)?;
    conn.execute(
        "INSERT INTO attendance_records(id, student_id, date, day_key, status, notes, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, day_key) DO UPDATE SET
           date = excluded.date,
           status = excluded.status,
           notes = excluded.notes,
           updated_at = excluded.updated_at",
        (
            &id,
            &draft.student_id,
            &draft.date,
            &draft.day_key,
            draft.status.as_str(),
            &draft.notes,
            &now,
            &now,
        ),
    )
    .map_err(|e| HandlerErr::update(e, "attendance_records"))?;

    let record = store::find_attendance_for_student_day(conn, &draft.student_id, &draft.day_key)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "record": record_json(&record), "created": existing.is_none() }))
}

fn attendance_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "recordId")?;
    let Some(existing) = store::load_attendance_record(conn, &id).map_err(HandlerErr::query)? else {
        return Err(HandlerErr::not_found("attendance record not found"));
    };
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let mut date = existing.date.clone();
    let mut day_key = existing.day_key.clone();
    let mut status = existing.status.clone();
    let mut notes = existing.notes.clone();
    for (k, v) in patch {
        let s = v
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string", k)))?;
        match k.as_str() {
            "date" => {
                day_key = require_day_key(&s)?;
                date = s;
            }
            "status" => {
                status = AttendanceStatus::parse(&s)
                    .ok_or_else(|| {
                        HandlerErr::bad_params("status must be one of: present, absent, late")
                    })?
                    .as_str()
                    .to_string();
            }
            "notes" => notes = s,
            _ => return Err(HandlerErr::bad_params(format!("unknown attendance field: {}", k))),
        }
    }

    // A date move must not land on a day this student already has.
    if day_key != existing.day_key {
        if store::find_attendance_for_student_day(conn, &existing.student_id, &day_key)
            .map_err(HandlerErr::query)?
            .is_some()
        {
            return Err(duplicate_err(&existing.student_id, &day_key));
        }
    }

    conn.execute(
        "UPDATE attendance_records SET date = ?, day_key = ?, status = ?, notes = ?, updated_at = ?
         WHERE id = ?",
        (&date, &day_key, &status, &notes, &db::now_ts(), &id),
    )
    .map_err(|e| HandlerErr::update(e, "attendance_records"))?;

    let updated = store::load_attendance_record(conn, &id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "record": record_json(&updated) }))
}

fn attendance_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "recordId")?;
    if store::load_attendance_record(conn, &id)
        .map_err(HandlerErr::query)?
        .is_none()
    {
        return Err(HandlerErr::not_found("attendance record not found"));
    }
    conn.execute("DELETE FROM attendance_records WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::delete(e, "attendance_records"))?;
    Ok(json!({ "ok": true }))
}

/// Daily marking view: every active student with their mark for the day (or
/// unmarked), plus the summary counters the page header shows.
fn attendance_day_open(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date_raw = get_required_str(params, "date")?;
    let day_key = require_day_key(&date_raw)?;

    let students = store::load_students(conn).map_err(HandlerErr::query)?;
    let day_records = store::load_attendance_for_day(conn, &day_key).map_err(HandlerErr::query)?;
    let by_student: HashMap<&str, &AttendanceRecord> = day_records
        .iter()
        .map(|r| (r.student_id.as_str(), r))
        .collect();

    let active: Vec<_> = students.iter().filter(|s| s.is_active()).collect();
    let mut present = 0usize;
    let mut absent = 0usize;
    let mut late = 0usize;
    let rows: Vec<serde_json::Value> = active
        .iter()
        .map(|s| {
            let record = by_student.get(s.id.as_str());
            match record.map(|r| r.status.as_str()) {
                Some("present") => present += 1,
                Some("absent") => absent += 1,
                Some("late") => late += 1,
                _ => {}
            }
            json!({
                "studentId": s.id,
                "firstName": s.first_name,
                "lastName": s.last_name,
                "status": record.map(|r| r.status.clone()),
                "recordId": record.map(|r| r.id.clone()),
                "notes": record.map(|r| r.notes.clone()),
            })
        })
        .collect();

    let marked = present + absent + late;
    let rate_percent = if marked > 0 {
        ((present as f64 / marked as f64) * 100.0).round() as i64
    } else {
        0
    };

    Ok(json!({
        "date": day_key,
        "students": rows,
        "summary": {
            "total": active.len(),
            "present": present,
            "absent": absent,
            "late": late,
            "unmarked": active.len().saturating_sub(marked),
            "ratePercent": rate_percent,
        }
    }))
}

fn attendance_mark_all_present(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date_raw = get_required_str(params, "date")?;
    let day_key = require_day_key(&date_raw)?;
    let students = store::load_students(conn).map_err(HandlerErr::query)?;
    let now = db::now_ts();

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    let mut created = 0usize;
    let mut updated = 0usize;
    for s in students.iter().filter(|s| s.is_active()) {
        let existing = store::find_attendance_for_student_day(&tx, &s.id, &day_key)
            .map_err(HandlerErr::query)?;
        match existing {
            Some(r) => {
                tx.execute(
                    "UPDATE attendance_records SET status = 'present', updated_at = ? WHERE id = ?",
                    (&now, &r.id),
                )
                .map_err(|e| HandlerErr::update(e, "attendance_records"))?;
                updated += 1;
            }
            None => {
                tx.execute(
                    "INSERT INTO attendance_records(id, student_id, date, day_key, status, notes, created_at, updated_at)
                     VALUES(?, ?, ?, ?, 'present', '', ?, ?)",
                    (
                        &Uuid::new_v4().to_string(),
                        &s.id,
                        &date_raw,
                        &day_key,
                        &now,
                        &now,
                    ),
                )
                .map_err(|e| HandlerErr::insert(e, "attendance_records"))?;
                created += 1;
            }
        }
    }
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(json!({ "date": day_key, "created": created, "updated": updated }))
}

fn parse_month_key(month: &str) -> Result<(i32, u32), HandlerErr> {
    let t = month.trim();
    let Some((y, m)) = t.split_once('-') else {
        return Err(HandlerErr::bad_params("month must be YYYY-MM"));
    };
    let year = y
        .parse::<i32>()
        .map_err(|_| HandlerErr::bad_params("month year must be numeric"))?;
    let month_num = m
        .parse::<u32>()
        .map_err(|_| HandlerErr::bad_params("month must be YYYY-MM"))?;
    if !(1..=12).contains(&month_num) {
        return Err(HandlerErr::bad_params("month must be between 01 and 12"));
    }
    Ok((year, month_num))
}

fn attendance_month_grid(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let month_key = get_required_str(params, "month")?;
    let (year, month) = parse_month_key(&month_key)?;
    let week_start = super::setup::load_week_start(conn);

    let all = store::load_attendance(conn).map_err(HandlerErr::query)?;
    let mut by_day: HashMap<String, (usize, usize, usize)> = HashMap::new();
    for r in &all {
        let entry = by_day.entry(r.day_key.clone()).or_default();
        match r.status.as_str() {
            "present" => entry.0 += 1,
            "absent" => entry.1 += 1,
            "late" => entry.2 += 1,
            _ => {}
        }
    }

    let weeks_iter = calendar::month_weeks(year, month, week_start)
        .ok_or_else(|| HandlerErr::bad_params("month out of range"))?;
    let in_month = |d: &NaiveDate| {
        use chrono::Datelike;
        d.year() == year && d.month() == month
    };
    let weeks: Vec<serde_json::Value> = weeks_iter
        .map(|row| {
            let cells: Vec<serde_json::Value> = row
                .iter()
                .map(|d| {
                    let key = d.format("%Y-%m-%d").to_string();
                    let (present, absent, late) =
                        by_day.get(&key).copied().unwrap_or((0, 0, 0));
                    let total = present + absent + late;
                    json!({
                        "date": key,
                        "inMonth": in_month(d),
                        "total": total,
                        "present": present,
                        "absent": absent,
                        "late": late,
                        "band": calendar::presence_band(present, total).as_str(),
                    })
                })
                .collect();
            json!(cells)
        })
        .collect();

    Ok(json!({
        "month": month_key,
        "weekStart": week_start.as_str(),
        "weeks": weeks,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(with_conn(state, req, attendance_list)),
        "attendance.create" => Some(with_conn(state, req, attendance_create)),
        "attendance.mark" => Some(with_conn(state, req, attendance_mark)),
        "attendance.update" => Some(with_conn(state, req, attendance_update)),
        "attendance.delete" => Some(with_conn(state, req, attendance_delete)),
        "attendance.dayOpen" => Some(with_conn(state, req, attendance_day_open)),
        "attendance.markAllPresent" => Some(with_conn(state, req, attendance_mark_all_present)),
        "attendance.monthGrid" => Some(with_conn(state, req, attendance_month_grid)),
        _ => None,
    }
}
