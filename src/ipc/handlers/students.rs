use crate::db;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Student, StudentDraft, StudentPatch, StudentStatus};
use crate::sort::{SortDirection, SortField, SortSpec};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn student_json(s: &Student) -> serde_json::Value {
    serde_json::to_value(s).unwrap_or_else(|_| json!({}))
}

/// The sort the list applies. `sortField`/`sortDirection` name a spec
/// directly; `clickField` instead derives the next spec from the current one
/// with column-header click semantics (same column toggles, new column resets
/// to ascending).
fn parse_sort_spec(params: &serde_json::Value) -> Result<Option<SortSpec>, HandlerErr> {
    let field = match get_optional_str(params, "sortField") {
        None => None,
        Some(raw) => Some(
            SortField::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown sortField: {}", raw)))?,
        ),
    };
    let direction = match get_optional_str(params, "sortDirection") {
        None => SortDirection::Asc,
        Some(raw) => SortDirection::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("sortDirection must be asc or desc"))?,
    };

    if let Some(click_raw) = get_optional_str(params, "clickField") {
        let clicked = SortField::parse(&click_raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown clickField: {}", click_raw)))?;
        let current = field
            .map(|f| SortSpec {
                field: f,
                direction,
            })
            .unwrap_or_default();
        return Ok(Some(current.click(clicked)));
    }

    Ok(field.map(|f| SortSpec {
        field: f,
        direction,
    }))
}

fn matches_search(s: &Student, needle: &str) -> bool {
    let full = format!("{} {}", s.first_name, s.last_name).to_lowercase();
    full.contains(needle)
        || s.email.to_lowercase().contains(needle)
        || s.grade_level.to_lowercase().contains(needle)
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let all = store::load_students(conn).map_err(HandlerErr::query)?;

    // Stat-card counts are over the whole roster, not the filtered view.
    let count_by = |status: &str| all.iter().filter(|s| s.status == status).count();
    let counts = json!({
        "total": all.len(),
        "active": count_by("active"),
        "inactive": count_by("inactive"),
        "suspended": count_by("suspended"),
    });

    let status_filter = match get_optional_str(params, "status") {
        None => None,
        Some(raw) if raw == "all" => None,
        Some(raw) => Some(
            StudentStatus::parse(&raw)
                .ok_or_else(|| {
                    HandlerErr::bad_params("status must be one of: all, active, inactive, suspended")
                })?
                .as_str(),
        ),
    };
    let search = get_optional_str(params, "search").map(|s| s.to_lowercase());

    let mut filtered: Vec<Student> = all
        .into_iter()
        .filter(|s| status_filter.map(|want| s.status == want).unwrap_or(true))
        .filter(|s| search.as_deref().map(|n| matches_search(s, n)).unwrap_or(true))
        .collect();

    let applied = parse_sort_spec(params)?;
    if let Some(spec) = applied {
        crate::sort::sort_students(&mut filtered, spec);
    }

    let students: Vec<serde_json::Value> = filtered.iter().map(student_json).collect();
    Ok(json!({
        "students": students,
        "counts": counts,
        "sort": applied.map(|spec| json!({
            "field": spec.field.as_str(),
            "direction": spec.direction.as_str(),
        })),
    }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let draft = StudentDraft::parse(params).map_err(HandlerErr::bad_params)?;
    let id = Uuid::new_v4().to_string();
    let sort_order = store::next_student_sort_order(conn).map_err(HandlerErr::query)?;
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO students(id, first_name, last_name, email, phone, grade_level,
                              status, enrollment_date, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &draft.first_name,
            &draft.last_name,
            &draft.email,
            &draft.phone,
            &draft.grade_level,
            draft.status.as_str(),
            &draft.enrollment_date,
            sort_order,
            &now,
            &now,
        ),
    )
    .map_err(|e| HandlerErr::insert(e, "students"))?;

    let created = store::load_student(conn, &id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "student": student_json(&created) }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "studentId")?;
    let Some(existing) = store::load_student(conn, &id).map_err(HandlerErr::query)? else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let Some(patch_obj) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let patch = StudentPatch::parse(patch_obj).map_err(HandlerErr::bad_params)?;

    let first_name = patch.first_name.unwrap_or(existing.first_name);
    let last_name = patch.last_name.unwrap_or(existing.last_name);
    let email = patch.email.unwrap_or(existing.email);
    let phone = patch.phone.unwrap_or(existing.phone);
    let grade_level = patch.grade_level.unwrap_or(existing.grade_level);
    let status = patch
        .status
        .map(|s| s.as_str().to_string())
        .unwrap_or(existing.status);
    let enrollment_date = patch.enrollment_date.unwrap_or(existing.enrollment_date);

    conn.execute(
        "UPDATE students SET first_name = ?, last_name = ?, email = ?, phone = ?,
                             grade_level = ?, status = ?, enrollment_date = ?, updated_at = ?
         WHERE id = ?",
        (
            &first_name,
            &last_name,
            &email,
            &phone,
            &grade_level,
            &status,
            &enrollment_date,
            &db::now_ts(),
            &id,
        ),
    )
    .map_err(|e| HandlerErr::update(e, "students"))?;

    let updated = store::load_student(conn, &id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "student": student_json(&updated) }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "studentId")?;
    if !store::student_exists(conn, &id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    // No cascade: attendance and grade history stays, reads degrade the
    // missing reference to a placeholder label.
    conn.execute("DELETE FROM students WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::delete(e, "students"))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
