use crate::calendar;
use crate::db;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::model::{Grade, GradeCategory, GradeDraft};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn grade_json(g: &Grade) -> serde_json::Value {
    let mut v = serde_json::to_value(g).unwrap_or_else(|_| json!({}));
    v["percent"] = json!(metrics::grade_percent_rounded(g.score, g.max_score));
    v
}

fn grades_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grades = match get_optional_str(params, "studentId") {
        Some(student_id) => {
            store::load_grades_for_student(conn, &student_id).map_err(HandlerErr::query)?
        }
        None => store::load_grades(conn).map_err(HandlerErr::query)?,
    };
    let grades: Vec<Grade> = match get_optional_str(params, "subject") {
        Some(subject) => grades.into_iter().filter(|g| g.subject == subject).collect(),
        None => grades,
    };
    let rows: Vec<serde_json::Value> = grades.iter().map(grade_json).collect();
    Ok(json!({ "grades": rows }))
}

fn grades_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let draft = GradeDraft::parse(params).map_err(HandlerErr::bad_params)?;
    if !store::student_exists(conn, &draft.student_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let id = Uuid::new_v4().to_string();
    let now = db::now_ts();
    conn.execute(
        "INSERT INTO grades(id, student_id, subject, assignment_name, score, max_score,
                            category, date, day_key, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &draft.student_id,
            &draft.subject,
            &draft.assignment_name,
            draft.score,
            draft.max_score,
            draft.category.as_str(),
            &draft.date,
            &draft.day_key,
            &now,
            &now,
        ),
    )
    .map_err(|e| HandlerErr::insert(e, "grades"))?;

    let created = store::load_grade(conn, &id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "grade": grade_json(&created) }))
}

fn grades_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "gradeId")?;
    let Some(existing) = store::load_grade(conn, &id).map_err(HandlerErr::query)? else {
        return Err(HandlerErr::not_found("grade not found"));
    };
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let mut subject = existing.subject.clone();
    let mut assignment_name = existing.assignment_name.clone();
    let mut score = existing.score;
    let mut max_score = existing.max_score;
    let mut category = existing.category.clone();
    let mut date = existing.date.clone();
    let mut day_key = existing.day_key.clone();
    for (k, v) in patch {
        match k.as_str() {
            "subject" => {
                subject = v
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HandlerErr::bad_params("subject must be a non-empty string"))?;
            }
            "assignmentName" => {
                assignment_name = v
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        HandlerErr::bad_params("assignmentName must be a non-empty string")
                    })?;
            }
            "score" => {
                score = v
                    .as_f64()
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .ok_or_else(|| HandlerErr::bad_params("score must be >= 0"))?;
            }
            "maxScore" => {
                max_score = v
                    .as_f64()
                    .filter(|n| n.is_finite() && *n > 0.0)
                    .ok_or_else(|| HandlerErr::bad_params("maxScore must be > 0"))?;
            }
            "category" => {
                let raw = v
                    .as_str()
                    .ok_or_else(|| HandlerErr::bad_params("category must be string"))?;
                category = GradeCategory::parse(raw.trim())
                    .ok_or_else(|| {
                        HandlerErr::bad_params(
                            "category must be one of: assignment, quiz, exam, project, homework",
                        )
                    })?
                    .as_str()
                    .to_string();
            }
            "date" => {
                let raw = v
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| HandlerErr::bad_params("date must be string"))?;
                day_key = calendar::day_key(&raw)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .ok_or_else(|| {
                        HandlerErr::bad_params("date must be YYYY-MM-DD or an RFC3339 timestamp")
                    })?;
                date = raw;
            }
            _ => return Err(HandlerErr::bad_params(format!("unknown grade field: {}", k))),
        }
    }

    conn.execute(
        "UPDATE grades SET subject = ?, assignment_name = ?, score = ?, max_score = ?,
                           category = ?, date = ?, day_key = ?, updated_at = ?
         WHERE id = ?",
        (
            &subject,
            &assignment_name,
            score,
            max_score,
            &category,
            &date,
            &day_key,
            &db::now_ts(),
            &id,
        ),
    )
    .map_err(|e| HandlerErr::update(e, "grades"))?;

    let updated = store::load_grade(conn, &id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::query(rusqlite::Error::QueryReturnedNoRows))?;
    Ok(json!({ "grade": grade_json(&updated) }))
}

fn grades_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "gradeId")?;
    if store::load_grade(conn, &id)
        .map_err(HandlerErr::query)?
        .is_none()
    {
        return Err(HandlerErr::not_found("grade not found"));
    }
    conn.execute("DELETE FROM grades WHERE id = ?", [&id])
        .map_err(|e| HandlerErr::delete(e, "grades"))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(with_conn(state, req, grades_list)),
        "grades.create" => Some(with_conn(state, req, grades_create)),
        "grades.update" => Some(with_conn(state, req, grades_update)),
        "grades.delete" => Some(with_conn(state, req, grades_delete)),
        _ => None,
    }
}
