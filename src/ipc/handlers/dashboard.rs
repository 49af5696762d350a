use crate::ipc::helpers::{with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::model::Student;
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

fn first_name_or_unknown<'a>(students: &'a HashMap<&str, &Student>, student_id: &str) -> &'a str {
    students
        .get(student_id)
        .map(|s| s.first_name.as_str())
        .unwrap_or("Unknown")
}

/// One payload for the landing page: headline counters, the recent-activity
/// feed, and the needs-attention list.
fn dashboard_open(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let students = store::load_students(conn).map_err(HandlerErr::query)?;
    let attendance = store::load_attendance(conn).map_err(HandlerErr::query)?;
    let grades = store::load_grades(conn).map_err(HandlerErr::query)?;
    let policy = super::setup::load_alert_policy(conn);
    let defaults = super::setup::load_report_defaults(conn);

    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
    let active_count = students.iter().filter(|s| s.is_active()).count();

    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let today_records: Vec<_> = attendance
        .iter()
        .filter(|r| r.day_key == today)
        .cloned()
        .collect();
    let today_rate = if today_records.is_empty() {
        0
    } else {
        metrics::attendance_rate_percent(&today_records)
    };

    let recent_start = grades.len().saturating_sub(10);
    let recent_average = metrics::grade_average_percent(&grades[recent_start..]);

    // Last three marks and last three grades, merged newest-first.
    let mut activity: Vec<(String, serde_json::Value)> = Vec::new();
    for r in attendance.iter().rev().take(3) {
        let name = first_name_or_unknown(&by_id, &r.student_id);
        activity.push((
            r.day_key.clone(),
            json!({
                "type": "attendance",
                "date": r.day_key,
                "message": format!("{} marked {}", name, r.status),
            }),
        ));
    }
    for g in grades.iter().rev().take(3) {
        let name = first_name_or_unknown(&by_id, &g.student_id);
        activity.push((
            g.day_key.clone(),
            json!({
                "type": "grade",
                "date": g.day_key,
                "message": format!(
                    "{} scored {}/{} on {}",
                    name, g.score, g.max_score, g.assignment_name
                ),
            }),
        ));
    }
    activity.sort_by(|a, b| b.0.cmp(&a.0));
    let recent_activity: Vec<serde_json::Value> = activity
        .into_iter()
        .take(defaults.recent_activity_limit)
        .map(|(_, v)| v)
        .collect();

    let flagged: Vec<&Student> = students
        .iter()
        .filter(|s| {
            let student_attendance: Vec<_> = attendance
                .iter()
                .filter(|r| r.student_id == s.id)
                .cloned()
                .collect();
            let student_grades: Vec<_> = grades
                .iter()
                .filter(|g| g.student_id == s.id)
                .cloned()
                .collect();
            metrics::needs_attention(&student_attendance, &student_grades, &policy)
        })
        .collect();
    let needs_attention: Vec<serde_json::Value> = flagged
        .iter()
        .take(defaults.needs_attention_limit)
        .map(|s| {
            json!({
                "studentId": s.id,
                "firstName": s.first_name,
                "lastName": s.last_name,
                "gradeLevel": s.grade_level,
            })
        })
        .collect();

    Ok(json!({
        "totalStudents": students.len(),
        "activeStudents": active_count,
        "todayAttendanceRatePercent": today_rate,
        "recentGradeAveragePercent": recent_average,
        "recentActivity": recent_activity,
        "needsAttention": needs_attention,
        "flaggedCount": flagged.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(with_conn(state, req, dashboard_open)),
        _ => None,
    }
}
