use crate::ipc::helpers::{get_optional_str, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::model::{AttendanceRecord, Grade, Student};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

fn grades_for<'a>(grades: &'a [Grade], student_id: &str) -> Vec<Grade> {
    grades
        .iter()
        .filter(|g| g.student_id == student_id)
        .cloned()
        .collect()
}

fn attendance_for(records: &[AttendanceRecord], student_id: &str) -> Vec<AttendanceRecord> {
    records
        .iter()
        .filter(|r| r.student_id == student_id)
        .cloned()
        .collect()
}

fn student_line(
    s: &Student,
    grade_average: i64,
    attendance_rate: i64,
) -> serde_json::Value {
    json!({
        "studentId": s.id,
        "firstName": s.first_name,
        "lastName": s.last_name,
        "gradeLevel": s.grade_level,
        "gradeAveragePercent": grade_average,
        "attendanceRatePercent": attendance_rate,
    })
}

fn class_summary(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let students = store::load_students(conn).map_err(HandlerErr::query)?;
    let attendance = store::load_attendance(conn).map_err(HandlerErr::query)?;
    let grades = store::load_grades(conn).map_err(HandlerErr::query)?;
    let policy = super::setup::load_alert_policy(conn);
    let defaults = super::setup::load_report_defaults(conn);

    let active_count = students.iter().filter(|s| s.is_active()).count();
    let stats = json!({
        "totalStudents": students.len(),
        "activeStudents": active_count,
        "overallAttendanceRatePercent": metrics::attendance_rate_percent(&attendance),
        "overallGradeAveragePercent": metrics::grade_average_percent(&grades),
    });

    let top = metrics::top_performers(
        &students,
        |s| grades_for(&grades, &s.id),
        defaults.top_performers_count,
    );
    let top_performers: Vec<serde_json::Value> = top
        .iter()
        .map(|s| {
            student_line(
                s,
                metrics::grade_average_percent(&grades_for(&grades, &s.id)),
                metrics::attendance_rate_percent(&attendance_for(&attendance, &s.id)),
            )
        })
        .collect();

    let mut flagged: Vec<(i64, i64, &Student)> = students
        .iter()
        .filter(|s| s.is_active())
        .filter_map(|s| {
            let student_attendance = attendance_for(&attendance, &s.id);
            let student_grades = grades_for(&grades, &s.id);
            if metrics::needs_attention(&student_attendance, &student_grades, &policy) {
                Some((
                    metrics::grade_average_percent(&student_grades),
                    metrics::attendance_rate_percent(&student_attendance),
                    s,
                ))
            } else {
                None
            }
        })
        .collect();
    // Weakest grades first; ties keep roster order.
    flagged.sort_by(|a, b| a.0.cmp(&b.0));
    let needs_attention: Vec<serde_json::Value> = flagged
        .iter()
        .map(|(avg, rate, s)| student_line(s, *avg, *rate))
        .collect();

    Ok(json!({
        "stats": stats,
        "topPerformers": top_performers,
        "needsAttention": needs_attention,
    }))
}

fn student_report(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(student) = store::load_student(conn, &student_id).map_err(HandlerErr::query)? else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let attendance = store::load_attendance_for_student(conn, &student_id).map_err(HandlerErr::query)?;
    let grades = store::load_grades_for_student(conn, &student_id).map_err(HandlerErr::query)?;

    // Subjects in first-seen order.
    let mut subjects: Vec<&str> = Vec::new();
    for g in &grades {
        if !subjects.contains(&g.subject.as_str()) {
            subjects.push(&g.subject);
        }
    }
    let subject_performance: Vec<serde_json::Value> = subjects
        .iter()
        .map(|subject| {
            let count = grades.iter().filter(|g| g.subject == *subject).count();
            json!({
                "subject": subject,
                "averagePercent": metrics::subject_average_percent(&grades, &student_id, subject),
                "gradeCount": count,
            })
        })
        .collect();

    let mut recent = grades.clone();
    recent.sort_by(|a, b| b.day_key.cmp(&a.day_key));
    let recent_grades: Vec<serde_json::Value> = recent
        .iter()
        .take(5)
        .map(|g| {
            let mut v = serde_json::to_value(g).unwrap_or_else(|_| json!({}));
            v["percent"] = json!(metrics::grade_percent_rounded(g.score, g.max_score));
            v
        })
        .collect();

    Ok(json!({
        "student": serde_json::to_value(&student).unwrap_or_else(|_| json!({})),
        "overallGradeAveragePercent": metrics::grade_average_percent(&grades),
        "attendanceRatePercent": metrics::attendance_rate_percent(&attendance),
        "gradeCount": grades.len(),
        "attendanceCount": attendance.len(),
        "subjectPerformance": subject_performance,
        "recentGrades": recent_grades,
    }))
}

/// Chart feed: per-subject score series over time plus per-subject averages
/// for the bar variant.
fn grade_trends(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grades = store::load_grades(conn).map_err(HandlerErr::query)?;
    let subject_filter = get_optional_str(params, "subject");

    let mut subjects: Vec<&str> = Vec::new();
    for g in &grades {
        if !subjects.contains(&g.subject.as_str()) {
            subjects.push(&g.subject);
        }
    }

    let selected: Vec<&str> = match subject_filter.as_deref() {
        Some(want) => subjects.iter().filter(|s| **s == want).copied().collect(),
        None => subjects.clone(),
    };

    let series: Vec<serde_json::Value> = selected
        .iter()
        .map(|subject| {
            let mut points: Vec<&Grade> =
                grades.iter().filter(|g| g.subject == *subject).collect();
            points.sort_by(|a, b| a.day_key.cmp(&b.day_key));
            let data: Vec<serde_json::Value> = points
                .iter()
                .map(|g| {
                    json!({
                        "date": g.day_key,
                        "percent": metrics::grade_percent_rounded(g.score, g.max_score),
                    })
                })
                .collect();
            json!({ "subject": subject, "points": data })
        })
        .collect();

    let subject_averages: Vec<serde_json::Value> = selected
        .iter()
        .map(|subject| {
            let subject_grades: Vec<Grade> = grades
                .iter()
                .filter(|g| g.subject == *subject)
                .cloned()
                .collect();
            json!({
                "subject": subject,
                "averagePercent": metrics::grade_average_percent(&subject_grades),
            })
        })
        .collect();

    Ok(json!({
        "subjects": subjects,
        "series": series,
        "subjectAverages": subject_averages,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.classSummary" => Some(with_conn(state, req, class_summary)),
        "reports.student" => Some(with_conn(state, req, student_report)),
        "reports.gradeTrends" => Some(with_conn(state, req, grade_trends)),
        _ => None,
    }
}
