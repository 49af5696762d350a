use crate::model::{AttendanceRecord, Grade, Student};

/// Fraction of `present` records over the whole collection. Empty input is 0,
/// never NaN.
pub fn attendance_rate(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let present = records.iter().filter(|r| r.status == "present").count();
    present as f64 / records.len() as f64
}

pub fn attendance_rate_percent(records: &[AttendanceRecord]) -> i64 {
    (attendance_rate(records) * 100.0).round() as i64
}

/// Single-grade percentage. A non-positive stored maxScore (legacy rows from
/// before write-side validation) yields 0 rather than dividing by it. Values
/// above 100 are extra credit and are never clamped.
pub fn grade_percent(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    score / max_score * 100.0
}

pub fn grade_percent_rounded(score: f64, max_score: f64) -> i64 {
    grade_percent(score, max_score).round() as i64
}

/// Mean of per-grade percentages, rounded to the nearest integer; 0 when
/// there are no grades.
pub fn grade_average_percent(grades: &[Grade]) -> i64 {
    if grades.is_empty() {
        return 0;
    }
    let total: f64 = grades
        .iter()
        .map(|g| grade_percent(g.score, g.max_score))
        .sum();
    (total / grades.len() as f64).round() as i64
}

pub fn subject_average_percent(grades: &[Grade], student_id: &str, subject: &str) -> i64 {
    let filtered: Vec<Grade> = grades
        .iter()
        .filter(|g| g.student_id == student_id && g.subject == subject)
        .cloned()
        .collect();
    grade_average_percent(&filtered)
}

/// Thresholds and trailing-window sizes for the needs-attention flag.
/// Defaults match the dashboard's stock policy; the setup layer can override
/// them per workspace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    pub attendance_rate_min: f64,
    pub grade_average_min: f64,
    pub attendance_window: usize,
    pub grade_window: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            attendance_rate_min: 0.8,
            grade_average_min: 0.7,
            attendance_window: 10,
            grade_window: 3,
        }
    }
}

fn trailing<T>(items: &[T], window: usize) -> &[T] {
    let start = items.len().saturating_sub(window);
    &items[start..]
}

/// Flags a student whose trailing attendance rate or trailing grade average
/// falls under the policy thresholds. Both inputs must already be scoped to
/// the student and ordered by date. No history defaults each metric to fully
/// passing, so students with no data yet are never flagged.
pub fn needs_attention(
    attendance: &[AttendanceRecord],
    grades: &[Grade],
    policy: &AlertPolicy,
) -> bool {
    let recent_attendance = trailing(attendance, policy.attendance_window);
    let rate = if recent_attendance.is_empty() {
        1.0
    } else {
        attendance_rate(recent_attendance)
    };

    let recent_grades = trailing(grades, policy.grade_window);
    let average = if recent_grades.is_empty() {
        1.0
    } else {
        let total: f64 = recent_grades
            .iter()
            .map(|g| grade_percent(g.score, g.max_score) / 100.0)
            .sum();
        total / recent_grades.len() as f64
    };

    rate < policy.attendance_rate_min || average < policy.grade_average_min
}

/// Active students ranked by descending overall grade average, ties keeping
/// the supplied (roster) order, truncated to `n`. Grades must be scoped per
/// call via the lookup closure.
pub fn top_performers<'a, F>(students: &'a [Student], grades_for: F, n: usize) -> Vec<&'a Student>
where
    F: Fn(&Student) -> Vec<Grade>,
{
    let mut ranked: Vec<(&Student, i64)> = students
        .iter()
        .filter(|s| s.is_active())
        .map(|s| (s, grade_average_percent(&grades_for(s))))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(n).map(|(s, _)| s).collect()
}
