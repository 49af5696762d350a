use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "expected ok for {}: {}",
        id,
        value
    );
    value.get("result").cloned().expect("result")
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    first: &str,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "firstName": first,
            "lastName": "Tester",
            "enrollmentDate": "2025-09-01"
        }),
    );
    result
        .get("student")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string()
}

#[test]
fn dashboard_flags_either_failing_metric_and_spares_empty_history() {
    let workspace = temp_dir("rosterd-dashboard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Weak grades, strong attendance.
    let low_grades = create_student(&mut stdin, &mut reader, "c1", "Lena");
    // Strong grades, weak attendance.
    let low_attendance = create_student(&mut stdin, &mut reader, "c2", "Max");
    // No history at all: never flagged.
    let _fresh = create_student(&mut stdin, &mut reader, "c3", "Noa");

    let mut req_no = 0;
    let mut next_id = || {
        req_no += 1;
        format!("r{}", req_no)
    };

    for day in 1..=10 {
        let id = next_id();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &id,
            "attendance.mark",
            json!({
                "studentId": low_grades,
                "date": format!("2025-09-{:02}", day),
                "status": if day == 10 { "absent" } else { "present" }
            }),
        );
        let id = next_id();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &id,
            "attendance.mark",
            json!({
                "studentId": low_attendance,
                "date": format!("2025-09-{:02}", day),
                "status": if day <= 6 { "present" } else { "absent" }
            }),
        );
    }
    let id = next_id();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        &id,
        "grades.create",
        json!({
            "studentId": low_grades,
            "subject": "Math",
            "assignmentName": "Test 1",
            "score": 65.0,
            "maxScore": 100.0,
            "category": "exam",
            "date": "2025-09-10"
        }),
    );
    let id = next_id();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        &id,
        "grades.create",
        json!({
            "studentId": low_attendance,
            "subject": "Math",
            "assignmentName": "Test 1",
            "score": 95.0,
            "maxScore": 100.0,
            "category": "exam",
            "date": "2025-09-10"
        }),
    );

    let dashboard = request_ok(&mut stdin, &mut reader, "d1", "dashboard.open", json!({}));
    assert_eq!(
        dashboard.get("totalStudents").and_then(|v| v.as_u64()),
        Some(3)
    );
    assert_eq!(
        dashboard.get("activeStudents").and_then(|v| v.as_u64()),
        Some(3)
    );

    // One student fails each threshold; the student with no data passes both.
    assert_eq!(dashboard.get("flaggedCount").and_then(|v| v.as_u64()), Some(2));
    let flagged: Vec<&str> = dashboard
        .get("needsAttention")
        .and_then(|v| v.as_array())
        .expect("needsAttention")
        .iter()
        .map(|s| s.get("studentId").and_then(|v| v.as_str()).expect("id"))
        .collect();
    assert!(flagged.contains(&low_grades.as_str()));
    assert!(flagged.contains(&low_attendance.as_str()));

    // 2 attendance marks + 2 grades seeded most recently, capped at 5 items.
    let activity = dashboard
        .get("recentActivity")
        .and_then(|v| v.as_array())
        .expect("recentActivity");
    assert!(activity.len() <= 5);
    assert!(!activity.is_empty());

    assert_eq!(
        dashboard
            .get("recentGradeAveragePercent")
            .and_then(|v| v.as_i64()),
        Some(80)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
