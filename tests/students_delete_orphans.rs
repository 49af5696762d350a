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

#[test]
fn deleting_a_student_keeps_history_and_degrades_labels() {
    let workspace = temp_dir("rosterd-orphans");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "c1",
        "students.create",
        json!({
            "firstName": "Ada",
            "lastName": "Byron",
            "enrollmentDate": "2025-09-01"
        }),
    );
    let ada = created
        .get("student")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("id")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "a1",
        "attendance.mark",
        json!({ "studentId": ada, "date": "2025-09-03", "status": "present" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "g1",
        "grades.create",
        json!({
            "studentId": ada,
            "subject": "Math",
            "assignmentName": "Quiz 1",
            "score": 45.0,
            "maxScore": 50.0,
            "category": "quiz",
            "date": "2025-09-03"
        }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "d1",
        "students.delete",
        json!({ "studentId": ada }),
    );

    // History survives the delete.
    let attendance = request_ok(&mut stdin, &mut reader, "l1", "attendance.list", json!({}));
    assert_eq!(
        attendance
            .get("records")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    let grades = request_ok(&mut stdin, &mut reader, "l2", "grades.list", json!({}));
    assert_eq!(
        grades.get("grades").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    // Dashboard activity degrades the missing reference to a placeholder
    // instead of failing the payload.
    let dashboard = request_ok(&mut stdin, &mut reader, "d2", "dashboard.open", json!({}));
    assert_eq!(
        dashboard.get("totalStudents").and_then(|v| v.as_u64()),
        Some(0)
    );
    let activity = dashboard
        .get("recentActivity")
        .and_then(|v| v.as_array())
        .expect("recentActivity");
    assert_eq!(activity.len(), 2);
    for item in activity {
        let message = item.get("message").and_then(|v| v.as_str()).expect("message");
        assert!(
            message.starts_with("Unknown"),
            "expected placeholder label in {:?}",
            message
        );
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
