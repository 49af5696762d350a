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
    status: &str,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "firstName": first,
            "lastName": "Tester",
            "status": status,
            "enrollmentDate": "2025-09-02"
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
fn day_open_summary_tracks_marking() {
    let workspace = temp_dir("rosterd-day-flow");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let ada = create_student(&mut stdin, &mut reader, "c1", "Ada", "active");
    let _bea = create_student(&mut stdin, &mut reader, "c2", "Bea", "active");
    let _cal = create_student(&mut stdin, &mut reader, "c3", "Cal", "active");
    // Inactive students are not part of the daily marking view.
    let _dot = create_student(&mut stdin, &mut reader, "c4", "Dot", "inactive");

    let day = "2025-09-03";
    let open = request_ok(
        &mut stdin,
        &mut reader,
        "o1",
        "attendance.dayOpen",
        json!({ "date": day }),
    );
    let summary = open.get("summary").expect("summary");
    assert_eq!(summary.get("total").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(summary.get("unmarked").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(summary.get("ratePercent").and_then(|v| v.as_i64()), Some(0));

    let bulk = request_ok(
        &mut stdin,
        &mut reader,
        "b1",
        "attendance.markAllPresent",
        json!({ "date": day }),
    );
    assert_eq!(bulk.get("created").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(bulk.get("updated").and_then(|v| v.as_u64()), Some(0));

    // One student turns out to have been absent.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "attendance.mark",
        json!({ "studentId": ada, "date": day, "status": "absent" }),
    );

    let open = request_ok(
        &mut stdin,
        &mut reader,
        "o2",
        "attendance.dayOpen",
        json!({ "date": day }),
    );
    let summary = open.get("summary").expect("summary");
    assert_eq!(summary.get("present").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(summary.get("absent").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(summary.get("unmarked").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(summary.get("ratePercent").and_then(|v| v.as_i64()), Some(67));

    // Re-running the bulk stamp updates instead of duplicating.
    let bulk = request_ok(
        &mut stdin,
        &mut reader,
        "b2",
        "attendance.markAllPresent",
        json!({ "date": day }),
    );
    assert_eq!(bulk.get("created").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(bulk.get("updated").and_then(|v| v.as_u64()), Some(3));

    let listed = request_ok(&mut stdin, &mut reader, "l1", "attendance.list", json!({ "date": day }));
    assert_eq!(
        listed.get("records").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(3)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
