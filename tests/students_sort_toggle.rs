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

fn first_names(result: &serde_json::Value) -> Vec<String> {
    result
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .map(|s| {
            s.get("firstName")
                .and_then(|v| v.as_str())
                .expect("firstName")
                .to_string()
        })
        .collect()
}

#[test]
fn clicking_the_sorted_column_reverses_the_list() {
    let workspace = temp_dir("rosterd-sort-toggle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, first) in ["Cara", "Abe", "Bea"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "students.create",
            json!({
                "firstName": first,
                "lastName": "Tester",
                "enrollmentDate": "2025-09-02"
            }),
        );
    }

    let asc = request_ok(
        &mut stdin,
        &mut reader,
        "l1",
        "students.list",
        json!({ "sortField": "firstName", "sortDirection": "asc" }),
    );
    assert_eq!(first_names(&asc), vec!["Abe", "Bea", "Cara"]);
    assert_eq!(
        asc.get("sort").and_then(|s| s.get("direction")).and_then(|v| v.as_str()),
        Some("asc")
    );

    // Clicking the already-sorted column toggles to descending: exact reverse.
    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "l2",
        "students.list",
        json!({
            "sortField": "firstName",
            "sortDirection": "asc",
            "clickField": "firstName"
        }),
    );
    assert_eq!(first_names(&toggled), vec!["Cara", "Bea", "Abe"]);
    assert_eq!(
        toggled
            .get("sort")
            .and_then(|s| s.get("direction"))
            .and_then(|v| v.as_str()),
        Some("desc")
    );

    // Clicking a different column resets to ascending on that column.
    let switched = request_ok(
        &mut stdin,
        &mut reader,
        "l3",
        "students.list",
        json!({
            "sortField": "firstName",
            "sortDirection": "desc",
            "clickField": "email"
        }),
    );
    assert_eq!(
        switched.get("sort").and_then(|s| s.get("field")).and_then(|v| v.as_str()),
        Some("email")
    );
    assert_eq!(
        switched
            .get("sort")
            .and_then(|s| s.get("direction"))
            .and_then(|v| v.as_str()),
        Some("asc")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
