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
    let exe = env!("CARGO_BIN_EXE_reportcardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportcardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

fn record(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    kind: &str,
    score: f64,
    recorded_at: serde_json::Value,
) {
    request_ok(
        stdin,
        reader,
        id,
        "assessments.record",
        json!({
            "studentId": "s1",
            "subjectId": "mathematics",
            "assessmentKind": kind,
            "score": score,
            "maxScore": 10,
            "recordedAt": recorded_at
        }),
    );
}

#[test]
fn weekly_window_is_inclusive_across_date_representations() {
    let workspace = temp_dir("reportcard-weekly-window");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "classId": "c1", "name": "Primary 5" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "classId": "c1", "studentId": "s1", "firstName": "Ada", "lastName": "Obi" }),
    );

    // Monday as ISO text, Friday as epoch millis, Wednesday as a wrapped
    // timestamp, and one entry each side of the window.
    record(&mut stdin, &mut reader, "r1", "classwork", 8.0, json!("2025-10-06"));
    record(&mut stdin, &mut reader, "r2", "classwork", 6.0, json!(1760054400000i64));
    record(
        &mut stdin,
        &mut reader,
        "r3",
        "homework",
        9.0,
        json!({ "seconds": 1759881600i64, "nanoseconds": 0 }),
    );
    record(&mut stdin, &mut reader, "r4", "classwork", 1.0, json!("2025-10-05"));
    record(&mut stdin, &mut reader, "r5", "homework", 1.0, json!("2025-10-11T08:30:00Z"));

    for (i, (date, status)) in [("2025-10-06", "present"), ("2025-10-07", "present"), ("2025-10-12", "absent")]
        .into_iter()
        .enumerate()
    {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("att-{}", i),
            "attendance.mark",
            json!({ "studentId": "s1", "date": date, "status": status }),
        );
    }
    request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "merits.record",
        json!({ "studentId": "s1", "date": "2025-10-09", "points": 12, "category": "conduct", "reason": "helped a classmate" }),
    );

    let weekly = request_ok(
        &mut stdin,
        &mut reader,
        "w",
        "reports.generateWeekly",
        json!({ "studentId": "s1", "weekStart": "2025-10-06", "weekEnd": 1760054400000i64 }),
    );
    let report = &weekly["report"];
    assert_eq!(report["id"], json!("weekly_s1_1759708800000_1760054400000"));
    let body = &report["body"];
    assert_eq!(body["weekStart"], json!("2025-10-06"));
    assert_eq!(body["weekEnd"], json!("2025-10-10"));
    let math = &body["subjects"][0];
    assert_eq!(math["classworkScores"], json!([8.0, 6.0]));
    assert_eq!(math["classworkAverage"], json!(7.0));
    assert_eq!(math["homeworkScores"], json!([9.0]));
    assert_eq!(report["attendance"]["totalDays"], json!(2));
    assert_eq!(report["merits"]["netPoints"], json!(12));
    assert_eq!(report["merits"]["byCategory"], json!({ "conduct": 12 }));

    let strengths = body["strengths"].as_array().expect("strengths");
    assert!(strengths
        .iter()
        .any(|s| s.as_str().unwrap_or_default().starts_with("Excellent attendance")));
    assert!(strengths
        .iter()
        .any(|s| s.as_str().unwrap_or_default().starts_with("Strong homework")));
    assert!(strengths
        .iter()
        .any(|s| s.as_str().unwrap_or_default().starts_with("Positive conduct")));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn weekly_report_for_an_empty_week_is_not_an_error() {
    let workspace = temp_dir("reportcard-weekly-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "classId": "c1", "name": "Primary 5" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "classId": "c1", "studentId": "s1", "firstName": "Ada", "lastName": "Obi" }),
    );

    let weekly = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.generateWeekly",
        json!({ "studentId": "s1", "weekStart": "2025-10-13", "weekEnd": "2025-10-17" }),
    );
    assert_eq!(weekly["report"]["body"]["subjects"], json!([]));
    assert_eq!(weekly["report"]["body"]["strengths"], json!([]));
    assert_eq!(weekly["report"]["body"]["improvements"], json!([]));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "reports.generateWeekly",
        json!({ "studentId": "s1", "weekStart": "2025-10-17", "weekEnd": "2025-10-13" }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "reports.generateWeekly",
        json!({ "studentId": "s1", "weekStart": "next monday", "weekEnd": "2025-10-17" }),
    );
    assert_eq!(code, "bad_params");

    drop(stdin);
    let _ = child.wait();
}
