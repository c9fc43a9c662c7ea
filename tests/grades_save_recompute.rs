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
    let exe = env!("CARGO_BIN_EXE_gradesd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradesd");
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

fn setup_row(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> String {
    let csv_path = workspace.join("grades.csv");
    std::fs::write(
        &csv_path,
        "Student ID,Student Name,Section,Subject,Final Grade\nS1001,Jane Doe,A,CS101,1.00\n",
    )
    .expect("write csv");

    let _ = request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "s2",
        "grades.importCsv",
        json!({ "csvPath": csv_path.to_string_lossy() }),
    );
    let listed = request_ok(stdin, reader, "s3", "grades.list", json!({}));
    listed
        .get("grades")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|g| g.get("id"))
        .and_then(|v| v.as_str())
        .expect("grade id")
        .to_string()
}

fn save_final_grade(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    grade_id: &str,
    final_grade: &str,
) -> serde_json::Value {
    let result = request_ok(
        stdin,
        reader,
        id,
        "grades.save",
        json!({ "grades": [{
            "id": grade_id,
            "studentId": "S1001",
            "studentName": "Jane Doe",
            "section": "A",
            "subject": "CS101",
            "midtermScore": "",
            "midtermGrade": "",
            "finalScore": "",
            "finalGrade": final_grade
        }] }),
    );
    result
        .get("updated")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .cloned()
        .expect("updated entry")
}

#[test]
fn save_returns_recomputed_remark_and_color() {
    let workspace = temp_dir("gradesd-save-recompute");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let grade_id = setup_row(&mut stdin, &mut reader, &workspace);

    let cases = [
        ("1.00", "Excellent", "#d4edda"),
        ("2.75", "Average", "#fff3cd"),
        ("inc", "Incomplete", "#f5c6cb"),
        ("D/F", "Dropped with Failure", "#f8d7da"),
        ("4.00", "", "#fff"),
        ("", "", "#fff"),
    ];
    for (i, (final_grade, remark, color)) in cases.iter().enumerate() {
        let updated = save_final_grade(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            &grade_id,
            final_grade,
        );
        assert_eq!(
            updated.get("remark").and_then(|v| v.as_str()),
            Some(*remark),
            "final grade {:?}",
            final_grade
        );
        assert_eq!(
            updated.get("color").and_then(|v| v.as_str()),
            Some(*color),
            "final grade {:?}",
            final_grade
        );
    }

    // The stored row reflects the last save; remark stays derived-only.
    let listed = request_ok(&mut stdin, &mut reader, "z1", "grades.list", json!({}));
    let row = listed
        .get("grades")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .cloned()
        .expect("grade row");
    assert_eq!(row.get("finalGrade").and_then(|v| v.as_str()), Some(""));
    assert_eq!(row.get("remark").and_then(|v| v.as_str()), Some(""));
}

#[test]
fn save_rejects_non_array_payload() {
    let workspace = temp_dir("gradesd-save-badpayload");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.save",
        json!({ "grades": "not-a-list" }),
    );
    assert_eq!(
        resp.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_params")
    );
}

#[test]
fn bulk_delete_removes_selected_rows_only() {
    let workspace = temp_dir("gradesd-bulk-delete");
    let csv_path = workspace.join("grades.csv");
    std::fs::write(
        &csv_path,
        "Student ID,Student Name,Subject,Final Grade\n\
         S1001,Jane Doe,CS101,1.00\n\
         S1002,Juan Cruz,CS101,2.00\n",
    )
    .expect("write csv");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.importCsv",
        json!({ "csvPath": csv_path.to_string_lossy() }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "3", "grades.list", json!({}));
    let grades = listed
        .get("grades")
        .and_then(|v| v.as_array())
        .expect("grades array");
    let doomed = grades
        .iter()
        .find(|g| g.get("studentId").and_then(|v| v.as_str()) == Some("S1001"))
        .and_then(|g| g.get("id"))
        .and_then(|v| v.as_str())
        .expect("doomed id")
        .to_string();

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.delete",
        json!({ "ids": [doomed] }),
    );
    assert_eq!(deleted.get("deleted").and_then(|v| v.as_i64()), Some(1));

    let listed = request_ok(&mut stdin, &mut reader, "5", "grades.list", json!({}));
    let grades = listed
        .get("grades")
        .and_then(|v| v.as_array())
        .expect("grades array");
    assert_eq!(grades.len(), 1);
    assert_eq!(
        grades[0].get("studentId").and_then(|v| v.as_str()),
        Some("S1002")
    );
}
