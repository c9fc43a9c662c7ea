use std::path::{Path, PathBuf};

use serde_json::json;

use crate::csvio;
use crate::import;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

/// Hard ceiling on upload size, enforced before any parsing.
const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.importCsv" => Some(import_grades(state, req)),
        "grades.template" => Some(write_template(req)),
        _ => None,
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn import_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let path = req
        .params
        .get("csvPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing csvPath", None);
    };

    if !has_csv_extension(&path) {
        return err(
            &req.id,
            "bad_file_type",
            "Invalid file or missing file (allowed: .csv)",
            Some(json!({ "path": path.to_string_lossy() })),
        );
    }

    let meta = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) => {
            return err(
                &req.id,
                "file_read_failed",
                e.to_string(),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    };
    if meta.len() > MAX_UPLOAD_BYTES {
        return err(
            &req.id,
            "file_too_large",
            format!("file exceeds the {} byte upload limit", MAX_UPLOAD_BYTES),
            Some(json!({ "sizeBytes": meta.len() })),
        );
    }

    let raw = match std::fs::read(&path) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "file_read_failed",
                e.to_string(),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    };

    match import::import_csv(conn, &raw) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => err(&req.id, "import_failed", e.to_string(), None),
    }
}

fn write_template(req: &Request) -> serde_json::Value {
    let path = req
        .params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match csvio::write_template(&path) {
        Ok(()) => ok(&req.id, json!({ "outPath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "template_write_failed", e.to_string(), None),
    }
}
