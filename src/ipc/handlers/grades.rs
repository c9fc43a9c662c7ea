use rusqlite::params_from_iter;
use serde_json::json;

use crate::classify;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(list(state, req)),
        "grades.save" => Some(save(state, req)),
        "grades.delete" => Some(delete(state, req)),
        _ => None,
    }
}

fn param_str<'a>(req: &'a Request, name: &str) -> &'a str {
    req.params
        .get(name)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
}

fn list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let search = param_str(req, "search");
    let subject = param_str(req, "subject");
    let student_id = param_str(req, "studentId");

    let mut sql = String::from(
        "SELECT id, student_id, student_name, section, subject,
                midterm_score, midterm_grade, final_score, final_grade
         FROM grades WHERE 1=1",
    );
    let mut params: Vec<String> = Vec::new();

    if !student_id.is_empty() {
        sql.push_str(" AND student_id = ?");
        params.push(student_id.to_string());
    }
    if !subject.is_empty() {
        sql.push_str(" AND subject = ?");
        params.push(subject.to_string());
    }
    if !search.is_empty() {
        sql.push_str(" AND (student_id LIKE ? OR student_name LIKE ?)");
        let like = format!("%{}%", search);
        params.push(like.clone());
        params.push(like);
    }
    sql.push_str(" ORDER BY student_id, subject");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            let final_grade: String = row.get(8)?;
            let (remark, color) = classify::classify(&final_grade);
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "studentId": row.get::<_, String>(1)?,
                "studentName": row.get::<_, String>(2)?,
                "section": row.get::<_, String>(3)?,
                "subject": row.get::<_, String>(4)?,
                "midtermScore": row.get::<_, String>(5)?,
                "midtermGrade": row.get::<_, String>(6)?,
                "finalScore": row.get::<_, String>(7)?,
                "finalGrade": final_grade,
                "remark": remark,
                "color": color,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let grades = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Distinct subject list for filter dropdowns; the empty placeholder
    // subject from signup rows is not useful there.
    let subjects = conn
        .prepare("SELECT DISTINCT subject FROM grades WHERE subject <> '' ORDER BY subject")
        .and_then(|mut s| {
            s.query_map([], |row| row.get::<_, String>(0))
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    let subjects = match subjects {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(&req.id, json!({ "grades": grades, "subjects": subjects }))
}

fn save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(items) = req.params.get("grades").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "Invalid payload", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let field = |item: &serde_json::Value, name: &str| -> String {
        item.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    let mut updated = Vec::with_capacity(items.len());
    for item in items {
        let Some(grade_id) = item.get("id").and_then(|v| v.as_str()) else {
            let _ = tx.rollback();
            return err(&req.id, "bad_params", "grade object missing id", None);
        };

        let final_grade = field(item, "finalGrade");
        let res = tx.execute(
            "UPDATE grades SET student_id = ?, student_name = ?, section = ?, subject = ?,
                 midterm_score = ?, midterm_grade = ?, final_score = ?, final_grade = ?,
                 updated_at = ?
             WHERE id = ?",
            (
                field(item, "studentId"),
                field(item, "studentName"),
                field(item, "section"),
                field(item, "subject"),
                field(item, "midtermScore"),
                field(item, "midtermGrade"),
                field(item, "finalScore"),
                &final_grade,
                chrono::Utc::now().to_rfc3339(),
                grade_id,
            ),
        );
        if let Err(e) = res {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "gradeId": grade_id })),
            );
        }

        // Recomputed so the caller can refresh its view without a re-fetch.
        let (remark, color) = classify::classify(&final_grade);
        updated.push(json!({ "id": grade_id, "remark": remark, "color": color }));
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "updated": updated }))
}

fn delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(ids) = req.params.get("ids").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing ids", None);
    };

    let mut deleted = 0usize;
    for id in ids {
        let Some(id) = id.as_str() else {
            continue;
        };
        match conn.execute("DELETE FROM grades WHERE id = ?", [id]) {
            Ok(n) => deleted += n,
            Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
        }
    }

    ok(&req.id, json!({ "deleted": deleted }))
}
