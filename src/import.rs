use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::auth;
use crate::csvio::HeaderMap;
use crate::encoding;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub encoding: &'static str,
    pub rows_processed: usize,
    pub grades_inserted: usize,
    pub grades_updated: usize,
    pub accounts_created: usize,
}

/// Reconciles an uploaded CSV against the grade store. Rows are keyed by
/// (student_id, subject): an existing row gets its name and the four score
/// fields overwritten (section is left as-is on update), a new pair gets a
/// full insert. Students unseen by the users table are provisioned an
/// account with username = student_id and the id as the default password.
///
/// The whole file runs inside one transaction committed at the end; a
/// storage failure propagates and abandons the uncommitted remainder.
pub fn import_csv(conn: &Connection, raw: &[u8]) -> anyhow::Result<ImportReport> {
    let decoded = encoding::decode_lossy(raw);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(decoded.text.as_bytes());
    let headers = HeaderMap::from_headers(reader.headers()?);

    let mut report = ImportReport {
        encoding: decoded.encoding,
        rows_processed: 0,
        grades_inserted: 0,
        grades_updated: 0,
        accounts_created: 0,
    };

    let tx = conn.unchecked_transaction()?;
    for record in reader.records() {
        // A row the csv reader cannot deliver (e.g. a broken quote) is
        // skipped; the rest of the batch still goes through.
        let Ok(record) = record else {
            continue;
        };
        report.rows_processed += 1;

        let sid = headers.field(&record, "student id");
        let sname = headers.field(&record, "student name");
        let section = headers.field(&record, "section");
        let subject = headers.field(&record, "subject");
        let midterm_score = headers.field(&record, "midterm score");
        let midterm_grade = headers.field(&record, "midterm grade");
        let final_score = headers.field(&record, "final score");
        let final_grade = headers.field(&record, "final grade");

        let now = chrono::Utc::now().to_rfc3339();

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM grades WHERE student_id = ? AND subject = ?",
                [sid, subject],
                |r| r.get(0),
            )
            .optional()?;

        match existing {
            Some(grade_id) => {
                tx.execute(
                    "UPDATE grades SET student_name = ?, midterm_score = ?, midterm_grade = ?,
                         final_score = ?, final_grade = ?, updated_at = ?
                     WHERE id = ?",
                    (
                        sname,
                        midterm_score,
                        midterm_grade,
                        final_score,
                        final_grade,
                        &now,
                        &grade_id,
                    ),
                )?;
                report.grades_updated += 1;
            }
            None => {
                tx.execute(
                    "INSERT INTO grades(id, student_id, student_name, section, subject,
                         midterm_score, midterm_grade, final_score, final_grade, updated_at)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        Uuid::new_v4().to_string(),
                        sid,
                        sname,
                        section,
                        subject,
                        midterm_score,
                        midterm_grade,
                        final_score,
                        final_grade,
                        &now,
                    ),
                )?;
                report.grades_inserted += 1;
            }
        }

        if !sid.is_empty() && provision_student_account(&tx, sid, sname)? {
            report.accounts_created += 1;
        }
    }
    tx.commit()?;

    Ok(report)
}

/// Creates a student account for `sid` unless one already references it.
/// Existing accounts are left untouched even when the imported name differs.
/// Returns true when an account was created.
fn provision_student_account(
    conn: &Connection,
    sid: &str,
    sname: &str,
) -> anyhow::Result<bool> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM users WHERE student_id = ?", [sid], |r| {
            r.get(0)
        })
        .optional()?;
    if existing.is_some() {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO users(id, username, password, role, student_id, student_name, created_at)
         VALUES(?, ?, ?, 'student', ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            sid,
            auth::hash_password(sid),
            sid,
            sname,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(true)
}
