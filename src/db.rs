use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::auth;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("grades.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL,
            student_id TEXT UNIQUE,
            student_name TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_student ON users(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL,
            midterm_score TEXT NOT NULL DEFAULT '',
            midterm_grade TEXT NOT NULL DEFAULT '',
            final_score TEXT NOT NULL DEFAULT '',
            final_grade TEXT NOT NULL DEFAULT '',
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student_subject ON grades(student_id, subject)",
        [],
    )?;

    // Workspaces created before the audit columns existed need them added.
    ensure_users_created_at(&conn)?;
    ensure_grades_updated_at(&conn)?;

    seed_default_instructor(&conn)?;

    Ok(conn)
}

/// First-run workspaces get an `admin`/`admin` instructor so the caller can
/// sign in and change the password. Never touched once present.
fn seed_default_instructor(conn: &Connection) -> anyhow::Result<()> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM users WHERE username = 'admin'", [], |r| {
            r.get(0)
        })
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO users(id, username, password, role, created_at)
         VALUES(?, 'admin', ?, 'instructor', ?)",
        (
            Uuid::new_v4().to_string(),
            auth::hash_password("admin"),
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

fn ensure_users_created_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "users", "created_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE users ADD COLUMN created_at TEXT", [])?;
    Ok(())
}

fn ensure_grades_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grades", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE grades ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
