use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "rollcall.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            roll_number INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            total INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS date_columns(
            date_key TEXT PRIMARY KEY,
            position INTEGER NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            roll_number INTEGER NOT NULL,
            date_key TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(roll_number, date_key),
            FOREIGN KEY(roll_number) REFERENCES students(roll_number),
            FOREIGN KEY(date_key) REFERENCES date_columns(date_key)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_date ON marks(date_key)",
        [],
    )?;

    // Workspaces created before totals were stored need the column added
    // and backfilled from the marks that are already there.
    ensure_students_total(&conn)?;

    Ok(conn)
}

fn ensure_students_total(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "total")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN total INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    conn.execute(
        "UPDATE students SET total = (
            SELECT COUNT(*) FROM marks m
            WHERE m.roll_number = students.roll_number AND m.status = 'present'
        )",
        [],
    )?;
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
