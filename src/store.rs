use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::anyhow;
use rusqlite::Connection;

use crate::db;
use crate::table::{MarkState, StudentRow, Table};

/// Handle on the persisted register. The one mutex here serializes every
/// load -> mutate -> save cycle process-wide; two concurrent updates can
/// never both load before either saves, which is the lost-update hazard the
/// original script had. Reads share the same mutex, so a listing never
/// observes a half-written table.
pub struct AttendanceStore {
    inner: Mutex<Connection>,
}

impl AttendanceStore {
    pub fn open(workspace: &Path) -> anyhow::Result<AttendanceStore> {
        let conn = db::open_db(workspace)?;
        Ok(AttendanceStore {
            inner: Mutex::new(conn),
        })
    }

    /// Runs `f` against a freshly loaded table under the store lock.
    pub fn read<R>(&self, f: impl FnOnce(&Table) -> anyhow::Result<R>) -> anyhow::Result<R> {
        let conn = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let table = load(&conn)?;
        f(&table)
    }

    /// One full load -> mutate -> save cycle under the store lock. The
    /// closure returns its result plus whether it changed the table; an
    /// unchanged table is not rewritten (idempotent no-ops skip the save).
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut Table) -> anyhow::Result<(R, bool)>,
    ) -> anyhow::Result<R> {
        let conn = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = load(&conn)?;
        let (out, dirty) = f(&mut table)?;
        if dirty {
            save(&conn, &table)?;
        }
        Ok(out)
    }
}

fn status_to_db(state: MarkState) -> Option<&'static str> {
    match state {
        MarkState::Present => Some("present"),
        MarkState::Absent => Some("absent"),
        MarkState::Empty => None,
    }
}

fn status_from_db(s: &str) -> anyhow::Result<MarkState> {
    match s {
        "present" => Ok(MarkState::Present),
        "absent" => Ok(MarkState::Absent),
        other => Err(anyhow!("unknown mark status in store: {other}")),
    }
}

fn load(conn: &Connection) -> anyhow::Result<Table> {
    let mut stmt = conn.prepare("SELECT date_key FROM date_columns ORDER BY position")?;
    let columns = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT roll_number, name, total FROM students ORDER BY sort_order")?;
    let mut rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|(roll_number, name, total)| StudentRow {
            roll_number,
            name,
            cells: vec![MarkState::Empty; columns.len()],
            total,
        })
        .collect::<Vec<_>>();

    let col_index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let row_index: HashMap<i64, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.roll_number, i))
        .collect();

    let mut stmt = conn.prepare("SELECT roll_number, date_key, status FROM marks")?;
    let marks = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (roll, key, status) in marks {
        let (Some(&row), Some(&col)) = (row_index.get(&roll), col_index.get(key.as_str())) else {
            // Foreign keys make this unreachable short of a corrupted file.
            return Err(anyhow!("mark references missing row or column: roll {roll}, key {key}"));
        };
        rows[row].cells[col] = status_from_db(&status)?;
    }

    Ok(Table { columns, rows })
}

/// Persists the whole grid inside one transaction; a concurrent `load` from
/// another handle sees either the old table or the new one, never a slice.
fn save(conn: &Connection, table: &Table) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    for (pos, key) in table.columns.iter().enumerate() {
        tx.execute(
            "INSERT INTO date_columns(date_key, position) VALUES(?, ?)
             ON CONFLICT(date_key) DO UPDATE SET position = excluded.position",
            (key, pos as i64),
        )?;
    }

    for (pos, row) in table.rows.iter().enumerate() {
        tx.execute(
            "INSERT INTO students(roll_number, name, sort_order, total) VALUES(?, ?, ?, ?)
             ON CONFLICT(roll_number) DO UPDATE SET
               name = excluded.name,
               sort_order = excluded.sort_order,
               total = excluded.total",
            (row.roll_number, &row.name, pos as i64, row.total),
        )?;
        for (col, cell) in row.cells.iter().enumerate() {
            let Some(status) = status_to_db(*cell) else {
                continue;
            };
            tx.execute(
                "INSERT INTO marks(roll_number, date_key, status) VALUES(?, ?, ?)
                 ON CONFLICT(roll_number, date_key) DO UPDATE SET status = excluded.status",
                (row.roll_number, &table.columns[col], status),
            )?;
        }
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datekey::DateKey;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> PathBuf {
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

    fn key(s: &str) -> DateKey {
        DateKey::parse(s).expect("test date")
    }

    #[test]
    fn grid_survives_a_reopen() {
        let ws = temp_workspace("rollcall-store-reopen");
        let store = AttendanceStore::open(&ws).expect("open store");

        store
            .update(|t| {
                t.add_student(1001, "Alice Johnson");
                t.add_student(1002, "Bob Stone");
                let (col, created) = t.resolve_column(&key("17-Sep"));
                assert!(created);
                t.set_cell(0, col, MarkState::Present);
                t.recompute_total(0);
                t.set_cell(1, col, MarkState::Absent);
                t.recompute_total(1);
                Ok(((), true))
            })
            .expect("seed grid");
        drop(store);

        let store = AttendanceStore::open(&ws).expect("reopen store");
        store
            .read(|t| {
                assert_eq!(t.columns, vec!["1709".to_string()]);
                assert_eq!(t.rows.len(), 2);
                assert_eq!(t.rows[0].name, "Alice Johnson");
                assert_eq!(t.cell(0, 0), MarkState::Present);
                assert_eq!(t.rows[0].total, 1);
                assert_eq!(t.cell(1, 0), MarkState::Absent);
                assert_eq!(t.rows[1].total, 0);
                Ok(())
            })
            .expect("read grid");

        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn unchanged_updates_do_not_persist() {
        let ws = temp_workspace("rollcall-store-clean");
        let store = AttendanceStore::open(&ws).expect("open store");

        store
            .update(|t| {
                t.add_student(7, "Nia");
                Ok(((), true))
            })
            .expect("seed");

        // Mutate the in-memory table but report it clean; nothing is saved.
        store
            .update(|t| {
                t.rows[0].name = "Changed".to_string();
                Ok(((), false))
            })
            .expect("dry run");

        store
            .read(|t| {
                assert_eq!(t.rows[0].name, "Nia");
                Ok(())
            })
            .expect("read back");

        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn concurrent_updates_lose_no_marks() {
        let ws = temp_workspace("rollcall-store-threads");
        let store = Arc::new(AttendanceStore::open(&ws).expect("open store"));

        store
            .update(|t| {
                for roll in 0..8 {
                    t.add_student(roll, &format!("Student {roll}"));
                }
                Ok(((), true))
            })
            .expect("seed roster");

        std::thread::scope(|scope| {
            for roll in 0..8i64 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    store
                        .update(|t| {
                            let row = t.find_row(roll).expect("seeded row");
                            let (col, _) = t.resolve_column(&key("17-Sep"));
                            t.set_cell(row, col, MarkState::Present);
                            t.recompute_total(row);
                            Ok(((), true))
                        })
                        .expect("mark present");
                });
            }
        });

        store
            .read(|t| {
                assert_eq!(t.columns.len(), 1);
                for row in &t.rows {
                    assert_eq!(row.total, 1, "roll {} lost its mark", row.roll_number);
                }
                Ok(())
            })
            .expect("read final grid");

        let _ = std::fs::remove_dir_all(ws);
    }
}
