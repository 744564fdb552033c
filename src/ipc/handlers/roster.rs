use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::AttendanceStore;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message: message.into(),
        details: None,
    }
}

fn store_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr {
        code: "store_failed",
        message: e.to_string(),
        details: None,
    }
}

enum AddOutcome {
    Added { row_position: usize },
    Duplicate { existing_name: String },
}

fn roster_add(
    store: &AttendanceStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll = params
        .get("rollNumber")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| bad_params("missing rollNumber"))?;
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() {
        return Err(bad_params("missing name"));
    }

    let outcome = store
        .update(|t| {
            if let Some(row) = t.find_row(roll) {
                let existing_name = t.rows[row].name.clone();
                return Ok((AddOutcome::Duplicate { existing_name }, false));
            }
            let row = t.add_student(roll, name);
            Ok((AddOutcome::Added { row_position: row }, true))
        })
        .map_err(store_failed)?;

    match outcome {
        AddOutcome::Added { row_position } => Ok(json!({
            "rollNumber": roll,
            "name": name,
            "rowPosition": row_position,
        })),
        AddOutcome::Duplicate { existing_name } => Err(HandlerErr {
            code: "duplicate_roll",
            message: format!("roll number {roll} already belongs to {existing_name}"),
            details: Some(json!({ "rollNumber": roll, "name": existing_name })),
        }),
    }
}

fn roster_list(store: &AttendanceStore) -> Result<serde_json::Value, HandlerErr> {
    store
        .read(|t| {
            let students: Vec<serde_json::Value> = t
                .rows
                .iter()
                .map(|r| {
                    json!({
                        "rollNumber": r.roll_number,
                        "name": r.name,
                        "total": r.total,
                    })
                })
                .collect();
            Ok(json!({
                "students": students,
                "dateColumns": t.columns.len(),
            }))
        })
        .map_err(store_failed)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let worked = match req.method.as_str() {
        "roster.add" | "roster.list" => {
            let Some(store) = state.store.as_ref() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            match req.method.as_str() {
                "roster.add" => roster_add(store, &req.params),
                _ => roster_list(store),
            }
        }
        _ => return None,
    };

    Some(match worked {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    })
}
