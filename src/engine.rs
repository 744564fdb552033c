use crate::datekey::DateKey;
use crate::directory;
use crate::session::{PendingSelection, SelectionSessions};
use crate::store::AttendanceStore;
use crate::table::{MarkState, Table};

/// What the engine says back, plus a machine-readable kind so the front end
/// can style or route the reply without parsing its text.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub kind: &'static str,
}

fn reply(kind: &'static str, text: String) -> Reply {
    Reply { text, kind }
}

#[derive(Debug, Clone, PartialEq)]
enum StudentRef {
    Roll(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
struct ParsedRequest {
    student: StudentRef,
    date: Option<DateKey>,
    status: MarkState,
}

enum Step {
    Done(Reply),
    NeedSelection {
        candidates: Vec<(String, i64)>,
        prompt: Reply,
    },
}

fn parse_roll(token: &str) -> Option<i64> {
    token.parse::<i64>().ok()
}

/// "a"/"absent" in any case mean Absent; every other token reads as a
/// Present mark. "P", "p", "present" and stray typos all meant present in
/// the paper register this replaces.
fn parse_status(token: &str) -> MarkState {
    if token.eq_ignore_ascii_case("a") || token.eq_ignore_ascii_case("absent") {
        MarkState::Absent
    } else {
        MarkState::Present
    }
}

fn roll_or_name(token: &str) -> StudentRef {
    match parse_roll(token) {
        Some(roll) => StudentRef::Roll(roll),
        None => StudentRef::Name(token.to_string()),
    }
}

fn name_query(text: &str) -> ParsedRequest {
    ParsedRequest {
        student: StudentRef::Name(text.trim().to_string()),
        date: None,
        status: MarkState::Present,
    }
}

/// Token-count dispatch over a free-form message:
///
///   1 token    roll number, or a name query
///   2 tokens   <rollOrName> <date>, else <rollOrName> <status>
///   3 tokens   <roll> <date> <status>; if either of the first two fails to
///              parse, token 1 becomes a name query
///   4+ tokens  the whole text is a name query
///
/// Missing date means "today" (resolved by the caller); missing status means
/// Present. An all-whitespace message parses to nothing.
fn parse_request(text: &str) -> Option<ParsedRequest> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [] => None,
        [one] => Some(ParsedRequest {
            student: roll_or_name(one),
            date: None,
            status: MarkState::Present,
        }),
        [who, second] => match DateKey::parse(second) {
            Some(date) => Some(ParsedRequest {
                student: roll_or_name(who),
                date: Some(date),
                status: MarkState::Present,
            }),
            None => Some(ParsedRequest {
                student: roll_or_name(who),
                date: None,
                status: parse_status(second),
            }),
        },
        [first, second, third] => match (parse_roll(first), DateKey::parse(second)) {
            (Some(roll), Some(date)) => Some(ParsedRequest {
                student: StudentRef::Roll(roll),
                date: Some(date),
                status: parse_status(third),
            }),
            _ => Some(name_query(first)),
        },
        _ => Some(name_query(text)),
    }
}

/// The one mutation path: resolve the column, compare, set, recount. The
/// second element reports whether the table changed; an identical existing
/// mark leaves it untouched and the caller skips the save.
fn apply_mark(table: &mut Table, row: usize, date: &DateKey, status: MarkState) -> (Reply, bool) {
    let (col, _) = table.resolve_column(date);
    let record = table.student_record(row);
    if table.cell(row, col) == status {
        return (
            reply(
                "already",
                format!(
                    "Already {} for {} (roll {}) on {}.",
                    status.code(),
                    record.name,
                    record.roll_number,
                    date.label()
                ),
            ),
            false,
        );
    }
    table.set_cell(row, col, status);
    table.recompute_total(row);
    (
        reply(
            "updated",
            format!(
                "Set {} for {} (roll {}) on {}. Total: {}.",
                status.code(),
                record.name,
                record.roll_number,
                date.label(),
                table.rows[row].total
            ),
        ),
        true,
    )
}

fn mark_by_roll(table: &mut Table, roll: i64, date: &DateKey, status: MarkState) -> (Reply, bool) {
    match directory::find_by_roll(table, roll) {
        Some(rec) => apply_mark(table, rec.row_position, date, status),
        None => (
            reply("notFound", format!("Roll number {roll} not found.")),
            false,
        ),
    }
}

fn mark_by_name(table: &mut Table, query: &str, date: &DateKey, status: MarkState) -> (Step, bool) {
    let matches = directory::find_by_name(table, query);
    match matches.len() {
        0 => (
            Step::Done(reply(
                "noMatch",
                format!("No students found matching \"{query}\"."),
            )),
            false,
        ),
        1 => {
            let (r, dirty) = apply_mark(table, matches[0].row_position, date, status);
            (Step::Done(r), dirty)
        }
        _ => {
            let mut lines = vec![format!("Multiple students match \"{query}\":")];
            for (i, m) in matches.iter().enumerate() {
                lines.push(format!("{i}: {} (roll {})", m.name, m.roll_number));
            }
            lines.push("Reply with a number to pick one.".to_string());
            let candidates = matches
                .into_iter()
                .map(|m| (m.name, m.roll_number))
                .collect();
            (
                Step::NeedSelection {
                    candidates,
                    prompt: reply("needSelection", lines.join("\n")),
                },
                false,
            )
        }
    }
}

fn store_failure(err: anyhow::Error) -> Reply {
    tracing::error!(error = ?err, "register update failed");
    reply(
        "failed",
        "Could not update the attendance sheet. Try again.".to_string(),
    )
}

/// The pending selection is consumed before this runs, so whatever the
/// message says the conversation is back to idle afterwards. A message that
/// is not an offered index is reported as invalid, never reinterpreted as a
/// fresh request.
fn answer_selection(store: &AttendanceStore, pending: &PendingSelection, text: &str) -> Reply {
    let chosen = text
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|i| pending.candidates.get(i));
    let Some(&(_, roll)) = chosen else {
        return reply(
            "invalidSelection",
            "Invalid selection. Start over with a roll number or name.".to_string(),
        );
    };
    // Re-find the row: the roster may have changed while the user decided.
    match store.update(|t| Ok(mark_by_roll(t, roll, &pending.date_key, pending.status))) {
        Ok(r) => r,
        Err(e) => store_failure(e),
    }
}

/// One inbound chat message, one reply. Resolution and mutation run inside a
/// single store cycle, so the row a name resolved to cannot move under the
/// mark being written.
pub fn handle_message(
    store: &AttendanceStore,
    sessions: &SelectionSessions,
    conversation_id: &str,
    text: &str,
) -> Reply {
    if let Some(pending) = sessions.take(conversation_id) {
        return answer_selection(store, &pending, text);
    }

    let Some(ParsedRequest {
        student,
        date,
        status,
    }) = parse_request(text)
    else {
        return reply(
            "empty",
            "Nothing to do. Send a roll number or a student name.".to_string(),
        );
    };
    let date = date.unwrap_or_else(DateKey::today);

    match student {
        StudentRef::Roll(roll) => {
            match store.update(|t| Ok(mark_by_roll(t, roll, &date, status))) {
                Ok(r) => r,
                Err(e) => store_failure(e),
            }
        }
        StudentRef::Name(query) => {
            match store.update(|t| Ok(mark_by_name(t, &query, &date, status))) {
                Ok(Step::Done(r)) => r,
                Ok(Step::NeedSelection { candidates, prompt }) => {
                    sessions.put(
                        conversation_id,
                        PendingSelection {
                            candidates,
                            date_key: date,
                            status,
                        },
                    );
                    prompt
                }
                Err(e) => store_failure(e),
            }
        }
    }
}
