mod test_support;

use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

fn handle(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    conversation: &str,
    text: &str,
) -> (String, String) {
    let r = request_ok(
        stdin,
        reader,
        id,
        "message.handle",
        json!({ "conversationId": conversation, "text": text }),
    );
    (
        r.get("kind").and_then(|v| v.as_str()).expect("kind").to_string(),
        r.get("reply").and_then(|v| v.as_str()).expect("reply").to_string(),
    )
}

fn seed_similar_names(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    workspace: &std::path::Path,
) {
    request_ok(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        stdin,
        reader,
        "s2",
        "roster.add",
        json!({ "rollNumber": 1003, "name": "Priya" }),
    );
    request_ok(
        stdin,
        reader,
        "s3",
        "roster.add",
        json!({ "rollNumber": 1008, "name": "Prisha" }),
    );
}

#[test]
fn ambiguous_names_resolve_through_a_numbered_pick() {
    let workspace = temp_dir("rollcall-disambiguation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_similar_names(&mut stdin, &mut reader, &workspace);

    let (kind, reply) = handle(&mut stdin, &mut reader, "1", "chat-1", "priy 17-Sep");
    assert_eq!(kind, "needSelection");
    assert_eq!(
        reply,
        "Multiple students match \"priy\":\n\
         0: Priya (roll 1003)\n\
         1: Prisha (roll 1008)\n\
         Reply with a number to pick one."
    );

    // Another conversation is not blocked by chat-1's pending pick.
    let (kind, reply) = handle(&mut stdin, &mut reader, "2", "chat-2", "1003 17-Sep P");
    assert_eq!(kind, "updated");
    assert_eq!(reply, "Set P for Priya (roll 1003) on 17-Sep. Total: 1.");

    // The pick applies the date from the original request.
    let (kind, reply) = handle(&mut stdin, &mut reader, "3", "chat-1", "1");
    assert_eq!(kind, "updated");
    assert_eq!(reply, "Set P for Prisha (roll 1008) on 17-Sep. Total: 1.");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_selection_discards_the_pending_state() {
    let workspace = temp_dir("rollcall-bad-selection");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_similar_names(&mut stdin, &mut reader, &workspace);

    let (kind, _) = handle(&mut stdin, &mut reader, "1", "chat-1", "priy 17-Sep");
    assert_eq!(kind, "needSelection");

    let (kind, reply) = handle(&mut stdin, &mut reader, "2", "chat-1", "9");
    assert_eq!(kind, "invalidSelection");
    assert_eq!(reply, "Invalid selection. Start over with a roll number or name.");

    // "0" would have picked Priya a message ago; now it is a fresh request.
    let (kind, reply) = handle(&mut stdin, &mut reader, "3", "chat-1", "0");
    assert_eq!(kind, "notFound");
    assert_eq!(reply, "Roll number 0 not found.");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn workspace_switch_clears_pending_selections() {
    let workspace = temp_dir("rollcall-switch-clears");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed_similar_names(&mut stdin, &mut reader, &workspace);

    let (kind, _) = handle(&mut stdin, &mut reader, "1", "chat-1", "priy 17-Sep");
    assert_eq!(kind, "needSelection");

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let (kind, _) = handle(&mut stdin, &mut reader, "3", "chat-1", "0");
    assert_eq!(kind, "notFound");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
