use crate::engine;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// The conversational seam: one inbound chat message in, one reply out.
/// Parsing, resolution and the attendance update all happen behind
/// `engine::handle_message`; this handler only checks the envelope.
fn handle_message(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(conversation_id) = req.params.get("conversationId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.conversationId", None);
    };
    let Some(text) = req.params.get("text").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.text", None);
    };

    let reply = engine::handle_message(store, &state.sessions, conversation_id, text);
    ok(&req.id, json!({ "reply": reply.text, "kind": reply.kind }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "message.handle" => Some(handle_message(state, req)),
        _ => None,
    }
}
