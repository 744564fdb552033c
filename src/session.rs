use std::collections::HashMap;
use std::sync::Mutex;

use crate::datekey::DateKey;
use crate::table::MarkState;

/// A disambiguation waiting for its answer. Candidates are (name, roll) in
/// the order they were offered; the date key and status were fixed when the
/// ambiguous request arrived, so answering after midnight still lands on the
/// day the user asked about.
#[derive(Debug, Clone)]
pub struct PendingSelection {
    pub candidates: Vec<(String, i64)>,
    pub date_key: DateKey,
    pub status: MarkState,
}

/// Per-conversation pending selections, volatile only. A conversation is
/// either Idle (no entry) or AwaitingSelection (one entry); the entry is
/// consumed by the next message from that conversation whatever it says.
#[derive(Debug, Default)]
pub struct SelectionSessions {
    inner: Mutex<HashMap<String, PendingSelection>>,
}

impl SelectionSessions {
    pub fn new() -> SelectionSessions {
        SelectionSessions::default()
    }

    pub fn put(&self, conversation_id: &str, pending: PendingSelection) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(conversation_id.to_string(), pending);
    }

    /// Removes and returns the pending selection for this conversation.
    pub fn take(&self, conversation_id: &str) -> Option<PendingSelection> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(conversation_id)
    }

    /// Drops every pending selection; used when the workspace changes so
    /// stale candidate indexes cannot be applied to a different roster.
    pub fn clear(&self) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(rolls: &[i64]) -> PendingSelection {
        PendingSelection {
            candidates: rolls.iter().map(|r| (format!("s{r}"), *r)).collect(),
            date_key: DateKey::parse("17-Sep").expect("date"),
            status: MarkState::Present,
        }
    }

    #[test]
    fn take_consumes_the_entry() {
        let sessions = SelectionSessions::new();
        sessions.put("chat-1", pending(&[1, 2]));
        assert!(sessions.take("chat-1").is_some());
        assert!(sessions.take("chat-1").is_none());
    }

    #[test]
    fn conversations_are_independent() {
        let sessions = SelectionSessions::new();
        sessions.put("chat-1", pending(&[1]));
        sessions.put("chat-2", pending(&[2]));
        assert!(sessions.take("chat-3").is_none());
        let one = sessions.take("chat-1").expect("chat-1 pending");
        assert_eq!(one.candidates[0].1, 1);
        assert!(sessions.take("chat-2").is_some());
    }

    #[test]
    fn clear_empties_every_conversation() {
        let sessions = SelectionSessions::new();
        sessions.put("chat-1", pending(&[1]));
        sessions.put("chat-2", pending(&[2]));
        sessions.clear();
        assert!(sessions.take("chat-1").is_none());
        assert!(sessions.take("chat-2").is_none());
    }
}
