//! The conversation transcript: ordered history plus its truncation policy.
//!
//! A [`Transcript`] starts with a single `system` message and only grows by
//! [`append`](Transcript::append), which enforces the tool-call pairing
//! contract:
//!
//! - a `tool` message answers a call issued by the nearest preceding
//!   `assistant` message, at most once;
//! - no `user` or `assistant` message may follow an assistant message whose
//!   tool calls are still unanswered.
//!
//! The two lossy operations are [`truncate`](Transcript::truncate), which
//! drops the oldest non-system messages without ever splitting a
//! call/result group, and [`rollback_last_user_turn`](Transcript::rollback_last_user_turn),
//! which undoes a failed turn.

use crate::error::TranscriptError;
use crate::{Message, MessageRole, ToolCallRequest};
use std::collections::HashSet;

/// Ordered conversation history with an enforced pairing invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Start a transcript with the given system prompt at index 0.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Rebuild a transcript from stored messages, checking every invariant.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, TranscriptError> {
        let transcript = Self { messages };
        transcript.validate()?;
        Ok(transcript)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Number of leading `system` messages.
    pub fn system_count(&self) -> usize {
        self.messages
            .iter()
            .take_while(|m| m.role == MessageRole::System)
            .count()
    }

    /// Ids of tool calls issued by the latest assistant message that have no
    /// result yet, in emission order.
    pub fn pending_tool_calls(&self) -> Vec<&str> {
        let Some(idx) = self
            .messages
            .iter()
            .rposition(|m| m.role == MessageRole::Assistant)
        else {
            return Vec::new();
        };
        let answered: HashSet<&str> = self.messages[idx + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        self.messages[idx]
            .requested_calls()
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Append a message, enforcing the role and pairing rules.
    pub fn append(&mut self, message: Message) -> Result<(), TranscriptError> {
        match message.role {
            MessageRole::System => {
                if !self.messages.is_empty() {
                    return Err(TranscriptError::InvalidMessage(
                        "system message is only allowed at index 0".into(),
                    ));
                }
            }
            MessageRole::Tool => self.check_tool_result(&message)?,
            MessageRole::User | MessageRole::Assistant => {
                let pending = self.pending_tool_calls();
                if !pending.is_empty() {
                    return Err(TranscriptError::UnansweredToolCalls {
                        count: pending.len(),
                        ids: pending.into_iter().map(String::from).collect(),
                    });
                }
                if message.role == MessageRole::Assistant {
                    check_call_ids(message.requested_calls())?;
                } else if message.tool_calls.is_some() {
                    return Err(TranscriptError::InvalidMessage(
                        "only assistant messages may carry tool calls".into(),
                    ));
                }
            }
        }
        self.messages.push(message);
        Ok(())
    }

    fn check_tool_result(&self, message: &Message) -> Result<(), TranscriptError> {
        let Some(id) = message.tool_call_id.as_deref() else {
            return Err(TranscriptError::InvalidMessage(
                "tool message without tool_call_id".into(),
            ));
        };
        let Some(idx) = self
            .messages
            .iter()
            .rposition(|m| m.role == MessageRole::Assistant)
        else {
            return Err(TranscriptError::UnknownToolCallId(id.to_string()));
        };
        if !self.messages[idx].requested_calls().iter().any(|c| c.id == id) {
            return Err(TranscriptError::UnknownToolCallId(id.to_string()));
        }
        if self.messages[idx + 1..]
            .iter()
            .any(|m| m.tool_call_id.as_deref() == Some(id))
        {
            return Err(TranscriptError::DuplicateToolResult(id.to_string()));
        }
        Ok(())
    }

    /// Drop the oldest non-system messages until at most `budget` remain.
    ///
    /// Leading system messages are always kept. If the cut would land on a
    /// `tool` message, the retained window is extended backward to the
    /// assistant message that issued the call, so the result may exceed
    /// `budget` by the size of that group. Returns the number of messages
    /// removed.
    pub fn truncate(&mut self, budget: usize) -> usize {
        let len = self.messages.len();
        if len <= budget {
            return 0;
        }
        let sys = self.system_count();
        let keep = budget.saturating_sub(sys).min(len - sys);
        let mut start = len - keep;
        while start > sys && start < len && self.messages[start].role == MessageRole::Tool {
            start -= 1;
        }
        self.messages.drain(sys..start);
        start - sys
    }

    /// Remove the most recent `user` message and everything appended after
    /// it. Returns the number of messages removed (0 if there is no user
    /// message).
    pub fn rollback_last_user_turn(&mut self) -> usize {
        match self
            .messages
            .iter()
            .rposition(|m| m.role == MessageRole::User)
        {
            Some(idx) => {
                let removed = self.messages.len() - idx;
                self.messages.truncate(idx);
                removed
            }
            None => 0,
        }
    }

    /// Check every structural invariant over the whole history.
    ///
    /// Passes only when the transcript starts with exactly one system
    /// message and every issued tool call has exactly one result before the
    /// next non-tool message.
    pub fn validate(&self) -> Result<(), TranscriptError> {
        match self.messages.first() {
            Some(m) if m.role == MessageRole::System => {}
            _ => {
                return Err(TranscriptError::InvalidMessage(
                    "transcript must start with a system message".into(),
                ));
            }
        }

        let mut pending: Vec<&str> = Vec::new();
        let mut issued: HashSet<&str> = HashSet::new();
        for message in &self.messages[1..] {
            match message.role {
                MessageRole::System => {
                    return Err(TranscriptError::InvalidMessage(
                        "system message is only allowed at index 0".into(),
                    ));
                }
                MessageRole::Tool => {
                    let id = message.tool_call_id.as_deref().ok_or_else(|| {
                        TranscriptError::InvalidMessage("tool message without tool_call_id".into())
                    })?;
                    if let Some(pos) = pending.iter().position(|p| *p == id) {
                        pending.remove(pos);
                    } else if issued.contains(id) {
                        return Err(TranscriptError::DuplicateToolResult(id.to_string()));
                    } else {
                        return Err(TranscriptError::UnknownToolCallId(id.to_string()));
                    }
                }
                MessageRole::User | MessageRole::Assistant => {
                    if !pending.is_empty() {
                        return Err(unanswered(&pending));
                    }
                    check_call_ids(message.requested_calls())?;
                    issued = message.requested_calls().iter().map(|c| c.id.as_str()).collect();
                    pending = message.requested_calls().iter().map(|c| c.id.as_str()).collect();
                }
            }
        }
        if !pending.is_empty() {
            return Err(unanswered(&pending));
        }
        Ok(())
    }
}

fn unanswered(pending: &[&str]) -> TranscriptError {
    TranscriptError::UnansweredToolCalls {
        count: pending.len(),
        ids: pending.iter().map(|s| s.to_string()).collect(),
    }
}

/// Tool-call ids within one assistant message must be present and unique.
pub(crate) fn check_call_ids(calls: &[ToolCallRequest]) -> Result<(), TranscriptError> {
    let mut seen = HashSet::new();
    for call in calls {
        if call.id.trim().is_empty() {
            return Err(TranscriptError::InvalidMessage("tool call without id".into()));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(TranscriptError::InvalidMessage(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, "get_weather", &json!({"location": "Delhi"}))
    }

    /// Append one full tool-using turn: user, assistant with `n` calls, `n`
    /// tool results, final assistant.
    fn push_tool_turn(t: &mut Transcript, turn: usize, n: usize) {
        t.append(Message::user(format!("question {turn}"))).unwrap();
        let calls: Vec<_> = (0..n).map(|i| call(&format!("t{turn}c{i}"))).collect();
        t.append(Message::assistant_tool_calls(None, calls)).unwrap();
        for i in 0..n {
            t.append(Message::tool_result(format!("t{turn}c{i}"), "get_weather", "Sunny"))
                .unwrap();
        }
        t.append(Message::assistant_text(format!("answer {turn}"))).unwrap();
    }

    fn push_plain_turn(t: &mut Transcript, turn: usize) {
        t.append(Message::user(format!("hello {turn}"))).unwrap();
        t.append(Message::assistant_text(format!("hi {turn}"))).unwrap();
    }

    /// No tool result survives without the assistant message that issued it.
    fn assert_no_split_pairs(t: &Transcript) {
        for (i, m) in t.messages().iter().enumerate() {
            if m.role != MessageRole::Tool {
                continue;
            }
            let id = m.tool_call_id.as_deref().unwrap();
            let issuer = t.messages()[..i]
                .iter()
                .rposition(|p| p.role == MessageRole::Assistant)
                .unwrap_or_else(|| panic!("tool result {id} has no assistant before it"));
            assert!(
                t.messages()[issuer].requested_calls().iter().any(|c| c.id == id),
                "tool result {id} separated from its call"
            );
        }
        for (i, m) in t.messages().iter().enumerate() {
            for c in m.requested_calls() {
                assert!(
                    t.messages()[i + 1..]
                        .iter()
                        .any(|r| r.tool_call_id.as_deref() == Some(c.id.as_str())),
                    "call {} lost its result",
                    c.id
                );
            }
        }
    }

    #[test]
    fn starts_with_single_system_message() {
        let t = Transcript::new("You are helpful.");
        assert_eq!(t.len(), 1);
        assert_eq!(t.system_count(), 1);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn second_system_message_rejected() {
        let mut t = Transcript::new("sys");
        let err = t.append(Message::system("again")).unwrap_err();
        assert!(matches!(err, TranscriptError::InvalidMessage(_)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn tool_message_must_reference_issued_call() {
        let mut t = Transcript::new("sys");
        t.append(Message::user("hi")).unwrap();
        let err = t
            .append(Message::tool_result("nope", "get_weather", "x"))
            .unwrap_err();
        assert_eq!(err, TranscriptError::UnknownToolCallId("nope".into()));

        t.append(Message::assistant_tool_calls(None, vec![call("c1")])).unwrap();
        let err = t
            .append(Message::tool_result("c2", "get_weather", "x"))
            .unwrap_err();
        assert_eq!(err, TranscriptError::UnknownToolCallId("c2".into()));

        t.append(Message::tool_result("c1", "get_weather", "x")).unwrap();
        let err = t
            .append(Message::tool_result("c1", "get_weather", "x"))
            .unwrap_err();
        assert_eq!(err, TranscriptError::DuplicateToolResult("c1".into()));
    }

    #[test]
    fn unanswered_calls_block_next_message() {
        let mut t = Transcript::new("sys");
        t.append(Message::user("hi")).unwrap();
        t.append(Message::assistant_tool_calls(None, vec![call("a"), call("b")]))
            .unwrap();
        t.append(Message::tool_result("a", "get_weather", "x")).unwrap();
        assert_eq!(t.pending_tool_calls(), vec!["b"]);

        let err = t.append(Message::assistant_text("done")).unwrap_err();
        assert_eq!(
            err,
            TranscriptError::UnansweredToolCalls {
                count: 1,
                ids: vec!["b".into()]
            }
        );
        assert!(t.validate().is_err());

        t.append(Message::tool_result("b", "get_weather", "y")).unwrap();
        t.append(Message::assistant_text("done")).unwrap();
        assert!(t.validate().is_ok());
    }

    #[test]
    fn duplicate_call_ids_rejected() {
        let mut t = Transcript::new("sys");
        t.append(Message::user("hi")).unwrap();
        let err = t
            .append(Message::assistant_tool_calls(None, vec![call("a"), call("a")]))
            .unwrap_err();
        assert!(matches!(err, TranscriptError::InvalidMessage(_)));
    }

    #[test]
    fn truncate_under_budget_is_noop() {
        let mut t = Transcript::new("sys");
        push_plain_turn(&mut t, 0);
        let before = t.clone();
        assert_eq!(t.truncate(10), 0);
        assert_eq!(t, before);
    }

    #[test]
    fn truncate_keeps_system_and_most_recent() {
        let mut t = Transcript::new("sys");
        for turn in 0..10 {
            push_plain_turn(&mut t, turn);
        }
        assert_eq!(t.len(), 21);

        let removed = t.truncate(5);
        assert_eq!(removed, 16);
        assert_eq!(t.len(), 5);
        assert_eq!(t.messages()[0].role, MessageRole::System);
        assert_eq!(t.messages()[1].content.as_deref(), Some("hello 8"));
        assert_eq!(t.last().unwrap().content.as_deref(), Some("hi 9"));
    }

    #[test]
    fn fifty_one_messages_truncated_to_fifty() {
        let mut t = Transcript::new("sys");
        for turn in 0..12 {
            push_tool_turn(&mut t, turn, 1);
        }
        push_plain_turn(&mut t, 12);
        assert_eq!(t.len(), 51);

        t.truncate(50);
        assert!(t.len() <= 50);
        assert_eq!(t.system_count(), 1);
        assert_eq!(t.messages()[0].content.as_deref(), Some("sys"));
        assert_no_split_pairs(&t);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn boundary_on_tool_result_extends_window_backward() {
        let mut t = Transcript::new("sys");
        push_plain_turn(&mut t, 0);
        // [1] user, [2] assistant, [3] user, [4] assistant(calls), [5] tool, [6] tool, [7] assistant
        push_tool_turn(&mut t, 1, 2);
        assert_eq!(t.len(), 8);

        // Keeping the last 3 non-system messages would start at [5], a tool result.
        let removed = t.truncate(4);
        assert_eq!(removed, 3);
        assert_eq!(t.len(), 5);
        assert_eq!(t.messages()[1].requested_calls().len(), 2);
        assert_no_split_pairs(&t);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn truncation_never_splits_a_pair_for_any_budget() {
        let mut t = Transcript::new("sys");
        for turn in 0..15 {
            match turn % 3 {
                0 => push_plain_turn(&mut t, turn),
                1 => push_tool_turn(&mut t, turn, 1),
                _ => push_tool_turn(&mut t, turn, 3),
            }
        }
        let full = t.clone();
        for budget in 0..=full.len() + 1 {
            let mut t = full.clone();
            t.truncate(budget);
            assert_eq!(t.system_count(), 1, "budget {budget}");
            assert_no_split_pairs(&t);
            assert!(t.validate().is_ok(), "budget {budget}");
            // Retained messages are a suffix of the original, in order.
            let tail = &full.messages()[full.len() - (t.len() - 1)..];
            assert_eq!(&t.messages()[1..], tail, "budget {budget}");
        }
    }

    #[test]
    fn budget_below_system_count_keeps_only_system() {
        let mut t = Transcript::new("sys");
        push_plain_turn(&mut t, 0);
        t.truncate(0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0].role, MessageRole::System);
    }

    #[test]
    fn rollback_removes_partial_turn() {
        let mut t = Transcript::new("sys");
        push_tool_turn(&mut t, 0, 1);
        let before = t.clone();

        t.append(Message::user("weather?")).unwrap();
        t.append(Message::assistant_tool_calls(None, vec![call("x")])).unwrap();
        t.append(Message::tool_result("x", "get_weather", "Rainy")).unwrap();

        assert_eq!(t.rollback_last_user_turn(), 3);
        assert_eq!(t, before);
    }

    #[test]
    fn rollback_without_user_message_is_noop() {
        let mut t = Transcript::new("sys");
        assert_eq!(t.rollback_last_user_turn(), 0);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn from_messages_validates() {
        let mut t = Transcript::new("sys");
        push_tool_turn(&mut t, 0, 2);
        let rebuilt = Transcript::from_messages(t.messages().to_vec()).unwrap();
        assert_eq!(rebuilt, t);

        let orphan = vec![
            Message::system("sys"),
            Message::tool_result("c1", "get_weather", "x"),
        ];
        assert!(Transcript::from_messages(orphan).is_err());
        assert!(Transcript::from_messages(vec![Message::user("hi")]).is_err());
    }
}
