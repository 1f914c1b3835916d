use std::cmp::Reverse;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{ChatviewError, Result};
use crate::format::format_response;
use crate::model::{ConversationSummary, DisplayMessage, MessageRole, RawTurnRecord};
use crate::sanitize::sanitize;

static CREATED_AT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d{8})_?(\d{6})").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    messages: Vec<DisplayMessage>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: DisplayMessage) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn replace(&mut self, messages: Vec<DisplayMessage>) {
        self.messages = messages;
    }
}

impl From<Vec<DisplayMessage>> for Timeline {
    fn from(messages: Vec<DisplayMessage>) -> Self {
        Self { messages }
    }
}

pub fn render_bot_text(raw: &str) -> String {
    sanitize(&format_response(raw))
}

// Non-string fields are absent; non-object entries become blank records.
pub fn parse_history_payload(payload: &Value) -> Result<Vec<RawTurnRecord>> {
    let Some(entries) = payload.get("chat_history") else {
        return Err(ChatviewError::InvalidHistoryFormat(
            "missing chat_history".to_string(),
        ));
    };
    let Some(entries) = entries.as_array() else {
        return Err(ChatviewError::InvalidHistoryFormat(
            "chat_history is not an array".to_string(),
        ));
    };

    Ok(entries.iter().map(normalize_record).collect())
}

fn normalize_record(entry: &Value) -> RawTurnRecord {
    let field = |name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .map(ToString::to_string)
    };

    RawTurnRecord {
        user: field("user"),
        bot: field("bot"),
    }
}

/// Rebuilds the display timeline of one conversation. Within a record the
/// user message always comes first; blank fields produce nothing.
pub fn replay(conversation_id: &str, records: &[RawTurnRecord]) -> Vec<DisplayMessage> {
    let mut messages = Vec::with_capacity(records.len() * 2);

    for (idx, record) in records.iter().enumerate() {
        if let Some(user) = record.user_text() {
            messages.push(DisplayMessage::new(
                format!("{conversation_id}-user-{idx}"),
                MessageRole::User,
                user,
            ));
        }

        if let Some(bot) = record.bot_text() {
            messages.push(DisplayMessage::new(
                format!("{conversation_id}-bot-{idx}"),
                MessageRole::Assistant,
                render_bot_text(bot),
            ));
        }
    }

    messages
}

/// Replaces `timeline` with the replayed conversation. On error the timeline
/// is left exactly as it was.
pub fn load_history(
    timeline: &mut Timeline,
    conversation_id: &str,
    payload: &Value,
) -> Result<usize> {
    let records = parse_history_payload(payload)?;
    let messages = replay(conversation_id, &records);
    let count = messages.len();

    debug!(
        conversation_id,
        records = records.len(),
        messages = count,
        "replayed conversation"
    );
    timeline.replace(messages);
    Ok(count)
}

pub fn parse_history_listing(payload: &Value) -> Result<Vec<ConversationSummary>> {
    let Some(ids) = payload.get("history").and_then(Value::as_array) else {
        return Err(ChatviewError::InvalidHistoryFormat(
            "missing history list".to_string(),
        ));
    };

    let mut summaries = ids
        .iter()
        .filter_map(Value::as_str)
        .map(conversation_summary)
        .collect::<Vec<_>>();
    summaries.sort_by_key(|summary| Reverse(summary.created_at));
    Ok(summaries)
}

pub fn conversation_summary(id: &str) -> ConversationSummary {
    ConversationSummary {
        id: id.to_string(),
        title: format!("Chat - {id}"),
        created_at: parse_created_at(id),
    }
}

/// Extracts the `_YYYYMMDD_HHMMSS` (or `_YYYYMMDDHHMMSS`) stamp of an id.
pub fn parse_created_at(id: &str) -> Option<NaiveDateTime> {
    let caps = CREATED_AT_RE.captures(id)?;
    let stamp = format!("{}{}", &caps[1], &caps[2]);
    NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S").ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::history::{
        Timeline, load_history, parse_created_at, parse_history_listing, parse_history_payload,
        replay,
    };
    use crate::model::{DisplayMessage, MessageRole, RawTurnRecord};

    #[test]
    fn replay_orders_user_before_bot_per_turn() {
        let records = vec![
            RawTurnRecord::new("first question", "first answer"),
            RawTurnRecord {
                user: None,
                bot: Some("bot only".to_string()),
            },
            RawTurnRecord::new("second question", "second answer"),
        ];

        let messages = replay("TE1_20250101_120000.txt", &records);
        let ids = messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                "TE1_20250101_120000.txt-user-0",
                "TE1_20250101_120000.txt-bot-0",
                "TE1_20250101_120000.txt-bot-1",
                "TE1_20250101_120000.txt-user-2",
                "TE1_20250101_120000.txt-bot-2",
            ]
        );
        assert_eq!(messages[0].sender, MessageRole::User);
        assert_eq!(messages[1].sender, MessageRole::Assistant);
    }

    #[test]
    fn blank_record_contributes_nothing() {
        let messages = replay("c", &[RawTurnRecord::new("", "  ")]);
        assert!(messages.is_empty());
    }

    #[test]
    fn user_text_is_kept_verbatim_and_bot_text_is_rendered() {
        let records = vec![RawTurnRecord::new(
            "<b>raw</b> user: text",
            "**Total**: 3 - see [site](https://example.com)<script>x()</script>",
        )];

        let messages = replay("c", &records);
        assert_eq!(messages[0].content, "<b>raw</b> user: text");
        assert_eq!(
            messages[1].content,
            "\n**Total**\n:\n3\n- see <a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"text-blue-500 hover:underline\">site</a>"
        );
    }

    #[test]
    fn link_with_quote_cannot_inject_attributes() {
        let records = vec![RawTurnRecord {
            user: None,
            bot: Some("[x](https://a.com\" onmouseover=\"alert)".to_string()),
        }];

        let messages = replay("c", &records);
        assert!(messages[0].content.starts_with("<a href=\"https://a.com\" target=\"_blank\""));
        assert!(!messages[0].content.contains("onmouseover"));
    }

    #[test]
    fn malformed_fields_are_coerced_to_blank() {
        let payload = json!({"chat_history": [
            {"user": 42, "bot": "answer"},
            {"user": "question", "bot": {"nested": true}},
            "not a record",
            {"user": null}
        ]});

        let records = parse_history_payload(&payload).expect("parse");
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].user, None);
        assert_eq!(records[0].bot.as_deref(), Some("answer"));
        assert_eq!(records[1].bot, None);
        assert!(records[2].is_blank());
        assert!(records[3].is_blank());
    }

    #[test]
    fn invalid_history_leaves_timeline_unchanged() {
        let mut timeline = Timeline::new();
        timeline.push(DisplayMessage::new("keep", MessageRole::User, "still here"));
        let before = timeline.clone();

        for payload in [json!({"foo": 1}), json!({"chat_history": "nope"}), json!([1, 2])] {
            let err = load_history(&mut timeline, "c", &payload).expect_err("must fail");
            assert!(format!("{err}").contains("invalid history format"));
            assert_eq!(timeline, before);
        }
    }

    #[test]
    fn load_history_replaces_timeline() {
        let mut timeline = Timeline::new();
        timeline.push(DisplayMessage::new("old", MessageRole::User, "old"));

        let payload = json!({"chat_history": [{"user": "hi", "bot": "hello"}]});
        let count = load_history(&mut timeline, "c", &payload).expect("load");

        assert_eq!(count, 2);
        assert_eq!(timeline.messages()[0].id, "c-user-0");
        assert_eq!(timeline.messages()[1].id, "c-bot-0");
    }

    #[test]
    fn listing_sorts_most_recent_first() {
        let payload = json!({"history": [
            "TE1_20250101_090000.txt",
            "notes.txt",
            "TE3_20250301_080000.txt",
            7,
            "TE2_20250201123000.txt"
        ]});

        let summaries = parse_history_listing(&payload).expect("parse");
        let ids = summaries.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                "TE3_20250301_080000.txt",
                "TE2_20250201123000.txt",
                "TE1_20250101_090000.txt",
                "notes.txt",
            ]
        );
        assert_eq!(summaries[0].title, "Chat - TE3_20250301_080000.txt");
        assert!(summaries[3].created_at.is_none());
    }

    #[test]
    fn listing_without_history_key_is_invalid() {
        let err = parse_history_listing(&json!({"items": []})).expect_err("must fail");
        assert!(format!("{err}").contains("invalid history format"));
    }

    #[test]
    fn created_at_rejects_impossible_dates() {
        assert!(parse_created_at("TE1_20251341_250000.txt").is_none());
        let parsed = parse_created_at("TE1_20250102_030405.txt").expect("parse");
        assert_eq!(parsed.to_string(), "2025-01-02 03:04:05");
    }
}
