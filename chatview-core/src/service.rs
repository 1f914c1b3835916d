use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::ChatBackend;
use crate::error::Result;
use crate::history::{Timeline, load_history, parse_history_listing, render_bot_text};
use crate::model::{
    AssistantReply, Attachment, ConversationSummary, DisplayMessage, MessageRole, RawTurnRecord,
};

pub const FALLBACK_REPLY: &str = "Oops! Something went wrong. Please try again later.";
pub const WELCOME_MESSAGE: &str =
    "Hello! I'm ready to help you with a new conversation. What would you like to discuss today?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Both messages were appended. `record` holds the exchange as it would
    /// be persisted; `bot` is `None` when the fallback reply was shown.
    Delivered { record: RawTurnRecord },
    Busy,
    Ignored,
}

#[derive(Debug)]
pub struct SendPermit<'a> {
    sending: &'a AtomicBool,
}

impl Drop for SendPermit<'_> {
    fn drop(&mut self) {
        self.sending.store(false, Ordering::Release);
    }
}

pub struct ChatService {
    backend: Arc<dyn ChatBackend>,
    sending: AtomicBool,
}

impl ChatService {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            sending: AtomicBool::new(false),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn try_begin_send(&self) -> Option<SendPermit<'_>> {
        self.sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SendPermit {
                sending: &self.sending,
            })
    }

    /// Appends the user message and the assistant's reply to `timeline`.
    /// Never fails: an unreachable or misbehaving service yields
    /// [`FALLBACK_REPLY`].
    pub async fn send(&self, timeline: &mut Timeline, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_permit) = self.try_begin_send() else {
            debug!("send ignored while another is in flight");
            return SendOutcome::Busy;
        };

        timeline.push(DisplayMessage::new(
            live_message_id(MessageRole::User),
            MessageRole::User,
            text,
        ));

        let (content, raw_reply) = self.answer(text).await;
        timeline.push(DisplayMessage::new(
            live_message_id(MessageRole::Assistant),
            MessageRole::Assistant,
            content,
        ));

        SendOutcome::Delivered {
            record: RawTurnRecord {
                user: Some(text.to_string()),
                bot: raw_reply,
            },
        }
    }

    pub async fn ask(&self, message: &str) -> String {
        self.answer(message).await.0
    }

    async fn answer(&self, message: &str) -> (String, Option<String>) {
        match self.query_reply(message).await {
            Ok(reply) => {
                let raw = reply.flatten();
                (render_bot_text(&raw), Some(raw))
            }
            Err(err) => {
                warn!(error = %err, transport = err.is_transport(), "assistant query failed");
                (FALLBACK_REPLY.to_string(), None)
            }
        }
    }

    async fn query_reply(&self, message: &str) -> Result<AssistantReply> {
        let payload = self.backend.query(message).await?;
        AssistantReply::from_payload(&payload)
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let payload = self
            .backend
            .list_history()
            .await
            .inspect_err(|err| warn!(error = %err, "failed to fetch conversation list"))?;
        parse_history_listing(&payload)
            .inspect_err(|err| warn!(error = %err, "unusable conversation list"))
    }

    // On any failure the timeline is left untouched.
    pub async fn open_conversation(
        &self,
        timeline: &mut Timeline,
        conversation_id: &str,
    ) -> Result<usize> {
        let payload = self
            .backend
            .fetch_conversation(conversation_id)
            .await
            .inspect_err(|err| {
                warn!(conversation_id, error = %err, "failed to fetch conversation");
            })?;

        load_history(timeline, conversation_id, &payload).inspect_err(|err| {
            warn!(conversation_id, error = %err, "failed to replay conversation");
        })
    }
}

fn live_message_id(role: MessageRole) -> String {
    format!("live-{role}-{}", Uuid::new_v4())
}

pub fn start_new_chat(timeline: &mut Timeline) {
    timeline.clear();
    timeline.push(DisplayMessage::new(
        "welcome-new",
        MessageRole::Assistant,
        WELCOME_MESSAGE,
    ));
}

pub fn attach_file(timeline: &mut Timeline, attachment: Attachment) {
    let mut message = DisplayMessage::new(
        live_message_id(MessageRole::User),
        MessageRole::User,
        format!("Uploaded: {}", attachment.name),
    );
    message.attachments.push(attachment);
    timeline.push(message);
}

pub fn forget_conversation(listing: &mut Vec<ConversationSummary>, conversation_id: &str) -> bool {
    let before = listing.len();
    listing.retain(|summary| summary.id != conversation_id);
    listing.len() != before
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::backend::ChatBackend;
    use crate::error::{ChatviewError, Result};
    use crate::history::{Timeline, conversation_summary};
    use crate::model::{Attachment, DisplayMessage, MessageRole};
    use crate::service::{
        ChatService, FALLBACK_REPLY, SendOutcome, WELCOME_MESSAGE, attach_file,
        forget_conversation, start_new_chat,
    };

    /// Canned payloads; `None` answers like a server returning 503.
    #[derive(Default)]
    struct MockBackend {
        history: Option<Value>,
        conversation: Option<Value>,
        reply: Option<Value>,
    }

    fn unavailable(endpoint: &str) -> ChatviewError {
        ChatviewError::HttpStatus {
            endpoint: endpoint.to_string(),
            status: 503,
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn list_history(&self) -> Result<Value> {
            self.history.clone().ok_or_else(|| unavailable("chat_history"))
        }

        async fn fetch_conversation(&self, _conversation_id: &str) -> Result<Value> {
            self.conversation
                .clone()
                .ok_or_else(|| unavailable("chat_content"))
        }

        async fn query(&self, _message: &str) -> Result<Value> {
            self.reply.clone().ok_or_else(|| unavailable("orch_agent"))
        }
    }

    fn service(backend: MockBackend) -> ChatService {
        ChatService::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn transport_failure_resolves_to_fallback() {
        let service = service(MockBackend::default());
        let mut timeline = Timeline::new();

        let outcome = service.send(&mut timeline, "hello").await;

        let SendOutcome::Delivered { record } = outcome else {
            panic!("expected delivery, got {outcome:?}");
        };
        assert_eq!(record.user.as_deref(), Some("hello"));
        assert_eq!(record.bot, None);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.messages()[0].sender, MessageRole::User);
        assert_eq!(timeline.messages()[1].content, FALLBACK_REPLY);
        assert!(!service.is_sending());
    }

    #[tokio::test]
    async fn malformed_reply_resolves_to_fallback() {
        let service = service(MockBackend {
            reply: Some(json!(["unexpected"])),
            ..MockBackend::default()
        });
        assert_eq!(service.ask("hi").await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn mapping_reply_is_flattened_then_formatted() {
        let service = service(MockBackend {
            reply: Some(json!({"response": {"Status": "open", "Link": "[docs](https://x.io)"}})),
            ..MockBackend::default()
        });

        let mut timeline = Timeline::new();
        let outcome = service.send(&mut timeline, "status?").await;

        assert_eq!(
            timeline.messages()[1].content,
            "Status:\nopen\nLink:\n<a href=\"https://x.io\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"text-blue-500 hover:underline\">docs</a>"
        );
        let SendOutcome::Delivered { record } = outcome else {
            panic!("expected delivery");
        };
        assert_eq!(
            record.bot.as_deref(),
            Some("Status: open\nLink: [docs](https://x.io)")
        );
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let service = service(MockBackend::default());
        let mut timeline = Timeline::new();
        assert_eq!(service.send(&mut timeline, "   ").await, SendOutcome::Ignored);
        assert!(timeline.is_empty());
    }

    #[tokio::test]
    async fn second_send_while_pending_is_a_no_op() {
        let service = service(MockBackend {
            reply: Some(json!({"response": "ok"})),
            ..MockBackend::default()
        });
        let mut timeline = Timeline::new();

        let permit = service.try_begin_send().expect("first permit");
        assert!(service.try_begin_send().is_none());
        assert_eq!(service.send(&mut timeline, "again").await, SendOutcome::Busy);
        assert!(timeline.is_empty());

        drop(permit);
        assert!(matches!(
            service.send(&mut timeline, "again").await,
            SendOutcome::Delivered { .. }
        ));
        assert_eq!(timeline.len(), 2);
    }

    #[tokio::test]
    async fn failed_open_leaves_timeline_unchanged() {
        let mut timeline = Timeline::new();
        timeline.push(DisplayMessage::new("keep", MessageRole::User, "current"));
        let before = timeline.clone();

        let unreachable = service(MockBackend::default());
        let err = unreachable
            .open_conversation(&mut timeline, "c")
            .await
            .expect_err("must fail");
        assert!(err.is_transport());
        assert_eq!(timeline, before);

        let malformed = service(MockBackend {
            conversation: Some(json!({"foo": 1})),
            ..MockBackend::default()
        });
        let err = malformed
            .open_conversation(&mut timeline, "c")
            .await
            .expect_err("must fail");
        assert!(matches!(err, ChatviewError::InvalidHistoryFormat(_)));
        assert_eq!(timeline, before);
    }

    #[tokio::test]
    async fn open_replays_conversation() {
        let service = service(MockBackend {
            conversation: Some(json!({"chat_history": [
                {"user": "q1", "bot": "a1"},
                {"user": "", "bot": " "},
                {"user": "q2"}
            ]})),
            ..MockBackend::default()
        });
        let mut timeline = Timeline::new();

        let count = service
            .open_conversation(&mut timeline, "TE1")
            .await
            .expect("open");
        assert_eq!(count, 3);
        let ids = timeline
            .messages()
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["TE1-user-0", "TE1-bot-0", "TE1-user-2"]);
    }

    #[tokio::test]
    async fn lists_conversations_newest_first() {
        let service = service(MockBackend {
            history: Some(json!({"history": [
                "TE1_20250101_000000.txt",
                "TE2_20250601_000000.txt"
            ]})),
            ..MockBackend::default()
        });

        let listing = service.list_conversations().await.expect("list");
        assert_eq!(listing[0].id, "TE2_20250601_000000.txt");
    }

    #[test]
    fn new_chat_resets_to_welcome() {
        let mut timeline = Timeline::new();
        timeline.push(DisplayMessage::new("old", MessageRole::User, "old"));

        start_new_chat(&mut timeline);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.messages()[0].content, WELCOME_MESSAGE);
        assert_eq!(timeline.messages()[0].sender, MessageRole::Assistant);
    }

    #[test]
    fn attachment_is_owned_by_its_message() {
        let mut timeline = Timeline::new();
        attach_file(
            &mut timeline,
            Attachment {
                name: "report.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                transient_url: "blob:local/1".to_string(),
            },
        );

        let message = &timeline.messages()[0];
        assert_eq!(message.content, "Uploaded: report.pdf");
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.sender, MessageRole::User);
    }

    #[test]
    fn forget_removes_listing_entry() {
        let mut listing = vec![conversation_summary("a"), conversation_summary("b")];
        assert!(forget_conversation(&mut listing, "a"));
        assert!(!forget_conversation(&mut listing, "a"));
        assert_eq!(listing.len(), 1);
    }
}
