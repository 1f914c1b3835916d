use serde::Serialize;

use crate::error::{ChatviewError, Result};
use crate::model::{ConversationSummary, DisplayMessage, MessageRole};

pub fn render_timeline_markdown(conversation_id: Option<&str>, messages: &[DisplayMessage]) -> String {
    let mut output = String::new();
    output.push_str("# Conversation\n\n");
    if let Some(id) = conversation_id {
        output.push_str(&format!("- Id: `{id}`\n"));
    }
    output.push_str(&format!("- Messages: {}\n\n", messages.len()));

    if messages.is_empty() {
        output.push_str("_No messages._\n");
        return output;
    }

    for (idx, message) in messages.iter().enumerate() {
        let title = match message.sender {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        };
        output.push_str(&format!("## {}. {}\n\n", idx + 1, title));
        output.push_str(message.content.trim());
        for attachment in &message.attachments {
            output.push_str(&format!(
                "\n\n- Attachment: `{}` ({})",
                attachment.name, attachment.mime_type
            ));
        }
        output.push_str("\n\n");
    }

    output
}

pub fn render_listing_markdown(summaries: &[ConversationSummary]) -> String {
    let mut output = String::new();
    output.push_str("# Conversations\n\n");

    if summaries.is_empty() {
        output.push_str("_No conversations found._\n");
        return output;
    }

    for summary in summaries {
        match summary.created_at {
            Some(created_at) => output.push_str(&format!(
                "- {} (`{}`, {})\n",
                summary.title,
                summary.id,
                created_at.format("%Y-%m-%d %H:%M:%S")
            )),
            None => output.push_str(&format!("- {} (`{}`)\n", summary.title, summary.id)),
        }
    }

    output
}

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|err| ChatviewError::Serialization(err.to_string()))
}
