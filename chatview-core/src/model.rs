use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{ChatviewError, Result};

const NO_ANSWER: &str = "No answer found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub transient_url: String,
}

/// User content is plain text and must be displayed as text. Assistant
/// content is sanitized markup and may be injected as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMessage {
    pub id: String,
    pub content: String,
    pub sender: MessageRole,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl DisplayMessage {
    pub fn new(id: impl Into<String>, sender: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawTurnRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
}

impl RawTurnRecord {
    pub fn new(user: impl Into<String>, bot: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            bot: Some(bot.into()),
        }
    }

    pub fn user_text(&self) -> Option<&str> {
        non_blank(self.user.as_deref())
    }

    pub fn bot_text(&self) -> Option<&str> {
        non_blank(self.bot.as_deref())
    }

    pub fn is_blank(&self) -> bool {
        self.user_text().is_none() && self.bot_text().is_none()
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    Text(String),
    Mapping(Vec<(String, String)>),
}

impl AssistantReply {
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let Some(object) = payload.as_object() else {
            return Err(ChatviewError::InvalidResponse(
                "payload is not a json object".to_string(),
            ));
        };

        match object.get("response") {
            None | Some(Value::Null) => Ok(Self::Text(NO_ANSWER.to_string())),
            Some(Value::String(text)) if text.is_empty() => Ok(Self::Text(NO_ANSWER.to_string())),
            Some(Value::String(text)) => Ok(Self::Text(text.clone())),
            Some(Value::Object(entries)) => Ok(Self::Mapping(
                entries
                    .iter()
                    .map(|(label, value)| (label.clone(), value_text(value)))
                    .collect(),
            )),
            Some(Value::Array(_)) => Err(ChatviewError::InvalidResponse(
                "response is an array".to_string(),
            )),
            Some(other) => Ok(Self::Text(other.to_string())),
        }
    }

    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Mapping(entries) => entries
                .iter()
                .map(|(label, value)| format!("{label}: {value}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: Option<NaiveDateTime>,
}
