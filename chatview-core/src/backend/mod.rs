use std::env;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use dirs::data_dir;
use serde_json::Value;

use crate::error::{ChatviewError, Result};

pub mod http;
pub mod local;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ChatBackend: Send + Sync {
    // `{ "history": [conversation id, ...] }`
    async fn list_history(&self) -> Result<Value>;

    // `{ "chat_history": [{ "user": ..., "bot": ... }, ...] }`
    async fn fetch_conversation(&self, conversation_id: &str) -> Result<Value>;

    // `{ "response": text | { label: text } }`
    async fn query(&self, message: &str) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub transcript_dir: PathBuf,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        // Precedence:
        // 1) CHATVIEW_BASE_URL
        // 2) http://127.0.0.1:8000
        let base_url = env::var("CHATVIEW_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // Precedence:
        // 1) CHATVIEW_TIMEOUT_SECS
        // 2) 30 seconds
        let timeout = match env::var("CHATVIEW_TIMEOUT_SECS") {
            Ok(raw) if !raw.trim().is_empty() => parse_timeout_secs(&raw)?,
            _ => DEFAULT_TIMEOUT,
        };

        // Precedence:
        // 1) CHATVIEW_LOG_DIR
        // 2) <data dir>/chatview/chat_logs
        // 3) ./chat_logs
        let transcript_dir = env::var_os("CHATVIEW_LOG_DIR")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .or_else(|| data_dir().map(|dir| dir.join("chatview/chat_logs")))
            .unwrap_or_else(|| PathBuf::from("chat_logs"));

        Self {
            base_url,
            timeout,
            transcript_dir,
        }
        .validated()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        self.base_url = base_url.into();
        self.validated()
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self> {
        if secs == 0 {
            return Err(ChatviewError::InvalidConfig(
                "timeout must be at least one second".to_string(),
            ));
        }
        self.timeout = Duration::from_secs(secs);
        Ok(self)
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = dir.into();
        self
    }

    fn validated(mut self) -> Result<Self> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ChatviewError::InvalidConfig(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }
}

fn parse_timeout_secs(raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ChatviewError::InvalidConfig(format!(
            "CHATVIEW_TIMEOUT_SECS must be a positive integer: {raw}"
        ))),
    }
}
