use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatviewError {
    #[error("transport failure on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} timed out after {}s", .timeout.as_secs())]
    Timeout { endpoint: String, timeout: Duration },

    #[error("{endpoint} returned http status {status}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("invalid history format: {0}")]
    InvalidHistoryFormat(String),

    #[error("invalid assistant response: {0}")]
    InvalidResponse(String),

    #[error("invalid conversation id: {0}")]
    InvalidConversationId(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("background task failed: {0}")]
    BackgroundTask(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("conversation not found: id={id} dir={dir}")]
    ConversationNotFound { id: String, dir: PathBuf },

    #[error("transcript file is empty: {path}")]
    EmptyTranscriptFile { path: PathBuf },

    #[error("transcript file is not valid UTF-8: {path}")]
    NonUtf8TranscriptFile { path: PathBuf },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ChatviewError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::HttpStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChatviewError>;
