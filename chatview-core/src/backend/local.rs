use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::task;

use crate::backend::ChatBackend;
use crate::error::{ChatviewError, Result};
use crate::model::RawTurnRecord;
use crate::transcript::{list_transcripts, read_transcript, validate_conversation_id};

#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|err| ChatviewError::BackgroundTask(err.to_string()))?
}

fn load_conversation(root: PathBuf, conversation_id: String) -> Result<Vec<RawTurnRecord>> {
    let path = root.join(&conversation_id);
    if !path.is_file() {
        return Err(ChatviewError::ConversationNotFound {
            id: conversation_id,
            dir: root,
        });
    }
    read_transcript(&path)
}

#[async_trait]
impl ChatBackend for LocalBackend {
    async fn list_history(&self) -> Result<Value> {
        let root = self.root.clone();
        let names = run_blocking(move || list_transcripts(&root)).await?;
        Ok(json!({ "history": names }))
    }

    async fn fetch_conversation(&self, conversation_id: &str) -> Result<Value> {
        validate_conversation_id(conversation_id)?;

        let root = self.root.clone();
        let id = conversation_id.to_string();
        let records = run_blocking(move || load_conversation(root, id)).await?;

        let chat_history = serde_json::to_value(records)
            .map_err(|err| ChatviewError::Serialization(err.to_string()))?;
        Ok(json!({ "filename": conversation_id, "chat_history": chat_history }))
    }

    async fn query(&self, _message: &str) -> Result<Value> {
        Err(ChatviewError::Unsupported(
            "local transcripts cannot answer queries".to_string(),
        ))
    }
}
