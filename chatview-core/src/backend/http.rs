use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::backend::{BackendConfig, ChatBackend};
use crate::error::{ChatviewError, Result};

const HISTORY_ENDPOINT: &str = "chat_history";
const CONTENT_ENDPOINT: &str = "chat_content";
const QUERY_ENDPOINT: &str = "orch_agent";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ChatviewError::InvalidConfig(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    async fn send_json(&self, endpoint: &str, request: RequestBuilder) -> Result<Value> {
        debug!(endpoint, base_url = %self.base_url, "sending request");

        let response = request
            .send()
            .await
            .map_err(|err| self.transport_error(endpoint, err))?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint, status = status.as_u16(), "request failed");
            return Err(ChatviewError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|err| {
            if err.is_decode() {
                ChatviewError::InvalidResponse(format!("{endpoint} returned invalid json: {err}"))
            } else {
                self.transport_error(endpoint, err)
            }
        })
    }

    fn transport_error(&self, endpoint: &str, source: reqwest::Error) -> ChatviewError {
        if source.is_timeout() {
            ChatviewError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            }
        } else {
            ChatviewError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }
}

// A body that is not json at all is as unusable as one with the wrong shape.
fn as_history_error(err: ChatviewError) -> ChatviewError {
    match err {
        ChatviewError::InvalidResponse(detail) => ChatviewError::InvalidHistoryFormat(detail),
        other => other,
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn list_history(&self) -> Result<Value> {
        let request = self.client.get(self.url(HISTORY_ENDPOINT));
        self.send_json(HISTORY_ENDPOINT, request)
            .await
            .map_err(as_history_error)
    }

    async fn fetch_conversation(&self, conversation_id: &str) -> Result<Value> {
        let request = self
            .client
            .post(self.url(CONTENT_ENDPOINT))
            .json(&json!({ "filename": conversation_id }));
        self.send_json(CONTENT_ENDPOINT, request)
            .await
            .map_err(as_history_error)
    }

    async fn query(&self, message: &str) -> Result<Value> {
        let request = self
            .client
            .post(self.url(QUERY_ENDPOINT))
            .json(&json!({ "message": message }));
        self.send_json(QUERY_ENDPOINT, request).await
    }
}
