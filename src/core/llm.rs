use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: usize = 2;

/// One message in a chat exchange. Images ride along as base64 strings and
/// are only ever attached to the user message that introduced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            images: None,
        }
    }

    pub fn with_images(role: &str, content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            images: Some(images),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Bridge to the local chat-model endpoint. Cloning is cheap (the reqwest
/// client is reference-counted), so every reasoning loop owns its own handle
/// and can pin a model override without touching anyone else's.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    model: String,
    http: Client,
}

impl ChatClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            http: Client::builder()
                .timeout(TRANSPORT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// A handle identical to this one except for the model, for per-loop
    /// overrides. An empty override keeps the default.
    pub fn with_model(&self, model: &str) -> Self {
        if model.is_empty() {
            return self.clone();
        }
        let mut client = self.clone();
        client.model = model.to_string();
        client
    }

    /// Send the conversation and return the assistant's reply. Transient
    /// transport failures (connection EOF, read timeouts, 5xx) are retried
    /// up to two times with a short linear back-off.
    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let url = format!("{}/api/chat", self.base_url);

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!(
                    "chat retry {} after error: {}",
                    attempt,
                    last_err.as_ref().map(|e| e.to_string()).unwrap_or_default()
                );
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }

            let res = match self.http.post(&url).json(&req).send().await {
                Ok(res) => res,
                Err(e) => {
                    if is_transient(&e) {
                        last_err = Some(e.into());
                        continue;
                    }
                    return Err(anyhow!("chat request failed: {}", e));
                }
            };

            if !res.status().is_success() {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                last_err = Some(anyhow!("unexpected status {}: {}", status, body));
                continue;
            }

            match res.json::<ChatResponse>().await {
                Ok(parsed) => return Ok(parsed.message.content),
                Err(e) => {
                    last_err = Some(anyhow!("failed to decode response: {}", e));
                    continue;
                }
            }
        }

        Err(anyhow!(
            "chat failed after {} retries: {}",
            MAX_RETRIES,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        ))
    }

}

/// EOF-class and timeout-class failures are worth a retry; anything else
/// (bad URL, TLS refusal) is not going to improve.
fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }
    let text = err.to_string();
    text.contains("EOF")
        || text.contains("connection reset")
        || text.contains("IncompleteMessage")
}
