use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::Tool;
use crate::core::store::Store;

/// Drops a note into another agent's mailbox.
pub struct SendMessageTool {
    store: Store,
}

impl SendMessageTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct SendRequest {
    to: String,
    content: String,
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> String {
        r#"Sends a message to another agent. Input: {"to": "agent_name", "content": "..."}"#
            .to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let req: SendRequest =
            serde_json::from_str(input).map_err(|e| anyhow!("invalid input format: {}", e))?;
        self.store
            .send_agent_message("main", &req.to, &req.content)
            .await?;
        Ok("Message sent.".to_string())
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Send Message",
            "fields": [
                {"name": "to", "label": "Recipient", "type": "string", "required": true},
                {"name": "content", "label": "Message", "type": "longtext", "required": true}
            ]
        })
    }
}

/// Reads and clears an agent's unread mailbox.
pub struct InboxTool {
    store: Store,
}

impl InboxTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for InboxTool {
    fn name(&self) -> &str {
        "check_inbox"
    }

    fn description(&self) -> String {
        "Checks messages for a specific agent. Input: agent_name".to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let name = input.trim();
        if name.is_empty() {
            return Err(anyhow!("agent name is required"));
        }

        let messages = self.store.unread_messages(name).await?;
        if messages.is_empty() {
            return Ok("No new messages.".to_string());
        }

        let mut out = String::new();
        for m in &messages {
            out.push_str(&format!(
                "From {} ({}): {}\n",
                m.from_agent, m.created_at, m.content
            ));
        }
        self.store.mark_messages_read(name).await?;
        Ok(out)
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Check Inbox",
            "fields": [
                {"name": "input", "label": "Agent Name", "type": "string", "required": true}
            ]
        })
    }
}
