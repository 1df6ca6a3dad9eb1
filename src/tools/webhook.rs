use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::Tool;
use crate::core::store::Store;

/// Manages incoming webhooks. The generated id doubles as the URL path
/// secret.
pub struct WebhookTool {
    store: Store,
}

impl WebhookTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct WebhookRequest {
    action: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    target_agent: String,
    #[serde(default)]
    prompt_template: String,
    #[serde(default)]
    id: String,
}

#[async_trait]
impl Tool for WebhookTool {
    fn name(&self) -> &str {
        "webhook"
    }

    fn description(&self) -> String {
        "Manage incoming webhooks. Actions: create, list, delete. The request body replaces {{payload}} in the prompt template.".to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let req: WebhookRequest =
            serde_json::from_str(input).map_err(|e| anyhow!("invalid input format: {}", e))?;

        match req.action.as_str() {
            "create" => {
                if req.name.is_empty() || req.prompt_template.is_empty() {
                    return Err(anyhow!("name and prompt_template are required"));
                }
                let id = Uuid::new_v4().to_string();
                self.store
                    .save_webhook(&id, &req.name, &req.target_agent, &req.prompt_template)
                    .await?;
                Ok(format!("Webhook created. URL: /webhooks/{}", id))
            }
            "list" => {
                let hooks = self.store.webhooks().await?;
                if hooks.is_empty() {
                    return Ok("No webhooks found.".to_string());
                }
                let mut out = String::from("Active Webhooks:\n");
                for hook in hooks {
                    out.push_str(&format!(
                        "- [{}] {} -> {} (Template: {})\n",
                        hook.id, hook.name, hook.target_agent, hook.prompt_template
                    ));
                }
                Ok(out)
            }
            "delete" => {
                if self.store.delete_webhook(&req.id).await? {
                    Ok("Webhook deleted.".to_string())
                } else {
                    Ok(format!("No webhook with ID {}", req.id))
                }
            }
            other => Err(anyhow!("unknown action: {}", other)),
        }
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Webhook Manager",
            "actions": [
                {"name": "create", "label": "Create Webhook", "fields": [
                    {"name": "name", "label": "Name", "type": "string", "required": true},
                    {"name": "target_agent", "label": "Target Agent", "type": "string", "hint": "main or agent name"},
                    {"name": "prompt_template", "label": "Prompt Template (use {{payload}})", "type": "longtext", "required": true}
                ]},
                {"name": "list", "label": "List Webhooks", "fields": []},
                {"name": "delete", "label": "Delete Webhook", "fields": [
                    {"name": "id", "label": "Webhook ID", "type": "string"}
                ]}
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_util::memory_store;

    #[tokio::test]
    async fn create_list_delete_cycle() {
        let store = memory_store();
        let tool = WebhookTool::new(store.clone());

        let out = tool
            .invoke(r#"{"action": "create", "name": "ci", "prompt_template": "build {{payload}}"}"#)
            .await
            .unwrap();
        let id = out.rsplit('/').next().unwrap().to_string();
        assert!(out.starts_with("Webhook created."));

        let listing = tool.invoke(r#"{"action": "list"}"#).await.unwrap();
        assert!(listing.contains("ci -> main"));

        let del = tool
            .invoke(&format!(r#"{{"action": "delete", "id": "{}"}}"#, id))
            .await
            .unwrap();
        assert_eq!(del, "Webhook deleted.");
        assert!(store.webhook(&id).await.unwrap().is_none());
    }
}
