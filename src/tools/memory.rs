use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::Tool;
use crate::core::store::Store;

/// Stores a durable fact/preference/observation.
pub struct RememberTool {
    store: Store,
}

impl RememberTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[derive(Deserialize, Default)]
struct RememberRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    tags: String,
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> String {
        r#"Stores a fact, preference, or observation in long-term memory. Input: {"content": "...", "kind": "fact|preference|observation", "tags": "a,b"}"#.to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        // Plain-string input is accepted as a bare fact.
        let req = serde_json::from_str::<RememberRequest>(input).unwrap_or(RememberRequest {
            content: input.to_string(),
            kind: "fact".to_string(),
            tags: String::new(),
        });

        if req.content.is_empty() {
            return Err(anyhow!("content is required"));
        }

        self.store
            .save_memory(&req.content, &req.kind, &req.tags)
            .await?;
        let kind = if req.kind.is_empty() {
            "fact"
        } else {
            req.kind.as_str()
        };
        Ok(format!("Memory saved: [{}] {}", kind, req.content))
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Save Memory",
            "fields": [
                {"name": "content", "label": "Memory Content", "type": "longtext", "required": true},
                {"name": "kind", "label": "Kind", "type": "choice", "options": ["fact", "preference", "observation"]},
                {"name": "tags", "label": "Tags (comma-separated)", "type": "string"}
            ]
        })
    }
}

/// Manual long-term memory search.
pub struct RecallTool {
    store: Store,
}

impl RecallTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> String {
        "Searches long-term memory. Input: search query string.".to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let memories = self.store.search_memories(input, 10).await?;
        if memories.is_empty() {
            return Ok("No relevant memories found.".to_string());
        }

        let mut out = String::from("Found Memories:\n");
        for m in memories {
            out.push_str(&format!("- [{}] {} (Tags: {})\n", m.kind, m.content, m.tags));
        }
        Ok(out)
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Recall Memory",
            "fields": [
                {"name": "input", "label": "Search Query", "type": "string", "required": true}
            ]
        })
    }
}
