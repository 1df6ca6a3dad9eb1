use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::Tool;
use crate::core::store::Store;

/// Updates the persisted default persona used when no per-instance persona
/// is set.
pub struct PersonalityTool {
    store: Store,
}

impl PersonalityTool {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for PersonalityTool {
    fn name(&self) -> &str {
        "personality"
    }

    fn description(&self) -> String {
        "Sets the assistant's persistent personality. Input: the new personality text."
            .to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let personality = input.trim();
        if personality.is_empty() {
            return Err(anyhow!("personality text is required"));
        }
        self.store.set_setting("personality", personality).await?;
        Ok(format!("Personality updated: {}", personality))
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Personality",
            "fields": [
                {"name": "input", "label": "Personality Text", "type": "longtext", "required": true}
            ]
        })
    }
}
