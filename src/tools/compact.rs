use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::Tool;
use crate::core::llm::{ChatClient, ChatMessage};
use crate::core::store::Store;

/// How many of the oldest messages one compaction pass swallows.
const COMPACT_CHUNK: usize = 10;
/// Below this there is nothing worth summarizing.
const COMPACT_MIN: usize = 5;

/// Replaces the oldest slice of the conversation log with a single
/// system-role summary. The suffix of the log is never reordered.
pub struct CompactTool {
    store: Store,
    client: ChatClient,
}

impl CompactTool {
    pub fn new(store: Store, client: ChatClient) -> Self {
        Self { store, client }
    }
}

#[async_trait]
impl Tool for CompactTool {
    fn name(&self) -> &str {
        "compact"
    }

    fn description(&self) -> String {
        "Summarizes older conversation history to save tokens. Input: ignored.".to_string()
    }

    async fn invoke(&self, _input: &str) -> Result<String> {
        let msgs = self.store.oldest_messages(COMPACT_CHUNK).await?;
        if msgs.len() < COMPACT_MIN {
            return Ok("History is too short to compact.".to_string());
        }

        let mut transcript = String::new();
        let mut ids = Vec::new();
        for m in &msgs {
            transcript.push_str(&format!("{}: {}\n", m.role, m.content));
            ids.push(m.id);
        }

        let prompt = format!(
            "Summarize the following conversation segment concisely, preserving key facts and context:\n\n{}",
            transcript
        );
        let summary = self
            .client
            .generate(&[ChatMessage::new("user", prompt)])
            .await
            .map_err(|e| anyhow!("summarization failed: {}", e))?;

        self.store
            .replace_messages_with_summary(
                &ids,
                &format!("Summary of previous conversation: {}", summary),
            )
            .await?;

        info!("Compacted {} messages", msgs.len());
        Ok(format!(
            "Compacted {} messages into summary: {}",
            msgs.len(),
            summary
        ))
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({ "title": "Compact History", "fields": [] })
    }
}

#[derive(Deserialize, Default)]
struct OptimizationPlan {
    #[serde(default)]
    delete: Vec<i64>,
    #[serde(default)]
    merge: Vec<MergeGroup>,
}

#[derive(Deserialize)]
struct MergeGroup {
    ids: Vec<i64>,
    new_content: String,
}

/// Asks the model for a merge/delete plan over all memories and applies it.
/// An unparseable plan mutates nothing.
pub struct OptimizeMemoryTool {
    store: Store,
    client: ChatClient,
}

impl OptimizeMemoryTool {
    pub fn new(store: Store, client: ChatClient) -> Self {
        Self { store, client }
    }
}

#[async_trait]
impl Tool for OptimizeMemoryTool {
    fn name(&self) -> &str {
        "optimize_memory"
    }

    fn description(&self) -> String {
        "Analyzes stored memories to merge duplicates and remove contradictions. Input: ignored."
            .to_string()
    }

    async fn invoke(&self, _input: &str) -> Result<String> {
        let memories = self.store.all_memories().await?;
        if memories.len() < 2 {
            return Ok("Not enough memories to optimize.".to_string());
        }

        let mut listing = String::new();
        for m in &memories {
            listing.push_str(&format!(
                "ID: {} | Kind: {} | Content: {}\n",
                m.id, m.kind, m.content
            ));
        }

        let prompt = format!(
            "Analyze the following list of memories. Identify duplicates, redundancies, or contradictions.\n\
             Return a JSON object with:\n\
             1. \"delete\": list of IDs to remove.\n\
             2. \"merge\": list of objects {{\"ids\": [id1, id2], \"new_content\": \"merged content\"}} to replace multiple memories with one.\n\n\
             Memories:\n{}",
            listing
        );

        let resp = self
            .client
            .generate(&[ChatMessage::new("user", prompt)])
            .await?;

        let plan_text = extract_braced(&resp);
        let plan: OptimizationPlan = match serde_json::from_str(plan_text) {
            Ok(plan) => plan,
            Err(e) => {
                return Ok(format!(
                    "Failed to parse optimization plan: {}\nRaw: {}",
                    e, resp
                ));
            }
        };

        let mut deleted = 0usize;
        for id in &plan.delete {
            if self.store.delete_memory(*id).await? {
                deleted += 1;
            }
        }

        let mut merged = 0usize;
        for group in &plan.merge {
            for id in &group.ids {
                self.store.delete_memory(*id).await?;
            }
            self.store
                .save_memory(&group.new_content, "fact", "merged")
                .await?;
            merged += 1;
        }

        Ok(format!(
            "Optimization complete. Deleted: {}, Merged: {}",
            deleted, merged
        ))
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({ "title": "Optimize Memory", "fields": [] })
    }
}

/// First `{` to last `}`, or the whole text when no braces are present.
fn extract_braced(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
