mod compact;
mod council;
mod memory;
mod messaging;
mod personality;
mod schedule;
mod subagent;
mod time;
mod webhook;

pub use compact::{CompactTool, OptimizeMemoryTool};
pub use council::CouncilTool;
pub use memory::{RecallTool, RememberTool};
pub use messaging::{InboxTool, SendMessageTool};
pub use personality::PersonalityTool;
pub use schedule::ScheduleTool;
pub use subagent::{AgentListTool, DefineAgentTool, SubAgentTool};
pub use time::TimeTool;
pub use webhook::WebhookTool;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A capability the reasoning loop can invoke. The loop only ever consumes
/// this contract; `schema` exists for external UIs and is never
/// introspected internally.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> String;
    async fn invoke(&self, input: &str) -> Result<String>;
    fn schema(&self) -> serde_json::Value {
        serde_json::json!({ "title": self.name(), "fields": [] })
    }
}

/// Name → tool lookup table. Clones share the underlying table, so a tool
/// registered after a subsystem grabbed its handle is still visible there;
/// `subset` is the one operation that detaches.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// `- name: description` lines for the system prompt, stable order.
    pub fn describe(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut lines: Vec<(String, String)> = tools
            .values()
            .map(|t| (t.name().to_string(), t.description()))
            .collect();
        lines.sort();
        lines
            .into_iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect()
    }

    pub fn schemas(&self) -> serde_json::Value {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let map: serde_json::Map<String, serde_json::Value> = tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.schema()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Detached registry restricted to a comma-separated allow list.
    /// `*` or an empty string inherit everything; unknown names are
    /// silently dropped.
    pub fn subset(&self, allowed: &str) -> ToolRegistry {
        let filtered = ToolRegistry::new();
        let allowed = allowed.trim();
        if allowed.is_empty() || allowed == "*" {
            let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
            for tool in tools.values() {
                filtered.register(tool.clone());
            }
            return filtered;
        }

        for name in allowed.split(',') {
            if let Some(tool) = self.get(name.trim()) {
                filtered.register(tool);
            }
        }
        filtered
    }
}
