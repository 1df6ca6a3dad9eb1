use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::Tool;
use crate::core::agent::{SubAgentManager, VisionContext};

/// Spawns and inspects background runs. A spawn inside a vision turn
/// inherits the turn's attached images through the shared accessor.
pub struct SubAgentTool {
    manager: SubAgentManager,
    vision: VisionContext,
}

impl SubAgentTool {
    pub fn new(manager: SubAgentManager, vision: VisionContext) -> Self {
        Self { manager, vision }
    }
}

#[derive(Deserialize)]
struct SubAgentRequest {
    action: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    agent: String,
    #[serde(default)]
    id: String,
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        "subagent"
    }

    fn description(&self) -> String {
        r#"Manages sub-agents. Input must be a JSON object: {"action": "spawn|list|result", "prompt": "prompt for spawn", "agent": "optional named agent", "id": "id for result retrieval"}"#.to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let req: SubAgentRequest =
            serde_json::from_str(input).map_err(|e| anyhow!("invalid input format: {}", e))?;

        match req.action.as_str() {
            "spawn" => {
                if req.prompt.is_empty() {
                    return Err(anyhow!("prompt is required for spawn"));
                }
                let images = self.vision.snapshot();
                let images = if images.is_empty() { None } else { Some(images) };
                let id = if req.agent.is_empty() {
                    self.manager.spawn(&req.prompt, images).await?
                } else {
                    self.manager.spawn_named(&req.agent, &req.prompt, images).await?
                };
                Ok(format!("Spawned sub-agent with ID: {}", id))
            }
            "list" => {
                let runs = self.manager.list().await?;
                if runs.is_empty() {
                    return Ok("No sub-agents found.".to_string());
                }
                let mut out = String::new();
                for run in runs {
                    out.push_str(&format!("[{}] {}: {}\n", run.id, run.status, run.prompt));
                }
                Ok(out)
            }
            "result" => {
                if req.id.is_empty() {
                    return Err(anyhow!("id is required for result action"));
                }
                let runs = self.manager.list().await?;
                for run in runs {
                    if run.id == req.id {
                        if run.status == "running" {
                            return Ok(format!("Sub-agent {} is still running.", req.id));
                        }
                        return Ok(format!("Sub-agent {} result: {}", req.id, run.result));
                    }
                }
                Ok(format!("Sub-agent with ID {} not found.", req.id))
            }
            other => Err(anyhow!("invalid action: {}", other)),
        }
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Sub-Agents",
            "actions": [
                {"name": "spawn", "label": "Spawn", "fields": [
                    {"name": "prompt", "label": "Prompt", "type": "longtext", "required": true},
                    {"name": "agent", "label": "Named Agent", "type": "string"}
                ]},
                {"name": "list", "label": "List", "fields": []},
                {"name": "result", "label": "Result", "fields": [
                    {"name": "id", "label": "Run ID", "type": "string", "required": true}
                ]}
            ]
        })
    }
}

/// Lists the specialized agent definitions.
pub struct AgentListTool {
    manager: SubAgentManager,
}

impl AgentListTool {
    pub fn new(manager: SubAgentManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for AgentListTool {
    fn name(&self) -> &str {
        "list_agents"
    }

    fn description(&self) -> String {
        "Lists all specialized agents currently defined. Input: ignored.".to_string()
    }

    async fn invoke(&self, _input: &str) -> Result<String> {
        let defs = self.manager.list_definitions().await?;
        if defs.is_empty() {
            return Ok("No specialized agents defined yet.".to_string());
        }

        let mut out = String::from("Defined Agents:\n");
        for def in defs {
            let model = if def.model.is_empty() {
                "default".to_string()
            } else {
                def.model
            };
            out.push_str(&format!(
                "- {} (model: {}, tools: {}): {}\n",
                def.name, model, def.tools, def.personality
            ));
        }
        Ok(out)
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({ "title": "List Agents", "fields": [] })
    }
}

/// Creates or updates a specialized agent definition.
pub struct DefineAgentTool {
    manager: SubAgentManager,
}

impl DefineAgentTool {
    pub fn new(manager: SubAgentManager) -> Self {
        Self { manager }
    }
}

#[derive(Deserialize)]
struct DefineAgentRequest {
    name: String,
    personality: String,
    #[serde(default = "default_tools")]
    tools: String,
    #[serde(default)]
    model: String,
}

fn default_tools() -> String {
    "*".to_string()
}

#[async_trait]
impl Tool for DefineAgentTool {
    fn name(&self) -> &str {
        "define_agent"
    }

    fn description(&self) -> String {
        r#"Defines or updates a specialized agent. Input: {"name": "coder", "personality": "...", "tools": "comma,separated or *", "model": "optional model override"}"#.to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let req: DefineAgentRequest =
            serde_json::from_str(input).map_err(|e| anyhow!("invalid input format: {}", e))?;
        if req.name.is_empty() || req.personality.is_empty() {
            return Err(anyhow!("name and personality are required"));
        }

        self.manager
            .define_agent(&req.name, &req.personality, &req.tools, &req.model)
            .await?;
        Ok(format!("Agent '{}' defined.", req.name))
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Define Agent",
            "fields": [
                {"name": "name", "label": "Name", "type": "string", "required": true},
                {"name": "personality", "label": "Personality", "type": "longtext", "required": true},
                {"name": "tools", "label": "Tools (comma-separated or *)", "type": "string"},
                {"name": "model", "label": "Model Override", "type": "string"}
            ]
        })
    }
}
