use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::Tool;
use crate::core::agent::CouncilEngine;

/// Defines, lists, and convenes councils of specialized agents.
pub struct CouncilTool {
    engine: CouncilEngine,
}

impl CouncilTool {
    pub fn new(engine: CouncilEngine) -> Self {
        Self { engine }
    }
}

#[derive(Deserialize)]
struct CouncilRequest {
    action: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    problem: String,
}

#[async_trait]
impl Tool for CouncilTool {
    fn name(&self) -> &str {
        "council"
    }

    fn description(&self) -> String {
        r#"Manages agent councils. Input must be a JSON object: {"action": "define|run|list", "name": "council_name", "members": ["a", "b"], "problem": "the problem for the council to solve"}"#.to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let req: CouncilRequest =
            serde_json::from_str(input).map_err(|e| anyhow!("invalid input format: {}", e))?;

        match req.action.as_str() {
            "define" => {
                if req.name.is_empty() || req.members.is_empty() {
                    return Err(anyhow!("name and members are required for define"));
                }
                self.engine.define_council(&req.name, &req.members).await?;
                Ok(format!("Successfully defined council: {}", req.name))
            }
            "run" => {
                if req.name.is_empty() || req.problem.is_empty() {
                    return Err(anyhow!("name and problem are required for run"));
                }
                let id = self
                    .engine
                    .run_council_session(&req.name, &req.problem)
                    .await?;
                Ok(format!(
                    "Started council session for '{}' with ID: {}",
                    req.name, id
                ))
            }
            "list" => {
                let councils = self.engine.list_councils().await?;
                if councils.is_empty() {
                    return Ok("No councils defined yet.".to_string());
                }
                let mut out = String::new();
                for c in councils {
                    out.push_str(&format!("- {}: Members ({})\n", c.name, c.members));
                }
                Ok(out)
            }
            other => Err(anyhow!("invalid action: {}", other)),
        }
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Councils",
            "actions": [
                {"name": "define", "label": "Define Council", "fields": [
                    {"name": "name", "label": "Name", "type": "string", "required": true},
                    {"name": "members", "label": "Members", "type": "list", "required": true}
                ]},
                {"name": "run", "label": "Run Session", "fields": [
                    {"name": "name", "label": "Name", "type": "string", "required": true},
                    {"name": "problem", "label": "Problem", "type": "longtext", "required": true}
                ]},
                {"name": "list", "label": "List Councils", "fields": []}
            ]
        })
    }
}
