use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::Tool;
use crate::core::agent::Scheduler;
use crate::core::store::Store;

/// Creates, lists, and deletes scheduled jobs through the live scheduler so
/// new jobs are armed without a restart.
pub struct ScheduleTool {
    scheduler: Scheduler,
    store: Store,
}

impl ScheduleTool {
    pub fn new(scheduler: Scheduler, store: Store) -> Self {
        Self { scheduler, store }
    }
}

#[derive(Deserialize)]
struct ScheduleRequest {
    #[serde(default)]
    action: String,
    #[serde(default, rename = "type")]
    task_type: String,
    #[serde(default)]
    schedule: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    target_type: String,
    #[serde(default)]
    target_name: String,
    #[serde(default)]
    id: String,
}

#[async_trait]
impl Tool for ScheduleTool {
    fn name(&self) -> &str {
        "schedule_task"
    }

    fn description(&self) -> String {
        r#"Schedules tasks. Actions: add, list, delete. Input: {"action": "add|list|delete", "type": "one-shot|recurring", "schedule": "cron or RFC3339", "prompt": "...", "target_type": "main|subagent|council", "target_name": "...", "id": "123"}"#.to_string()
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        let mut req: ScheduleRequest =
            serde_json::from_str(input).map_err(|e| anyhow!("invalid input format: {}", e))?;
        if req.action.is_empty() {
            req.action = "add".to_string();
        }

        match req.action.as_str() {
            "add" => {
                if req.task_type != "one-shot" && req.task_type != "recurring" {
                    return Err(anyhow!("invalid task type: {}", req.task_type));
                }
                self.scheduler
                    .add_task(
                        &req.task_type,
                        &req.schedule,
                        &req.prompt,
                        &req.target_type,
                        &req.target_name,
                    )
                    .await?;
                Ok(format!("Scheduled {} task: {}", req.task_type, req.prompt))
            }
            "list" => {
                let tasks = self.store.load_scheduled_tasks().await?;
                if tasks.is_empty() {
                    return Ok("No scheduled tasks.".to_string());
                }
                let mut out = String::from("Scheduled Tasks:\n");
                for t in tasks {
                    out.push_str(&format!(
                        "[{}] {} | {} | {} -> {}/{}\n",
                        t.id, t.task_type, t.schedule, t.prompt, t.target_type, t.target_name
                    ));
                }
                Ok(out)
            }
            "delete" => {
                let id: i64 = req
                    .id
                    .parse()
                    .map_err(|_| anyhow!("invalid ID: {}", req.id))?;
                if self.scheduler.remove_task(id).await? {
                    Ok(format!("Deleted task {}", id))
                } else {
                    Ok(format!("No task with ID {}", id))
                }
            }
            other => Err(anyhow!("invalid action: {}", other)),
        }
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "title": "Task Scheduler",
            "actions": [
                {"name": "add", "label": "Schedule Task", "fields": [
                    {"name": "type", "label": "Type", "type": "choice", "options": ["one-shot", "recurring"]},
                    {"name": "schedule", "label": "Schedule", "type": "string", "hint": "Cron or RFC3339"},
                    {"name": "prompt", "label": "Prompt", "type": "string"},
                    {"name": "target_type", "label": "Target", "type": "choice", "options": ["main", "subagent", "council"]},
                    {"name": "target_name", "label": "Target Name", "type": "string"}
                ]},
                {"name": "list", "label": "List Tasks", "fields": []},
                {"name": "delete", "label": "Delete Task", "fields": [
                    {"name": "id", "label": "Task ID", "type": "string"}
                ]}
            ]
        })
    }
}
