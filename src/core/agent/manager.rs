use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use super::Agent;
use crate::core::llm::ChatClient;
use crate::core::store::types::{SubAgentDefinitionRecord, TaskRunRecord};
use crate::core::store::Store;
use crate::tools::ToolRegistry;

/// Hard ceiling on one background run.
const RUN_DEADLINE: Duration = Duration::from_secs(600);

/// Spawns and tracks background reasoning loops. Runs are independent of
/// the caller: they ignore its cancellation and are bounded only by the
/// run deadline.
#[derive(Clone)]
pub struct SubAgentManager {
    client: ChatClient,
    store: Store,
    tools: ToolRegistry,
}

impl SubAgentManager {
    pub fn new(client: ChatClient, store: Store, tools: ToolRegistry) -> Self {
        Self {
            client,
            store,
            tools,
        }
    }

    /// Anonymous run with the default persona and the full tool set.
    /// Returns the 8-char run id as soon as the row is visible.
    pub async fn spawn(&self, prompt: &str, images: Option<Vec<String>>) -> Result<String> {
        let id = short_id();
        self.store
            .save_sub_agent(&id, prompt, "running", "", "")
            .await?;

        self.launch(id.clone(), prompt.to_string(), String::new(), String::new(), self.tools.clone(), images);
        Ok(id)
    }

    /// Run under a named definition: its persona, model override, and tool
    /// subset apply. Fails when the definition does not exist.
    pub async fn spawn_named(
        &self,
        agent_name: &str,
        prompt: &str,
        images: Option<Vec<String>>,
    ) -> Result<String> {
        let def = self
            .store
            .sub_agent_definition(agent_name)
            .await?
            .ok_or_else(|| anyhow!("sub-agent definition for '{}' not found", agent_name))?;

        let id = short_id();
        self.store
            .save_sub_agent(
                &id,
                &format!("[{}]: {}", agent_name, prompt),
                "running",
                &def.personality,
                &def.model,
            )
            .await?;

        let tools = self.tools.subset(&def.tools);
        self.launch(
            id.clone(),
            prompt.to_string(),
            def.personality,
            def.model,
            tools,
            images,
        );
        Ok(id)
    }

    fn launch(
        &self,
        id: String,
        prompt: String,
        personality: String,
        model: String,
        tools: ToolRegistry,
        images: Option<Vec<String>>,
    ) {
        let client = self.client.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            info!("sub-agent {} starting: {}", id, prompt);

            let mut agent = Agent::detached(client, tools, &personality, &model);
            let run = async {
                match images {
                    Some(images) if !images.is_empty() => {
                        agent.run_vision(&prompt, images).await
                    }
                    _ => agent.run(&prompt).await,
                }
            };

            let (status, result) = match tokio::time::timeout(RUN_DEADLINE, run).await {
                Ok(Ok(answer)) => ("completed", answer),
                Ok(Err(e)) => ("failed", format!("Error: {}", e)),
                Err(_) => (
                    "failed",
                    format!("Error: run exceeded {} minute deadline", RUN_DEADLINE.as_secs() / 60),
                ),
            };

            if let Err(e) = store.update_sub_agent(&id, status, &result).await {
                error!("could not record sub-agent {} outcome: {}", id, e);
            }
            info!("sub-agent {} {}", id, status);
        });
    }

    pub async fn define_agent(
        &self,
        name: &str,
        personality: &str,
        tools: &str,
        model: &str,
    ) -> Result<()> {
        self.store
            .save_sub_agent_definition(name, personality, tools, model)
            .await
    }

    pub async fn list(&self) -> Result<Vec<TaskRunRecord>> {
        self.store.sub_agents().await
    }

    pub async fn list_active(&self) -> Result<Vec<TaskRunRecord>> {
        self.store.active_sub_agents().await
    }

    pub async fn list_definitions(&self) -> Result<Vec<SubAgentDefinitionRecord>> {
        self.store.sub_agent_definitions().await
    }
}

/// 8 chars of a v4 uuid; plenty of entropy for concurrently-live runs.
fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
