use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::Agent;
use crate::core::llm::ChatClient;
use crate::core::store::types::{CouncilRecord, SubAgentDefinitionRecord};
use crate::core::store::Store;
use crate::tools::ToolRegistry;

const ROUNDS: usize = 2;
const TURN_DEADLINE: Duration = Duration::from_secs(300);
const TRANSCRIPT_SEPARATOR: &str = "\n\n---\n\n";

/// Runs fixed-round, round-robin deliberations over a council's members.
/// Sessions are persisted as task runs so they share observability with
/// sub-agents.
#[derive(Clone)]
pub struct CouncilEngine {
    client: ChatClient,
    store: Store,
    tools: ToolRegistry,
}

impl CouncilEngine {
    pub fn new(client: ChatClient, store: Store, tools: ToolRegistry) -> Self {
        Self {
            client,
            store,
            tools,
        }
    }

    pub async fn define_council(&self, name: &str, members: &[String]) -> Result<()> {
        self.store.save_council(name, &members.join(",")).await
    }

    pub async fn list_councils(&self) -> Result<Vec<CouncilRecord>> {
        self.store.councils().await
    }

    /// Starts a session and returns its id. Members without a definition
    /// are dropped with a warning; a council with no resolvable members
    /// fails before any row is written.
    pub async fn run_council_session(&self, council_name: &str, problem: &str) -> Result<String> {
        let council = self
            .store
            .council(council_name)
            .await?
            .ok_or_else(|| anyhow!("council '{}' not found", council_name))?;

        let mut members = Vec::new();
        for name in council.member_names() {
            match self.store.sub_agent_definition(&name).await? {
                Some(def) => members.push(def),
                None => warn!("council '{}' member '{}' is undefined, skipping", council_name, name),
            }
        }
        if members.is_empty() {
            return Err(anyhow!("no valid members found for council '{}'", council_name));
        }

        let id = Uuid::new_v4().to_string()[..8].to_string();
        self.store
            .save_sub_agent(
                &id,
                &format!("[council:{}] {}", council_name, problem),
                "running",
                "",
                "",
            )
            .await?;

        let engine = self.clone();
        let session_id = id.clone();
        let council_name = council_name.to_string();
        let problem = problem.to_string();
        tokio::spawn(async move {
            engine
                .deliberate(&session_id, &council_name, &members, &problem)
                .await;
        });

        Ok(id)
    }

    async fn deliberate(
        &self,
        id: &str,
        council_name: &str,
        members: &[SubAgentDefinitionRecord],
        problem: &str,
    ) {
        info!("council '{}' session {} started", council_name, id);

        let mut transcript = vec![format!("Council Problem: {}", problem)];
        let total_turns = (ROUNDS * members.len()) as i64;

        for round in 1..=ROUNDS {
            for (idx, member) in members.iter().enumerate() {
                let turns_done = ((round - 1) * members.len() + idx) as i64;
                let progress = turns_done * 100 / total_turns;
                if let Err(e) = self.store.update_sub_agent_progress(id, progress).await {
                    warn!("council {} progress update failed: {}", id, e);
                }

                let member_prompt = format!(
                    "You are participating in a council meeting called '{}'.\n\
                     The problem we are solving is: {}\n\n\
                     Current Discussion Transcript:\n{}\n\n\
                     Provide your thoughts or solutions based on your unique personality and expertise.",
                    council_name,
                    problem,
                    transcript.join("\n\n")
                );

                // Each turn is a fresh storeless loop so deliberation never
                // leaks into the main conversation log.
                let mut agent = Agent::detached(
                    self.client.clone(),
                    self.tools.clone(),
                    &member.personality,
                    &member.model,
                );

                info!("council '{}' member '{}' is thinking", council_name, member.name);
                match tokio::time::timeout(TURN_DEADLINE, agent.run(&member_prompt)).await {
                    Ok(Ok(response)) => {
                        transcript.push(format!("[{}]: {}", member.name, response));
                    }
                    Ok(Err(e)) => {
                        warn!("council turn for '{}' failed: {}", member.name, e);
                    }
                    Err(_) => {
                        warn!("council turn for '{}' timed out", member.name);
                    }
                }
            }
        }

        let final_result = transcript.join(TRANSCRIPT_SEPARATOR);
        if let Err(e) = self.store.update_sub_agent(id, "completed", &final_result).await {
            warn!("council {} result flush failed: {}", id, e);
        }
        info!("council '{}' session {} completed", council_name, id);
    }
}
