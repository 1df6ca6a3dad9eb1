/// A row in the main conversation log.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// A long-lived fact, preference, or observation fed into every system
/// prompt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub content: String,
    pub kind: String,
    pub tags: String,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScheduledTaskRecord {
    pub id: i64,
    pub task_type: String,
    pub schedule: String,
    pub prompt: String,
    pub target_type: String,
    pub target_name: String,
    pub last_run: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SubAgentDefinitionRecord {
    pub name: String,
    pub personality: String,
    pub tools: String,
    pub model: String,
}

/// One background run (sub-agent or council session). `finished_at` is set
/// exactly when `status` leaves `running`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskRunRecord {
    pub id: String,
    pub prompt: String,
    pub status: String,
    pub progress: i64,
    pub result: String,
    pub model: String,
    pub personality: String,
    pub created_at: String,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CouncilRecord {
    pub name: String,
    /// Comma-joined member names, order preserved.
    pub members: String,
}

impl CouncilRecord {
    pub fn member_names(&self) -> Vec<String> {
        self.members
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WebhookRecord {
    pub id: String,
    pub name: String,
    pub target_agent: String,
    pub prompt_template: String,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentMessageRecord {
    pub id: i64,
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    pub created_at: String,
}

/// One line in the `/history` feed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActivityRecord {
    pub timestamp: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}
