use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{Agent, CouncilEngine, SubAgentManager};
use crate::core::store::types::ScheduledTaskRecord;
use crate::core::store::Store;

/// Loads persisted jobs and dispatches them when due. Recurring jobs run on
/// the calendar engine; one-shots on plain timers, with instants already in
/// the past fired immediately (missed-fire recovery).
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    cron: Mutex<JobScheduler>,
    /// Job row id → engine handle. Re-arming replaces the old handle so a
    /// reload never double-registers a recurring job.
    recurring: Mutex<HashMap<i64, Uuid>>,
    /// One-shot rows already holding a live timer in this process.
    armed_one_shots: Mutex<HashSet<i64>>,
    agent: Arc<Mutex<Agent>>,
    store: Store,
    sub_agents: SubAgentManager,
    councils: CouncilEngine,
}

impl Scheduler {
    pub async fn new(
        agent: Arc<Mutex<Agent>>,
        store: Store,
        sub_agents: SubAgentManager,
        councils: CouncilEngine,
    ) -> Result<Self> {
        let cron = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("calendar engine init failed: {}", e))?;

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                cron: Mutex::new(cron),
                recurring: Mutex::new(HashMap::new()),
                armed_one_shots: Mutex::new(HashSet::new()),
                agent,
                store,
                sub_agents,
                councils,
            }),
        })
    }

    /// Starts the calendar engine and arms every persisted job.
    pub async fn start(&self) -> Result<()> {
        self.inner
            .cron
            .lock()
            .await
            .start()
            .await
            .map_err(|e| anyhow!("calendar engine start failed: {}", e))?;
        self.load_and_arm().await;
        Ok(())
    }

    /// Validates, persists, then re-arms everything. The handle maps make
    /// the blanket reload idempotent.
    pub async fn add_task(
        &self,
        task_type: &str,
        schedule: &str,
        prompt: &str,
        target_type: &str,
        target_name: &str,
    ) -> Result<()> {
        if task_type == "one-shot" {
            DateTime::parse_from_rfc3339(schedule)
                .map_err(|e| anyhow!("invalid one-shot time (RFC3339 expected): {}", e))?;
        } else if task_type == "recurring" {
            // Nothing is persisted unless the engine accepts the expression.
            Job::new_async(normalize_cron(schedule).as_str(), |_uuid, _lock| {
                Box::pin(async {})
            })
            .map_err(|e| anyhow!("invalid cron expression: {}", e))?;
        }

        self.inner
            .store
            .save_scheduled_task(task_type, schedule, prompt, target_type, target_name)
            .await?;
        self.load_and_arm().await;
        Ok(())
    }

    /// Deletes the row and tears down any live recurring handle. An armed
    /// one-shot timer checks the store again at fire time, so deleting the
    /// row is enough to defuse it.
    pub async fn remove_task(&self, id: i64) -> Result<bool> {
        let existed = self.inner.store.delete_task(id).await?;

        let handle = self.inner.recurring.lock().await.remove(&id);
        if let Some(handle) = handle {
            let cron = self.inner.cron.lock().await;
            if let Err(e) = cron.remove(&handle).await {
                warn!("could not unregister recurring job {}: {}", id, e);
            }
        }
        Ok(existed)
    }

    async fn load_and_arm(&self) {
        let tasks = match self.inner.store.load_scheduled_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("could not load scheduled tasks: {}", e);
                return;
            }
        };

        for task in tasks {
            match task.task_type.as_str() {
                "recurring" => self.arm_recurring(task).await,
                "one-shot" => self.arm_one_shot(task).await,
                other => warn!("task {} has unknown type '{}', skipping", task.id, other),
            }
        }
    }

    async fn arm_recurring(&self, task: ScheduledTaskRecord) {
        let expr = normalize_cron(&task.schedule);
        let scheduler = self.clone();
        let job_task = task.clone();

        let job = Job::new_async(expr.as_str(), move |_uuid, _lock| {
            let scheduler = scheduler.clone();
            let task = job_task.clone();
            Box::pin(async move {
                scheduler.execute(task).await;
            })
        });

        let job = match job {
            Ok(job) => job,
            Err(e) => {
                error!("invalid cron '{}' for task {}: {}", task.schedule, task.id, e);
                return;
            }
        };

        let handle = match self.inner.cron.lock().await.add(job).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("could not register recurring task {}: {}", task.id, e);
                return;
            }
        };

        // Replace-then-remove keeps exactly one live handle per row.
        let old = self.inner.recurring.lock().await.insert(task.id, handle);
        if let Some(old) = old {
            let cron = self.inner.cron.lock().await;
            if let Err(e) = cron.remove(&old).await {
                warn!("could not drop stale handle for task {}: {}", task.id, e);
            }
        }
    }

    async fn arm_one_shot(&self, task: ScheduledTaskRecord) {
        {
            let mut armed = self.inner.armed_one_shots.lock().await;
            if !armed.insert(task.id) {
                return;
            }
        }

        let run_at = match DateTime::parse_from_rfc3339(&task.schedule) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                error!("bad one-shot time '{}' for task {}: {}", task.schedule, task.id, e);
                return;
            }
        };

        let scheduler = self.clone();
        let delay = run_at - Utc::now();
        tokio::spawn(async move {
            if let Ok(wait) = delay.to_std() {
                tokio::time::sleep(wait).await;
                // The row may have been deleted while we slept.
                let still_there = scheduler
                    .inner
                    .store
                    .load_scheduled_tasks()
                    .await
                    .map(|tasks| tasks.iter().any(|t| t.id == task.id))
                    .unwrap_or(false);
                if !still_there {
                    return;
                }
            }
            // Negative delay: the instant passed while the host was down.
            scheduler.execute(task).await;
        });
    }

    async fn execute(&self, task: ScheduledTaskRecord) {
        info!(
            "running scheduled task {}: {} (target: {}/{})",
            task.id, task.prompt, task.target_type, task.target_name
        );

        let outcome = match task.target_type.as_str() {
            "subagent" => self
                .inner
                .sub_agents
                .spawn_named(&task.target_name, &task.prompt, None)
                .await
                .map(|_| ()),
            "council" => self
                .inner
                .councils
                .run_council_session(&task.target_name, &task.prompt)
                .await
                .map(|_| ()),
            _ => {
                let mut agent = self.inner.agent.lock().await;
                agent
                    .run(&format!("[Scheduled Task]: {}", task.prompt))
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = outcome {
            error!("scheduled task {} dispatch failed: {}", task.id, e);
        }

        // Bookkeeping happens after dispatch either way: the fire is spent.
        if let Err(e) = self.inner.store.update_task_last_run(task.id).await {
            warn!("could not stamp last_run for task {}: {}", task.id, e);
        }
        if task.task_type == "one-shot" {
            if let Err(e) = self.inner.store.delete_task(task.id).await {
                warn!("could not delete fired one-shot {}: {}", task.id, e);
            }
        }
    }
}

/// The engine wants a seconds field; plain five-field crontab expressions
/// get one prepended.
fn normalize_cron(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {}", expr.trim())
    } else {
        expr.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ChatClient;
    use crate::core::store::test_util::memory_store;
    use crate::tools::ToolRegistry;

    #[test]
    fn normalize_cron_pads_five_field_expressions() {
        assert_eq!(normalize_cron("*/5 * * * *"), "0 */5 * * * *");
        assert_eq!(normalize_cron("0 30 9 * * Mon"), "0 30 9 * * Mon");
        assert_eq!(normalize_cron("  * * * * * *  "), "* * * * * *");
    }

    async fn scheduler_fixture(store: Store) -> Scheduler {
        let client = ChatClient::new("http://127.0.0.1:1", "test");
        let tools = ToolRegistry::new();
        let agent = Arc::new(Mutex::new(
            Agent::new(client.clone(), Some(store.clone()), tools.clone()).await,
        ));
        let subs = SubAgentManager::new(client.clone(), store.clone(), tools.clone());
        let councils = CouncilEngine::new(client, store.clone(), tools);
        Scheduler::new(agent, store, subs, councils).await.unwrap()
    }

    #[tokio::test]
    async fn add_task_rejects_bad_one_shot_instant() {
        let store = memory_store();
        let scheduler = scheduler_fixture(store.clone()).await;
        let err = scheduler
            .add_task("one-shot", "tomorrow-ish", "ping", "main", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("RFC3339"));
        assert!(store.load_scheduled_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_task_rejects_bad_cron_before_persisting() {
        let store = memory_store();
        let scheduler = scheduler_fixture(store.clone()).await;
        let err = scheduler
            .add_task("recurring", "whenever", "tick", "main", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cron"));
        assert!(store.load_scheduled_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reloading_recurring_jobs_keeps_one_handle_per_row() {
        let store = memory_store();
        let scheduler = scheduler_fixture(store.clone()).await;
        scheduler.start().await.unwrap();

        scheduler
            .add_task("recurring", "0 0 3 * * *", "nightly", "main", "")
            .await
            .unwrap();
        // Adding more jobs reloads everything; the first row must still map
        // to exactly one engine handle.
        scheduler
            .add_task("recurring", "0 0 4 * * *", "later", "main", "")
            .await
            .unwrap();

        let handles = scheduler.inner.recurring.lock().await;
        assert_eq!(handles.len(), 2);
    }

    #[tokio::test]
    async fn remove_task_clears_row_and_handle() {
        let store = memory_store();
        let scheduler = scheduler_fixture(store.clone()).await;
        scheduler.start().await.unwrap();
        scheduler
            .add_task("recurring", "0 0 3 * * *", "nightly", "main", "")
            .await
            .unwrap();

        let id = store.load_scheduled_tasks().await.unwrap()[0].id;
        assert!(scheduler.remove_task(id).await.unwrap());
        assert!(store.load_scheduled_tasks().await.unwrap().is_empty());
        assert!(scheduler.inner.recurring.lock().await.is_empty());
        assert!(!scheduler.remove_task(id).await.unwrap());
    }

    #[tokio::test]
    async fn past_one_shot_fires_once_and_row_disappears() {
        let store = memory_store();
        // A spawn into a missing definition fails fast without needing the
        // chat endpoint, which keeps this test hermetic.
        store
            .save_scheduled_task("one-shot", "2000-01-01T00:00:00Z", "ping", "subagent", "ghost")
            .await
            .unwrap();

        let scheduler = scheduler_fixture(store.clone()).await;
        scheduler.start().await.unwrap();

        let mut remaining = 1;
        for _ in 0..100 {
            remaining = store.load_scheduled_tasks().await.unwrap().len();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert_eq!(remaining, 0, "missed one-shot should fire and be deleted");
    }

    #[tokio::test]
    async fn armed_one_shot_is_not_rearmed_by_reload() {
        let store = memory_store();
        let scheduler = scheduler_fixture(store.clone()).await;
        scheduler.start().await.unwrap();

        scheduler
            .add_task("one-shot", "2099-01-01T00:00:00Z", "ping", "main", "")
            .await
            .unwrap();
        scheduler
            .add_task("one-shot", "2099-06-01T00:00:00Z", "pong", "main", "")
            .await
            .unwrap();

        let armed = scheduler.inner.armed_one_shots.lock().await;
        assert_eq!(armed.len(), 2);
    }
}
