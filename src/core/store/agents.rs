use anyhow::Result;
use rusqlite::params;

use super::types::{SubAgentDefinitionRecord, TaskRunRecord};
use super::Store;

impl Store {
    /// Persist a new task run in `running` state. This happens before the
    /// background future is spawned so listings always see the run.
    pub async fn save_sub_agent(
        &self,
        id: &str,
        prompt: &str,
        status: &str,
        personality: &str,
        model: &str,
    ) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT INTO sub_agents (id, prompt, status, progress, personality, model) \
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![id, prompt, status, personality, model],
        )?;
        Ok(())
    }

    /// Terminal transition. One statement sets status, result, full
    /// progress, and the finish stamp together.
    pub async fn update_sub_agent(&self, id: &str, status: &str, result: &str) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "UPDATE sub_agents SET status = ?1, result = ?2, progress = 100, \
             finished_at = CURRENT_TIMESTAMP WHERE id = ?3",
            params![status, result, id],
        )?;
        Ok(())
    }

    pub async fn update_sub_agent_progress(&self, id: &str, progress: i64) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "UPDATE sub_agents SET progress = ?1 WHERE id = ?2",
            params![progress, id],
        )?;
        Ok(())
    }

    pub async fn sub_agents(&self) -> Result<Vec<TaskRunRecord>> {
        self.query_sub_agents(None).await
    }

    pub async fn active_sub_agents(&self) -> Result<Vec<TaskRunRecord>> {
        self.query_sub_agents(Some("running")).await
    }

    async fn query_sub_agents(&self, status: Option<&str>) -> Result<Vec<TaskRunRecord>> {
        let db = self.db().lock().await;
        let sql_all = "SELECT id, prompt, status, progress, COALESCE(result, ''), model, \
             personality, created_at, finished_at FROM sub_agents ORDER BY created_at DESC, id DESC";
        let sql_filtered = "SELECT id, prompt, status, progress, COALESCE(result, ''), model, \
             personality, created_at, finished_at FROM sub_agents WHERE status = ?1 \
             ORDER BY created_at DESC, id DESC";

        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(TaskRunRecord {
                id: row.get(0)?,
                prompt: row.get(1)?,
                status: row.get(2)?,
                progress: row.get(3)?,
                result: row.get(4)?,
                model: row.get(5)?,
                personality: row.get(6)?,
                created_at: row.get(7)?,
                finished_at: row.get(8)?,
            })
        };

        let mut runs = Vec::new();
        match status {
            Some(s) => {
                let mut stmt = db.prepare(sql_filtered)?;
                let rows = stmt.query_map(params![s], map_row)?;
                for row in rows {
                    runs.push(row?);
                }
            }
            None => {
                let mut stmt = db.prepare(sql_all)?;
                let rows = stmt.query_map([], map_row)?;
                for row in rows {
                    runs.push(row?);
                }
            }
        }
        Ok(runs)
    }

    pub async fn save_sub_agent_definition(
        &self,
        name: &str,
        personality: &str,
        tools: &str,
        model: &str,
    ) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT OR REPLACE INTO sub_agent_definitions (name, personality, tools, model) \
             VALUES (?1, ?2, ?3, ?4)",
            params![name, personality, tools, model],
        )?;
        Ok(())
    }

    pub async fn sub_agent_definition(
        &self,
        name: &str,
    ) -> Result<Option<SubAgentDefinitionRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT name, personality, tools, model FROM sub_agent_definitions WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map(params![name], |row| {
            Ok(SubAgentDefinitionRecord {
                name: row.get(0)?,
                personality: row.get(1)?,
                tools: row.get(2)?,
                model: row.get(3)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn sub_agent_definitions(&self) -> Result<Vec<SubAgentDefinitionRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT name, personality, tools, model FROM sub_agent_definitions ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubAgentDefinitionRecord {
                name: row.get(0)?,
                personality: row.get(1)?,
                tools: row.get(2)?,
                model: row.get(3)?,
            })
        })?;

        let mut defs = Vec::new();
        for row in rows {
            defs.push(row?);
        }
        Ok(defs)
    }
}
