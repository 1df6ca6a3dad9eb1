use anyhow::Result;
use rusqlite::params;

use super::types::ScheduledTaskRecord;
use super::Store;

impl Store {
    pub async fn save_scheduled_task(
        &self,
        task_type: &str,
        schedule: &str,
        prompt: &str,
        target_type: &str,
        target_name: &str,
    ) -> Result<()> {
        let target_type = if target_type.is_empty() {
            "main"
        } else {
            target_type
        };
        let db = self.db().lock().await;
        db.execute(
            "INSERT INTO scheduled_tasks (task_type, schedule, prompt, target_type, target_name) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![task_type, schedule, prompt, target_type, target_name],
        )?;
        Ok(())
    }

    pub async fn load_scheduled_tasks(&self) -> Result<Vec<ScheduledTaskRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, task_type, schedule, prompt, target_type, target_name, last_run \
             FROM scheduled_tasks ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ScheduledTaskRecord {
                id: row.get(0)?,
                task_type: row.get(1)?,
                schedule: row.get(2)?,
                prompt: row.get(3)?,
                target_type: row.get(4)?,
                target_name: row.get(5)?,
                last_run: row.get(6)?,
            })
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    pub async fn update_task_last_run(&self, id: i64) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "UPDATE scheduled_tasks SET last_run = CURRENT_TIMESTAMP WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub async fn delete_task(&self, id: i64) -> Result<bool> {
        let db = self.db().lock().await;
        let deleted = db.execute("DELETE FROM scheduled_tasks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
