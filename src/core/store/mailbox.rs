use anyhow::Result;
use rusqlite::params;

use super::types::AgentMessageRecord;
use super::Store;

impl Store {
    pub async fn send_agent_message(&self, from: &str, to: &str, content: &str) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT INTO agent_messages (from_agent, to_agent, content) VALUES (?1, ?2, ?3)",
            params![from, to, content],
        )?;
        Ok(())
    }

    pub async fn unread_messages(&self, to: &str) -> Result<Vec<AgentMessageRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, from_agent, to_agent, content, created_at FROM agent_messages \
             WHERE to_agent = ?1 AND read = 0 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![to], |row| {
            Ok(AgentMessageRecord {
                id: row.get(0)?,
                from_agent: row.get(1)?,
                to_agent: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Safe to rerun; already-read rows stay read.
    pub async fn mark_messages_read(&self, to: &str) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "UPDATE agent_messages SET read = 1 WHERE to_agent = ?1 AND read = 0",
            params![to],
        )?;
        Ok(())
    }
}
