use anyhow::Result;
use rusqlite::params;

use super::types::MemoryRecord;
use super::Store;

impl Store {
    pub async fn save_memory(&self, content: &str, kind: &str, tags: &str) -> Result<()> {
        let kind = if kind.is_empty() { "fact" } else { kind };
        let db = self.db().lock().await;
        db.execute(
            "INSERT INTO memories (content, kind, tags) VALUES (?1, ?2, ?3)",
            params![content, kind, tags],
        )?;
        Ok(())
    }

    /// LIKE search over content and tags, newest first. An empty query
    /// matches everything.
    pub async fn search_memories(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let pattern = format!("%{}%", query);
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, content, kind, tags, created_at FROM memories \
             WHERE content LIKE ?1 OR tags LIKE ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            Ok(MemoryRecord {
                id: row.get(0)?,
                content: row.get(1)?,
                kind: row.get(2)?,
                tags: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut memories = Vec::new();
        for row in rows {
            memories.push(row?);
        }
        Ok(memories)
    }

    pub async fn all_memories(&self) -> Result<Vec<MemoryRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, content, kind, tags, created_at FROM memories \
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MemoryRecord {
                id: row.get(0)?,
                content: row.get(1)?,
                kind: row.get(2)?,
                tags: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut memories = Vec::new();
        for row in rows {
            memories.push(row?);
        }
        Ok(memories)
    }

    pub async fn delete_memory(&self, id: i64) -> Result<bool> {
        let db = self.db().lock().await;
        let deleted = db.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
