use anyhow::Result;
use rusqlite::params;

use super::types::{ActivityRecord, MessageRecord};
use super::Store;

impl Store {
    pub async fn save_message(&self, role: &str, content: &str) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT INTO messages (role, content) VALUES (?1, ?2)",
            params![role, content],
        )?;
        Ok(())
    }

    /// The most recent `limit` messages in chronological order.
    pub async fn load_last_messages(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, role, content, timestamp FROM messages ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(MessageRecord {
                id: row.get(0)?,
                role: row.get(1)?,
                content: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?;

        let mut msgs = Vec::new();
        for row in rows {
            msgs.push(row?);
        }
        msgs.reverse();
        Ok(msgs)
    }

    /// The oldest `limit` messages, used by history compaction.
    pub async fn oldest_messages(&self, limit: usize) -> Result<Vec<MessageRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, role, content, timestamp FROM messages ORDER BY id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(MessageRecord {
                id: row.get(0)?,
                role: row.get(1)?,
                content: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?;

        let mut msgs = Vec::new();
        for row in rows {
            msgs.push(row?);
        }
        Ok(msgs)
    }

    pub async fn delete_messages(&self, ids: &[i64]) -> Result<()> {
        let mut db = self.db().lock().await;
        let tx = db.transaction()?;
        for id in ids {
            tx.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Swap a contiguous prefix of the log for one system-role summary. The
    /// summary takes over the oldest deleted row's id and timestamp, so it
    /// prefaces the surviving suffix and order-by-id stays order-by-time.
    pub async fn replace_messages_with_summary(&self, ids: &[i64], summary: &str) -> Result<()> {
        let slot_id = match ids.iter().min() {
            Some(id) => *id,
            None => return Ok(()),
        };

        let mut db = self.db().lock().await;
        let tx = db.transaction()?;
        let slot_timestamp: String = tx.query_row(
            "SELECT timestamp FROM messages WHERE id = ?1",
            params![slot_id],
            |row| row.get(0),
        )?;
        for id in ids {
            tx.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        }
        tx.execute(
            "INSERT INTO messages (id, role, content, timestamp) VALUES (?1, 'system', ?2, ?3)",
            params![slot_id, summary, slot_timestamp],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Last-24h user messages and background spawns, newest first, for the
    /// `/history` endpoint.
    pub async fn recent_activity(&self) -> Result<Vec<ActivityRecord>> {
        let db = self.db().lock().await;
        let mut activities = Vec::new();

        let mut stmt = db.prepare(
            "SELECT timestamp, content FROM messages \
             WHERE role = 'user' AND timestamp > datetime('now', '-1 day') \
             ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (timestamp, content) = row?;
            activities.push(ActivityRecord {
                timestamp,
                title: clip_title(&content),
                kind: "task".to_string(),
            });
        }

        let mut stmt = db.prepare(
            "SELECT created_at, prompt FROM sub_agents \
             WHERE created_at > datetime('now', '-1 day') \
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (timestamp, prompt) = row?;
            activities.push(ActivityRecord {
                timestamp,
                title: clip_title(&prompt),
                kind: "sub-agent".to_string(),
            });
        }

        Ok(activities)
    }
}

fn clip_title(content: &str) -> String {
    const MAX: usize = 30;
    if content.chars().count() > MAX {
        let head: String = content.chars().take(MAX - 3).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::memory_store;
    use super::clip_title;

    #[tokio::test]
    async fn messages_keep_insertion_order() {
        let store = memory_store();
        store.save_message("user", "first").await.unwrap();
        store.save_message("assistant", "second").await.unwrap();
        store.save_message("user", "third").await.unwrap();

        let msgs = store.load_last_messages(10).await.unwrap();
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);

        // Order by id equals order by timestamp.
        let mut by_ts = msgs.clone();
        by_ts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        let ids: Vec<i64> = msgs.iter().map(|m| m.id).collect();
        let ts_ids: Vec<i64> = by_ts.iter().map(|m| m.id).collect();
        assert_eq!(ids, ts_ids);
    }

    #[tokio::test]
    async fn load_last_messages_returns_only_tail() {
        let store = memory_store();
        for i in 0..5 {
            store.save_message("user", &format!("m{}", i)).await.unwrap();
        }
        let msgs = store.load_last_messages(2).await.unwrap();
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn delete_messages_removes_exactly_the_given_rows() {
        let store = memory_store();
        for i in 0..4 {
            store.save_message("user", &format!("m{}", i)).await.unwrap();
        }
        let msgs = store.oldest_messages(2).await.unwrap();
        let ids: Vec<i64> = msgs.iter().map(|m| m.id).collect();
        store.delete_messages(&ids).await.unwrap();

        let remaining = store.load_last_messages(10).await.unwrap();
        let contents: Vec<&str> = remaining.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn summary_takes_over_the_prefix_slot() {
        let store = memory_store();
        for i in 0..6 {
            store.save_message("user", &format!("m{}", i)).await.unwrap();
        }
        let prefix = store.oldest_messages(4).await.unwrap();
        let ids: Vec<i64> = prefix.iter().map(|m| m.id).collect();

        store
            .replace_messages_with_summary(&ids, "Summary of previous conversation: recap")
            .await
            .unwrap();

        let log = store.load_last_messages(10).await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].role, "system");
        assert!(log[0].content.contains("recap"));
        assert_eq!(log[1].content, "m4");
        assert_eq!(log[2].content, "m5");
        // The summary inherits the oldest slot, so id order still matches
        // timestamp order.
        assert!(log[0].id < log[1].id);
        assert!(log[0].timestamp <= log[1].timestamp);
    }

    #[test]
    fn clip_title_shortens_long_content() {
        let long = "x".repeat(50);
        let title = clip_title(&long);
        assert_eq!(title.chars().count(), 30);
        assert!(title.ends_with("..."));
        assert_eq!(clip_title("short"), "short");
    }
}
