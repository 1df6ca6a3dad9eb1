use anyhow::Result;
use rusqlite::params;

use super::types::WebhookRecord;
use super::Store;

impl Store {
    pub async fn save_webhook(
        &self,
        id: &str,
        name: &str,
        target_agent: &str,
        prompt_template: &str,
    ) -> Result<()> {
        let target_agent = if target_agent.is_empty() {
            "main"
        } else {
            target_agent
        };
        let db = self.db().lock().await;
        db.execute(
            "INSERT OR REPLACE INTO webhooks (id, name, target_agent, prompt_template) \
             VALUES (?1, ?2, ?3, ?4)",
            params![id, name, target_agent, prompt_template],
        )?;
        Ok(())
    }

    pub async fn webhook(&self, id: &str) -> Result<Option<WebhookRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, name, target_agent, prompt_template, created_at FROM webhooks WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(WebhookRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                target_agent: row.get(2)?,
                prompt_template: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn webhooks(&self) -> Result<Vec<WebhookRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare(
            "SELECT id, name, target_agent, prompt_template, created_at FROM webhooks",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WebhookRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                target_agent: row.get(2)?,
                prompt_template: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut hooks = Vec::new();
        for row in rows {
            hooks.push(row?);
        }
        Ok(hooks)
    }

    pub async fn delete_webhook(&self, id: &str) -> Result<bool> {
        let db = self.db().lock().await;
        let deleted = db.execute("DELETE FROM webhooks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::memory_store;

    #[tokio::test]
    async fn webhook_roundtrip_and_delete() {
        let store = memory_store();
        store
            .save_webhook("abc", "ci", "main", "echo {{payload}} please")
            .await
            .unwrap();

        let hook = store.webhook("abc").await.unwrap().unwrap();
        assert_eq!(hook.name, "ci");
        assert_eq!(hook.target_agent, "main");
        assert!(hook.prompt_template.contains("{{payload}}"));

        assert!(store.webhook("nope").await.unwrap().is_none());
        assert!(store.delete_webhook("abc").await.unwrap());
        assert!(!store.delete_webhook("abc").await.unwrap());
    }

    #[tokio::test]
    async fn empty_target_defaults_to_main() {
        let store = memory_store();
        store.save_webhook("h1", "hook", "", "{{payload}}").await.unwrap();
        let hook = store.webhook("h1").await.unwrap().unwrap();
        assert_eq!(hook.target_agent, "main");
    }
}
