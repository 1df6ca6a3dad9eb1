use anyhow::Result;
use rusqlite::params;

use super::Store;

impl Store {
    /// Missing keys read as empty string; callers treat empty as unset.
    pub async fn setting(&self, key: &str) -> Result<String> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Ok(String::new()),
        }
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
