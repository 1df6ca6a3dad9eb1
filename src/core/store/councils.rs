use anyhow::Result;
use rusqlite::params;

use super::types::CouncilRecord;
use super::Store;

impl Store {
    pub async fn save_council(&self, name: &str, members: &str) -> Result<()> {
        let db = self.db().lock().await;
        db.execute(
            "INSERT OR REPLACE INTO councils (name, members) VALUES (?1, ?2)",
            params![name, members],
        )?;
        Ok(())
    }

    pub async fn council(&self, name: &str) -> Result<Option<CouncilRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare("SELECT name, members FROM councils WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name], |row| {
            Ok(CouncilRecord {
                name: row.get(0)?,
                members: row.get(1)?,
            })
        })?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn councils(&self) -> Result<Vec<CouncilRecord>> {
        let db = self.db().lock().await;
        let mut stmt = db.prepare("SELECT name, members FROM councils ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(CouncilRecord {
                name: row.get(0)?,
                members: row.get(1)?,
            })
        })?;

        let mut councils = Vec::new();
        for row in rows {
            councils.push(row?);
        }
        Ok(councils)
    }
}
