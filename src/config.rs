use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Application settings as a flat KEY=VALUE map. Reads vastly outnumber
/// writes (reloads and in-place updates are rare), so a read-write lock
/// keeps readers from blocking each other.
pub struct Config {
    settings: RwLock<HashMap<String, String>>,
}

impl Config {
    /// Loads the file if it exists; a missing or unreadable file leaves the
    /// defaults in place.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let config = Self {
            settings: RwLock::new(HashMap::new()),
        };
        if let Err(e) = config.reload(&path) {
            tracing::warn!(
                "could not load config {}: {}. Using defaults.",
                path.as_ref().display(),
                e
            );
        }
        config
    }

    pub fn reload<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
        settings.insert("MODEL".to_string(), "llama3.1".to_string());
        settings.insert("CHAT_URL".to_string(), "http://localhost:11434".to_string());

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                settings.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Ok(())
    }

    /// Empty string when the key is unset.
    pub fn get(&self, key: &str) -> String {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        settings.get(key).cloned().unwrap_or_default()
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        match settings.get(key) {
            Some(value) => value.clone(),
            None => default.to_string(),
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
        settings.insert(key.to_string(), value.to_string());
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        let mut lines: Vec<String> = settings
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        lines.sort();
        std::fs::write(path, lines.join("\n"))?;
        Ok(())
    }
}
