use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, Utc};

use super::Tool;

pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "time"
    }

    fn description(&self) -> String {
        "Returns the current date and time. Input: ignored.".to_string()
    }

    async fn invoke(&self, _input: &str) -> Result<String> {
        Ok(format!(
            "Local: {} | UTC: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ))
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({ "title": "Current Time", "fields": [] })
    }
}
