//! 时间/日期动作（纯计算）

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::{json, Value};

use crate::actions::{Action, ActionKind};

pub struct TimeAction;

#[async_trait]
impl Action for TimeAction {
    fn id(&self) -> &str {
        "time"
    }

    fn name(&self) -> &str {
        "Time & Date"
    }

    fn description(&self) -> &str {
        "Get current time and date information. No params required."
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Function
    }

    async fn run(&self, _params: &Value, _http: Option<&Client>) -> Result<Value, String> {
        let now = Local::now();
        Ok(json!({
            "current_time": now.format("%H:%M:%S").to_string(),
            "current_date": now.format("%Y-%m-%d").to_string(),
            "day_of_week": now.format("%A").to_string(),
            "timestamp": now.to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_time_shape() {
        let report = TimeAction.run(&json!({}), None).await.unwrap();
        let time = report["current_time"].as_str().unwrap();
        // HH:MM:SS
        let parts: Vec<&str> = time.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit())));
        assert_eq!(report["current_date"].as_str().unwrap().len(), 10);
    }
}
