//! 天气动作：wttr.in JSON 接口

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::actions::{Action, ActionKind};

pub struct WeatherAction;

#[async_trait]
impl Action for WeatherAction {
    fn id(&self) -> &str {
        "weather"
    }

    fn name(&self) -> &str {
        "Weather Info"
    }

    fn description(&self) -> &str {
        "Get weather information for a location. Params: {\"location\": \"...\"}"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Api
    }

    fn uses_http(&self) -> bool {
        true
    }

    async fn run(&self, params: &Value, http: Option<&Client>) -> Result<Value, String> {
        let location = params
            .get("location")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if location.is_empty() {
            return Err("Location parameter is required".to_string());
        }
        let client = http.ok_or_else(|| "HTTP client not available".to_string())?;

        let url = format!("https://wttr.in/{}?format=j1", location);
        let data: Value = client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Weather lookup failed: {}", e))?
            .json()
            .await
            .map_err(|e| format!("Weather lookup failed: {}", e))?;

        // current_condition 是单元素数组；字段缺失时给空串
        let current = data
            .get("current_condition")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or_else(|| json!({}));
        let field = |key: &str| {
            current
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let condition = current
            .get("weatherDesc")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|d| d.get("value"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Ok(json!({
            "location": location,
            "temperature": field("temp_C"),
            "condition": condition,
            "humidity": field("humidity"),
            "wind_speed": field("windspeedKmph"),
        }))
    }
}
