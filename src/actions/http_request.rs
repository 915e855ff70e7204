//! 通用 HTTP 请求动作
//!
//! 任意方法 + URL + 头 + JSON 体；响应体截断到 1000 字符。

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use crate::actions::{Action, ActionKind};

/// 响应体保留的最大字符数
const MAX_BODY_CHARS: usize = 1000;

pub struct HttpRequestAction;

#[async_trait]
impl Action for HttpRequestAction {
    fn id(&self) -> &str {
        "http_request"
    }

    fn name(&self) -> &str {
        "HTTP Request"
    }

    fn description(&self) -> &str {
        "Make HTTP requests to external APIs. Params: {\"url\": \"...\", \"method\": \"GET\", \"headers\": {}, \"data\": {}}"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Api
    }

    fn uses_http(&self) -> bool {
        true
    }

    async fn run(&self, params: &Value, http: Option<&Client>) -> Result<Value, String> {
        let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");
        if url.is_empty() {
            return Err("URL parameter is required".to_string());
        }
        let client = http.ok_or_else(|| "HTTP client not available".to_string())?;

        let method = params
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| format!("Invalid HTTP method: {}", method))?;

        let mut request = client.request(method, url);
        if let Some(headers) = params.get("headers").and_then(|v| v.as_object()) {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key, value);
                }
            }
        }
        if let Some(data) = params.get("data") {
            if !data.is_null() {
                request = request.json(data);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status_code = response.status().as_u16();
        let headers: serde_json::Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), Value::String(v.to_string())))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;
        let body: String = body.chars().take(MAX_BODY_CHARS).collect();

        Ok(json!({
            "status_code": status_code,
            "headers": headers,
            "data": body,
        }))
    }
}
