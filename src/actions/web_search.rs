//! Web 搜索动作：DuckDuckGo instant answer API
//!
//! 响应形状是外部契约，按缺省空值防御性解析；related_topics 只取前 3 条文本。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::actions::{Action, ActionKind};

pub struct WebSearchAction;

const DUCKDUCKGO_URL: &str = "https://api.duckduckgo.com/";

#[async_trait]
impl Action for WebSearchAction {
    fn id(&self) -> &str {
        "web_search"
    }

    fn name(&self) -> &str {
        "Web Search"
    }

    fn description(&self) -> &str {
        "Perform web searches using DuckDuckGo. Params: {\"query\": \"...\"}"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Api
    }

    fn uses_http(&self) -> bool {
        true
    }

    async fn run(&self, params: &Value, http: Option<&Client>) -> Result<Value, String> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Err("Query parameter is required".to_string());
        }
        let client = http.ok_or_else(|| "HTTP client not available".to_string())?;

        let data: Value = client
            .get(DUCKDUCKGO_URL)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| format!("Web search failed: {}", e))?
            .json()
            .await
            .map_err(|e| format!("Web search failed: {}", e))?;

        let field = |key: &str| {
            data.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let related_topics: Vec<String> = data
            .get("RelatedTopics")
            .and_then(|v| v.as_array())
            .map(|topics| {
                topics
                    .iter()
                    .take(3)
                    .map(|t| {
                        t.get("Text")
                            .and_then(|s| s.as_str())
                            .unwrap_or("")
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "query": query,
            "abstract": field("Abstract"),
            "answer": field("Answer"),
            "definition": field("Definition"),
            "related_topics": related_topics,
        }))
    }
}
