//! 动作注册表
//!
//! 所有动作实现 Action trait（id / name / description / kind / run），由 ActionRegistry
//! 按 id 注册与查找。执行走结构化报告：未知 id、禁用、外部调用失败都以
//! status = "error" 的 ExecutionReport 返回，不抛错；每次完成的执行尝试
//! （成功或被捕获的失败）都会推进该动作的 execution_count 与 last_execution。
//!
//! 出站 HTTP 客户端是注册表级的共享资源：首次需要时惰性创建，shutdown 时释放；
//! 需要它的动作通过 uses_http 显式声明（能力接口，替代运行时探测）。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::actions::{
    HttpRequestAction, SystemInfoAction, TimeAction, WeatherAction, WebSearchAction,
};
use crate::core::ExecutionReport;

/// 动作类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Api,
    Webhook,
    Function,
}

/// 动作 trait：标识、描述、类别、HTTP 能力声明、异步执行（params 为 JSON）
#[async_trait]
pub trait Action: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn kind(&self) -> ActionKind {
        ActionKind::Api
    }

    /// 是否需要共享出站 HTTP 客户端；声明 true 的动作在执行时拿到 Some(client)
    fn uses_http(&self) -> bool {
        false
    }

    /// 执行动作：校验参数、做一次外部调用或纯计算，把结果映射为固定形状。
    /// 失败以 Err(message) 返回，由注册表折叠进报告；没有重试与退避。
    async fn run(&self, params: &Value, http: Option<&Client>) -> Result<Value, String>;
}

/// 动作描述符（list / describe 的快照记录）
#[derive(Debug, Clone, Serialize)]
pub struct ActionDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: ActionKind,
    pub enabled: bool,
    pub execution_count: u64,
    pub last_execution: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

struct ActionEntry {
    handler: Arc<dyn Action>,
    enabled: bool,
    created_at: DateTime<Utc>,
    execution_count: u64,
    last_execution: Option<DateTime<Utc>>,
}

impl ActionEntry {
    fn new(handler: Arc<dyn Action>) -> Self {
        Self {
            handler,
            enabled: true,
            created_at: Utc::now(),
            execution_count: 0,
            last_execution: None,
        }
    }

    fn descriptor(&self) -> ActionDescriptor {
        ActionDescriptor {
            id: self.handler.id().to_string(),
            name: self.handler.name().to_string(),
            description: self.handler.description().to_string(),
            kind: self.handler.kind(),
            enabled: self.enabled,
            execution_count: self.execution_count,
            last_execution: self.last_execution,
            created_at: self.created_at,
        }
    }
}

/// 动作注册表：按 id 存储条目与执行计数，持有共享出站 HTTP 客户端
#[derive(Default)]
pub struct ActionRegistry {
    entries: RwLock<HashMap<String, ActionEntry>>,
    http: RwLock<Option<Client>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建注册表并注册五个内置动作
    pub fn with_defaults() -> Self {
        let mut map = HashMap::new();
        for handler in [
            Arc::new(WebSearchAction) as Arc<dyn Action>,
            Arc::new(HttpRequestAction),
            Arc::new(WeatherAction),
            Arc::new(TimeAction),
            Arc::new(SystemInfoAction),
        ] {
            map.insert(handler.id().to_string(), ActionEntry::new(handler));
        }
        Self {
            entries: RwLock::new(map),
            http: RwLock::new(None),
        }
    }

    /// 注册动作：id 已存在时不改动注册表并返回 false
    pub async fn register(&self, handler: impl Action + 'static) -> bool {
        let id = handler.id().to_string();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            tracing::warn!(action = %id, "action already exists");
            return false;
        }
        tracing::info!(action = %id, name = %handler.name(), "registered action");
        entries.insert(id, ActionEntry::new(Arc::new(handler)));
        true
    }

    /// 注销动作：id 不存在时返回 false
    pub async fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(id) {
            Some(entry) => {
                tracing::info!(action = %id, name = %entry.handler.name(), "unregistered action");
                true
            }
            None => {
                tracing::warn!(action = %id, "action not found");
                false
            }
        }
    }

    pub async fn enable(&self, id: &str) -> bool {
        self.set_enabled(id, true).await
    }

    pub async fn disable(&self, id: &str) -> bool {
        self.set_enabled(id, false).await
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) => {
                entry.enabled = enabled;
                tracing::info!(action = %id, enabled, "action toggled");
                true
            }
            None => false,
        }
    }

    /// 执行动作：查找、校验启用状态、注入共享 HTTP 客户端（若声明需要）、
    /// 执行并在尝试结束后推进计数器
    pub async fn execute(&self, id: &str, params: Value) -> ExecutionReport {
        let handler = {
            let entries = self.entries.read().await;
            match entries.get(id) {
                None => {
                    return ExecutionReport::failed(id, format!("Action {} not found", id));
                }
                Some(entry) if !entry.enabled => {
                    return ExecutionReport::failed(id, format!("Action {} is disabled", id));
                }
                Some(entry) => entry.handler.clone(),
            }
        };

        tracing::info!(action = %id, "executing action");

        let http = if handler.uses_http() {
            Some(self.http_client().await)
        } else {
            None
        };

        let outcome = handler.run(&params, http.as_ref()).await;

        let executed_at = Utc::now();
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(id) {
                entry.execution_count += 1;
                entry.last_execution = Some(executed_at);
            }
        }

        match outcome {
            Ok(result) => ExecutionReport::completed(id, executed_at, result),
            Err(e) => {
                tracing::error!(action = %id, error = %e, "action failed");
                ExecutionReport::failed(id, e)
            }
        }
    }

    /// 所有动作的描述符快照
    pub async fn list(&self) -> Vec<ActionDescriptor> {
        let entries = self.entries.read().await;
        entries.values().map(ActionEntry::descriptor).collect()
    }

    pub async fn describe(&self, id: &str) -> Option<ActionDescriptor> {
        let entries = self.entries.read().await;
        entries.get(id).map(ActionEntry::descriptor)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 共享出站客户端：首次需要时创建，之后复用
    async fn http_client(&self) -> Client {
        if let Some(client) = self.http.read().await.as_ref() {
            return client.clone();
        }
        let mut guard = self.http.write().await;
        if let Some(client) = guard.as_ref() {
            return client.clone();
        }
        let client = Client::builder()
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        *guard = Some(client.clone());
        tracing::info!("outbound HTTP client created");
        client
    }

    /// 释放共享客户端；下次执行需要时会重新创建
    pub async fn shutdown(&self) {
        if self.http.write().await.take().is_some() {
            tracing::info!("outbound HTTP client released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopAction;

    #[async_trait]
    impl Action for NoopAction {
        fn id(&self) -> &str {
            "noop"
        }
        fn name(&self) -> &str {
            "Noop"
        }
        fn description(&self) -> &str {
            "Does nothing"
        }
        fn kind(&self) -> ActionKind {
            ActionKind::Function
        }
        async fn run(&self, _params: &Value, _http: Option<&Client>) -> Result<Value, String> {
            Ok(json!("ok"))
        }
    }

    struct FailingAction;

    #[async_trait]
    impl Action for FailingAction {
        fn id(&self) -> &str {
            "failing"
        }
        fn name(&self) -> &str {
            "Failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        async fn run(&self, _params: &Value, _http: Option<&Client>) -> Result<Value, String> {
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let registry = ActionRegistry::new();
        assert!(registry.register(NoopAction).await);
        assert!(!registry.register(NoopAction).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.list().await.iter().any(|d| d.id == "noop"));
    }

    #[tokio::test]
    async fn test_unregister_absent_fails() {
        let registry = ActionRegistry::new();
        assert!(!registry.unregister("noop").await);
        registry.register(NoopAction).await;
        assert!(registry.unregister("noop").await);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_execute_unknown_id_is_structured_error() {
        let registry = ActionRegistry::new();
        let report = registry.execute("does_not_exist", json!({})).await;
        assert!(!report.is_completed());
        assert!(report.error.unwrap().contains("does_not_exist"));
    }

    #[tokio::test]
    async fn test_disabled_action_fails_closed_and_reenables() {
        let registry = ActionRegistry::new();
        registry.register(NoopAction).await;
        registry.disable("noop").await;

        let report = registry.execute("noop", json!({})).await;
        assert!(report.error.unwrap().contains("disabled"));

        registry.enable("noop").await;
        let report = registry.execute("noop", json!({})).await;
        assert!(report.is_completed());
    }

    #[tokio::test]
    async fn test_counters_advance_on_success_and_failure() {
        let registry = ActionRegistry::new();
        registry.register(NoopAction).await;
        registry.register(FailingAction).await;

        let before = Utc::now();
        registry.execute("noop", json!({})).await;
        registry.execute("noop", json!({})).await;
        registry.execute("failing", json!({})).await;

        let noop = registry.describe("noop").await.unwrap();
        assert_eq!(noop.execution_count, 2);
        assert!(noop.last_execution.unwrap() >= before);

        let failing = registry.describe("failing").await.unwrap();
        assert_eq!(failing.execution_count, 1);
        assert!(failing.last_execution.is_some());
    }

    #[tokio::test]
    async fn test_defaults_registered() {
        let registry = ActionRegistry::with_defaults();
        for id in ["web_search", "http_request", "weather", "time", "system_info"] {
            assert!(registry.describe(id).await.is_some(), "missing {id}");
        }
    }
}
