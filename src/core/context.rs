//! 组合上下文：桥的全部内部状态
//!
//! BridgeContext 是显式传递的组合对象：Agent、动作/任务注册表、会话表、
//! 出站通知通道。编排器拥有它（Arc），监听器持非拥有的 Weak 反向引用。
//! 所有跨任务共享都经由 tokio 锁；处理路径内的任何失败都折叠成
//! 用户可见的道歉字符串，消息循环本身绝不因单条坏消息而崩溃。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::actions::ActionRegistry;
use crate::agent::ConversationAgent;
use crate::core::{session_key, ExecutionReport, SessionRecord};
use crate::llm::Message;
use crate::tasks::{RegistryInfo, TaskRegistry};

/// 道歉前缀：agent 处理路径上被捕获的故障以它开头返回给用户
pub const APOLOGY_PREFIX: &str =
    "I apologize, but I encountered an error processing your message";

/// 经由通知通道发往聊天平台的出站消息
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
}

/// 健康检查聚合
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub orchestrator: bool,
    pub agent: bool,
    pub telegram: bool,
    pub task_registry: bool,
    pub action_registry: bool,
    pub active_sessions: usize,
}

/// 桥接上下文：编排器拥有的组合根
pub struct BridgeContext {
    agent: RwLock<ConversationAgent>,
    pub actions: ActionRegistry,
    pub tasks: TaskRegistry,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    running: AtomicBool,
    listener_connected: AtomicBool,
    notifier: RwLock<Option<mpsc::UnboundedSender<OutboundMessage>>>,
}

impl BridgeContext {
    pub fn new(agent: ConversationAgent, actions: ActionRegistry, tasks: TaskRegistry) -> Self {
        Self {
            agent: RwLock::new(agent),
            actions,
            tasks,
            sessions: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            listener_connected: AtomicBool::new(false),
            notifier: RwLock::new(None),
        }
    }

    /// 主消息处理管线：定位/创建会话、计数、Agent 调用、记录回复。
    /// 任何失败都以道歉字符串返回，调用方不会看到未处理的故障。
    pub async fn handle_message(&self, text: &str, user_id: &str, chat_id: &str) -> String {
        let key = session_key(user_id, chat_id);
        {
            let mut sessions = self.sessions.write().await;
            let record = sessions
                .entry(key.clone())
                .or_insert_with(|| SessionRecord::new(user_id, chat_id));
            record.message_count += 1;
            record.last_message = Some(text.to_string());
        }

        // 后端调用在锁外进行：一次慢补全不得阻塞 /history 等只读路径
        let (backend, messages) = {
            let agent = self.agent.read().await;
            (agent.backend(), agent.compose_request(text))
        };

        let reply = match backend.run(&messages).await {
            Ok(raw) => self.agent.write().await.accept_reply(text, &raw),
            Err(e) => {
                tracing::error!(user = %user_id, error = %e, "agent processing failed");
                format!("{}: {}", APOLOGY_PREFIX, e)
            }
        };

        {
            let mut sessions = self.sessions.write().await;
            if let Some(record) = sessions.get_mut(&key) {
                record.last_response = Some(reply.clone());
            }
        }

        reply
    }

    /// 动作执行的纯委托
    pub async fn execute_action(&self, id: &str, params: Value) -> ExecutionReport {
        self.actions.execute(id, params).await
    }

    /// 任务的手动执行；把自身作为上下文传给任务
    pub async fn execute_task(&self, id: &str) -> ExecutionReport {
        self.tasks.execute(id, Some(self)).await
    }

    pub async fn health_check(&self) -> HealthReport {
        HealthReport {
            orchestrator: self.running.load(Ordering::Relaxed),
            agent: true,
            telegram: self.listener_connected.load(Ordering::Relaxed),
            task_registry: self.tasks.is_running(),
            action_registry: !self.actions.is_empty().await,
            active_sessions: self.sessions.read().await.len(),
        }
    }

    pub async fn session_data(&self, user_id: &str, chat_id: &str) -> Option<SessionRecord> {
        let sessions = self.sessions.read().await;
        sessions.get(&session_key(user_id, chat_id)).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Agent 转录快照（监听器 /history 用）
    pub async fn transcript(&self) -> Vec<Message> {
        self.agent.read().await.transcript().to_vec()
    }

    pub async fn model_info(&self) -> Value {
        self.agent.read().await.model_info()
    }

    pub async fn tasks_info(&self) -> RegistryInfo {
        self.tasks.registry_info().await
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn set_listener_connected(&self, connected: bool) {
        self.listener_connected.store(connected, Ordering::Relaxed);
    }

    /// 监听器在启动时注册出站通道；NotificationTask 经由它发送
    pub async fn set_notifier(&self, tx: mpsc::UnboundedSender<OutboundMessage>) {
        *self.notifier.write().await = Some(tx);
    }

    pub async fn clear_notifier(&self) {
        *self.notifier.write().await = None;
    }

    /// 主动外发一条消息；没有已注册的通道时返回 Err
    pub async fn notify(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let guard = self.notifier.read().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(OutboundMessage {
                    chat_id: chat_id.to_string(),
                    text: text.to_string(),
                })
                .map_err(|_| "Messaging integration has shut down".to_string()),
            None => Err("No messaging integration available".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::llm::{ChatBackend, MockBackend};
    use crate::tasks::TaskRegistry;

    struct BrokenBackend;

    #[async_trait]
    impl ChatBackend for BrokenBackend {
        async fn run(&self, _messages: &[Message]) -> Result<Value, String> {
            Err("connection reset".to_string())
        }
    }

    fn context_with(backend: Arc<dyn ChatBackend>) -> BridgeContext {
        BridgeContext::new(
            ConversationAgent::new(backend, None),
            ActionRegistry::with_defaults(),
            TaskRegistry::default(),
        )
    }

    #[tokio::test]
    async fn test_handle_message_tracks_session() {
        let ctx = context_with(Arc::new(MockBackend));

        ctx.handle_message("first", "u1", "c1").await;
        let created_at = ctx.session_data("u1", "c1").await.unwrap().created_at;

        ctx.handle_message("second", "u1", "c1").await;
        let record = ctx.session_data("u1", "c1").await.unwrap();
        assert_eq!(record.message_count, 2);
        assert_eq!(record.created_at, created_at);
        assert_eq!(record.last_message.as_deref(), Some("second"));
        assert!(record.last_response.is_some());

        // 另一个 user+chat 是独立的会话
        ctx.handle_message("hi", "u2", "c1").await;
        assert_eq!(ctx.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_backend_fault_becomes_apology_string() {
        let ctx = context_with(Arc::new(BrokenBackend));
        let reply = ctx.handle_message("hello", "u1", "c1").await;
        assert!(reply.starts_with(APOLOGY_PREFIX));
        assert!(reply.contains("connection reset"));
        // 会话仍然被记录
        assert_eq!(ctx.session_data("u1", "c1").await.unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn test_execute_action_delegation() {
        let ctx = context_with(Arc::new(MockBackend));
        let report = ctx.execute_action("time", serde_json::json!({})).await;
        assert!(report.is_completed());

        let report = ctx.execute_action("does_not_exist", serde_json::json!({})).await;
        assert!(report.error.unwrap().contains("not found"));
    }

    struct StallingBackend(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl ChatBackend for StallingBackend {
        async fn run(&self, _messages: &[Message]) -> Result<Value, String> {
            self.0.notified().await;
            Ok(serde_json::json!({"content": "done"}))
        }
    }

    #[tokio::test]
    async fn test_inflight_backend_call_does_not_block_reads() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let ctx = Arc::new(context_with(Arc::new(StallingBackend(gate.clone()))));

        let pending = tokio::spawn({
            let ctx = ctx.clone();
            async move { ctx.handle_message("slow one", "u1", "c1").await }
        });
        // 留出时间让后端调用真正挂起
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // 转录与会话读取必须在补全完成前就能返回
        let snapshot = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            ctx.transcript(),
        )
        .await
        .expect("transcript read blocked by in-flight backend call");
        assert!(snapshot.is_empty());
        assert_eq!(
            ctx.session_data("u1", "c1").await.unwrap().message_count,
            1
        );

        gate.notify_one();
        assert_eq!(pending.await.unwrap(), "done");
        assert_eq!(ctx.transcript().await.len(), 2);
    }

    #[tokio::test]
    async fn test_notify_without_integration() {
        let ctx = context_with(Arc::new(MockBackend));
        let err = ctx.notify("c1", "ping").await.unwrap_err();
        assert!(err.contains("No messaging integration"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        ctx.set_notifier(tx).await;
        ctx.notify("c1", "ping").await.unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.chat_id, "c1");
        assert_eq!(msg.text, "ping");
    }
}
