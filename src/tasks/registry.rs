//! 任务注册表
//!
//! 与动作注册表同构（add / remove / execute / list / enable / disable），外加两点差异：
//! 1. enabled 只作用于「计划调度」：scheduled_ids 会跳过禁用任务，
//!    但手动 execute 无视该标志（沿用来源系统的不对称语义）；
//! 2. 后台调度循环是一个按固定间隔醒来的桩——在真正的调度语义
//!    （cron 解析、错过补跑、重叠策略）有规格之前，它不派发任何任务。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::context::BridgeContext;
use crate::core::ExecutionReport;

/// 任务 trait：标识、描述、未来的调度表达式、异步执行
#[async_trait]
pub trait Task: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// cron 风格调度串，仅随描述符透传，当前不会被解释
    fn schedule(&self) -> Option<&str> {
        None
    }

    /// 执行任务；ctx 提供健康检查、出站通知等桥接能力
    async fn run(&self, ctx: Option<&BridgeContext>) -> Result<Value, String>;
}

/// 任务描述符（list / status 的快照记录）
#[derive(Debug, Clone, Serialize)]
pub struct TaskDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schedule: Option<String>,
    pub enabled: bool,
    pub run_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 注册表汇总信息
#[derive(Debug, Clone, Serialize)]
pub struct RegistryInfo {
    pub is_running: bool,
    pub total_tasks: usize,
    pub enabled_tasks: usize,
    pub disabled_tasks: usize,
}

struct TaskEntry {
    task: Arc<dyn Task>,
    enabled: bool,
    created_at: DateTime<Utc>,
    run_count: u64,
    last_run: Option<DateTime<Utc>>,
}

impl TaskEntry {
    fn new(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            enabled: true,
            created_at: Utc::now(),
            run_count: 0,
            last_run: None,
        }
    }

    fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            id: self.task.id().to_string(),
            name: self.task.name().to_string(),
            description: self.task.description().to_string(),
            schedule: self.task.schedule().map(String::from),
            enabled: self.enabled,
            run_count: self.run_count,
            last_run: self.last_run,
            created_at: self.created_at,
        }
    }
}

/// 任务注册表：条目存储 + 调度循环桩
pub struct TaskRegistry {
    entries: RwLock<HashMap<String, TaskEntry>>,
    poll_interval: Duration,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            poll_interval,
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// 添加任务：id 已存在时不改动注册表并返回 false
    pub async fn add(&self, task: impl Task + 'static) -> bool {
        let id = task.id().to_string();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            tracing::warn!(task = %id, "task already exists");
            return false;
        }
        tracing::info!(task = %id, name = %task.name(), "added task");
        entries.insert(id, TaskEntry::new(Arc::new(task)));
        true
    }

    /// 移除任务：id 不存在时返回 false
    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(id) {
            Some(entry) => {
                tracing::info!(task = %id, name = %entry.task.name(), "removed task");
                true
            }
            None => {
                tracing::warn!(task = %id, "task not found");
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
                tracing::info!(task = %id, enabled, "task toggled");
                true
            }
            None => false,
        }
    }

    /// 手动执行任务。注意：无视 enabled 标志——禁用只把任务从计划调度
    /// 枚举（scheduled_ids）里拿掉，手动触发仍然生效。
    pub async fn execute(&self, id: &str, ctx: Option<&BridgeContext>) -> ExecutionReport {
        let task = {
            let entries = self.entries.read().await;
            match entries.get(id) {
                None => {
                    return ExecutionReport::failed(id, format!("Task {} not found", id));
                }
                Some(entry) => entry.task.clone(),
            }
        };

        tracing::info!(task = %id, "executing task");
        let outcome = task.run(ctx).await;

        let executed_at = Utc::now();
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(id) {
                entry.run_count += 1;
                entry.last_run = Some(executed_at);
            }
        }

        match outcome {
            Ok(result) => ExecutionReport::completed(id, executed_at, result),
            Err(e) => {
                tracing::error!(task = %id, error = %e, "task failed");
                ExecutionReport::failed(id, e)
            }
        }
    }

    pub async fn list(&self) -> Vec<TaskDescriptor> {
        let entries = self.entries.read().await;
        entries.values().map(TaskEntry::descriptor).collect()
    }

    pub async fn status(&self, id: &str) -> Option<TaskDescriptor> {
        let entries = self.entries.read().await;
        entries.get(id).map(TaskEntry::descriptor)
    }

    /// 计划调度会考虑的任务 id（仅启用的）
    pub async fn scheduled_ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub async fn registry_info(&self) -> RegistryInfo {
        let entries = self.entries.read().await;
        let enabled = entries.values().filter(|e| e.enabled).count();
        RegistryInfo {
            is_running: self.is_running(),
            total_tasks: entries.len(),
            enabled_tasks: enabled,
            disabled_tasks: entries.len() - enabled,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 启动调度循环桩：按 poll_interval 醒来，不派发任何任务
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            tracing::warn!("task registry is already running");
            return;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().await = Some(token.clone());

        let interval = self.poll_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        // 调度语义尚无规格：醒来即继续
                        tracing::trace!("task loop tick (no scheduled dispatch)");
                    }
                }
            }
        });
        *self.handle.lock().await = Some(handle);

        tracing::info!("task registry started");
    }

    /// 停止调度循环；幂等
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }

        tracing::info!("task registry stopped");
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopTask;

    #[async_trait]
    impl Task for NoopTask {
        fn id(&self) -> &str {
            "noop"
        }
        fn name(&self) -> &str {
            "Noop"
        }
        fn description(&self) -> &str {
            "Does nothing"
        }
        async fn run(&self, _ctx: Option<&BridgeContext>) -> Result<Value, String> {
            Ok(json!("ok"))
        }
    }

    #[tokio::test]
    async fn test_add_remove_contracts() {
        let registry = TaskRegistry::default();
        assert!(registry.add(NoopTask).await);
        assert!(!registry.add(NoopTask).await);
        assert!(!registry.remove("absent").await);
        assert!(registry.remove("noop").await);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_execute_unknown_task() {
        let registry = TaskRegistry::default();
        let report = registry.execute("ghost", None).await;
        assert!(!report.is_completed());
        assert!(report.error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_disabled_task_manual_execute_bypasses_flag() {
        let registry = TaskRegistry::default();
        registry.add(NoopTask).await;
        registry.disable("noop").await;

        // 手动执行无视 enabled
        let report = registry.execute("noop", None).await;
        assert!(report.is_completed());

        // 但计划调度枚举会跳过它
        assert!(registry.scheduled_ids().await.is_empty());

        registry.enable("noop").await;
        assert_eq!(registry.scheduled_ids().await, vec!["noop".to_string()]);
    }

    #[tokio::test]
    async fn test_run_counters() {
        let registry = TaskRegistry::default();
        registry.add(NoopTask).await;
        registry.execute("noop", None).await;
        registry.execute("noop", None).await;
        let status = registry.status("noop").await.unwrap();
        assert_eq!(status.run_count, 2);
        assert!(status.last_run.is_some());
    }

    #[tokio::test]
    async fn test_loop_stub_start_stop_idempotent() {
        let registry = TaskRegistry::new(Duration::from_millis(10));
        registry.start().await;
        assert!(registry.is_running());
        registry.start().await; // 幂等
        registry.stop().await;
        assert!(!registry.is_running());
        registry.stop().await; // 幂等
    }
}
