//! 编排器：生命周期状态机
//!
//! initialize 构建后端 → 上下文 → 监听器（监听器最后，它需要上下文的 Weak 反向引用）；
//! start / stop 幂等，stop 对部分初始化状态也安全。消息处理、动作执行与健康检查
//! 都是对上下文的纯委托。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::actions::ActionRegistry;
use crate::agent::ConversationAgent;
use crate::config::AppConfig;
use crate::core::{BridgeContext, BridgeError, ExecutionReport, HealthReport};
use crate::integrations::health;
use crate::integrations::telegram::TelegramListener;
use crate::llm::{ChatBackend, MockBackend, OpenAiBackend, DEEPSEEK_BASE_URL};
use crate::tasks::{HealthCheckTask, TaskRegistry};

/// 编排器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
}

/// 根据配置与环境变量选择模型后端（OpenAI 兼容 / DeepSeek / Mock）
pub fn create_backend_from_config(cfg: &AppConfig) -> Arc<dyn ChatBackend> {
    let provider = cfg.llm.provider.to_lowercase();
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok();
        tracing::info!(model = %cfg.llm.model, "using DeepSeek backend");
        Arc::new(OpenAiBackend::new(
            Some(DEEPSEEK_BASE_URL),
            &cfg.llm.model,
            api_key.as_deref(),
            cfg.llm.temperature,
            cfg.llm.max_tokens,
        ))
    } else if use_openai {
        tracing::info!(model = %cfg.llm.model, "using OpenAI backend");
        Arc::new(OpenAiBackend::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
            cfg.llm.temperature,
            cfg.llm.max_tokens,
        ))
    } else {
        tracing::warn!("no API key set or provider unknown, using Mock backend");
        Arc::new(MockBackend)
    }
}

/// 编排器：拥有上下文、监听器与健康端点
pub struct Orchestrator {
    config: AppConfig,
    backend: Arc<dyn ChatBackend>,
    context: Option<Arc<BridgeContext>>,
    listener: Option<Arc<TelegramListener>>,
    health_server: Option<JoinHandle<()>>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(config: AppConfig) -> Self {
        let backend = create_backend_from_config(&config);
        Self::with_backend(config, backend)
    }

    /// 注入后端（测试用 Mock 走这里）
    pub fn with_backend(config: AppConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            config,
            backend,
            context: None,
            listener: None,
            health_server: None,
            state: RunState::Uninitialized,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn context(&self) -> Option<Arc<BridgeContext>> {
        self.context.clone()
    }

    /// 构建全部组件；多次调用是无害的
    pub async fn initialize(&mut self) -> Result<(), BridgeError> {
        if self.context.is_some() {
            return Ok(());
        }
        self.state = RunState::Initializing;

        tracing::info!("initializing agent");
        let agent = ConversationAgent::new(
            self.backend.clone(),
            self.config.app.system_prompt.as_deref(),
        );

        tracing::info!("initializing action registry");
        let actions = ActionRegistry::with_defaults();

        tracing::info!("initializing task registry");
        let tasks = TaskRegistry::new(Duration::from_secs(self.config.tasks.poll_interval_secs));

        let context = Arc::new(BridgeContext::new(agent, actions, tasks));
        context.tasks.add(HealthCheckTask).await;

        tracing::info!("initializing Telegram listener");
        let Some(token) = self.config.telegram_token() else {
            // 初始化失败不能把状态留在 Initializing
            self.state = RunState::Uninitialized;
            return Err(BridgeError::MissingEnv("TELEGRAM_BOT_TOKEN".to_string()));
        };
        let listener = Arc::new(TelegramListener::new(
            &token,
            Arc::downgrade(&context),
            self.config.telegram.allowed_users.clone(),
        ));

        self.context = Some(context);
        self.listener = Some(listener);
        tracing::info!("all components initialized");
        Ok(())
    }

    /// 启动：初始化（如需要）、监听器、任务循环、健康端点；已在运行则为空操作
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        if self.state == RunState::Running {
            tracing::warn!("orchestrator is already running");
            return Ok(());
        }

        self.initialize().await?;
        let context = self.context.as_ref().expect("initialized above").clone();
        let listener = self.listener.as_ref().expect("initialized above").clone();

        listener.start().await?;
        context.tasks.start().await;

        let bind = self.config.health.bind.clone();
        self.health_server = Some(tokio::spawn(async move {
            if let Err(e) = health::serve(&bind).await {
                tracing::error!(error = %e, "health endpoint failed");
            }
        }));

        context.set_running(true);
        self.state = RunState::Running;
        tracing::info!("orchestrator started");
        Ok(())
    }

    /// 停止：监听器 → 任务循环 → 健康端点 → 释放共享 HTTP 客户端。
    /// 幂等，对部分初始化状态安全。
    pub async fn stop(&mut self) {
        if self.state == RunState::Stopped {
            return;
        }
        tracing::info!("stopping orchestrator");

        if let Some(listener) = &self.listener {
            listener.stop().await;
        }
        if let Some(context) = &self.context {
            context.tasks.stop().await;
            context.actions.shutdown().await;
            context.set_running(false);
        }
        if let Some(handle) = self.health_server.take() {
            handle.abort();
        }

        self.state = RunState::Stopped;
        tracing::info!("orchestrator stopped");
    }

    /// 消息处理委托；未初始化时直接回固定提示
    pub async fn handle_message(&self, text: &str, user_id: &str, chat_id: &str) -> String {
        match &self.context {
            Some(ctx) => ctx.handle_message(text, user_id, chat_id).await,
            None => "System not ready. Orchestrator not initialized.".to_string(),
        }
    }

    pub async fn execute_action(&self, id: &str, params: serde_json::Value) -> ExecutionReport {
        match &self.context {
            Some(ctx) => ctx.execute_action(id, params).await,
            None => ExecutionReport::failed(id, "Orchestrator not initialized"),
        }
    }

    pub async fn health_check(&self) -> Option<HealthReport> {
        match &self.context {
            Some(ctx) => Some(ctx.health_check().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunState;

    fn test_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        // 形如真实 token 即可；初始化不触网
        cfg.telegram.bot_token = Some("123456:TEST".to_string());
        cfg
    }

    #[tokio::test]
    async fn test_initialize_builds_components() {
        let mut orch = Orchestrator::with_backend(test_config(), Arc::new(MockBackend));
        assert_eq!(orch.state(), RunState::Uninitialized);
        orch.initialize().await.unwrap();
        let ctx = orch.context().unwrap();
        assert_eq!(ctx.actions.len().await, 5);
        assert!(ctx.tasks.status("health_check").await.is_some());
    }

    #[tokio::test]
    async fn test_missing_token_is_fatal() {
        let mut cfg = AppConfig::default();
        cfg.telegram.bot_token = None;
        std::env::remove_var("TELEGRAM_BOT_TOKEN");
        let mut orch = Orchestrator::with_backend(cfg, Arc::new(MockBackend));
        let err = orch.initialize().await.unwrap_err();
        assert!(matches!(err, BridgeError::MissingEnv(_)));
        // 失败后状态回到未初始化，而不是卡在 Initializing
        assert_eq!(orch.state(), RunState::Uninitialized);
    }

    #[tokio::test]
    async fn test_stop_is_safe_on_uninitialized() {
        let mut orch = Orchestrator::with_backend(test_config(), Arc::new(MockBackend));
        orch.stop().await;
        assert_eq!(orch.state(), RunState::Stopped);
        orch.stop().await; // 幂等
    }

    #[tokio::test]
    async fn test_handle_message_before_init() {
        let orch = Orchestrator::with_backend(test_config(), Arc::new(MockBackend));
        let reply = orch.handle_message("hi", "u", "c").await;
        assert!(reply.contains("not ready"));
    }
}
