//! Courier - Telegram ⇄ LLM 智能助理桥
//!
//! 模块划分：
//! - **actions**: 动作注册表（web_search / http_request / weather / time / system_info）
//! - **agent**: 会话 Agent 包装（本地转录 + 回复提取链）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器、组合上下文、会话记录、执行报告、错误
//! - **integrations**: Telegram 长轮询监听器、健康检查端点
//! - **llm**: 模型后端抽象与实现（OpenAI 兼容 / Mock）
//! - **tasks**: 任务注册表与调度循环桩

pub mod actions;
pub mod agent;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod observability;
pub mod tasks;
