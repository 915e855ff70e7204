//! 桥接层错误类型
//!
//! 只覆盖「致命」错误：配置缺失、Telegram 连接失败、健康端点绑定失败等。
//! 注册表的查找/执行失败不在此列，它们以 ExecutionReport 值的形式返回，
//! 永远不会作为 Err 越过注册表边界。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Agent backend error: {0}")]
    Backend(String),

    #[error("Health endpoint error: {0}")]
    Health(String),
}
