//! Courier - Telegram ⇄ LLM 智能助理桥
//!
//! 入口：初始化日志、加载配置、校验必需环境变量，启动编排器并等待 Ctrl-C。
//!
//! 环境变量:
//! - TELEGRAM_BOT_TOKEN: Telegram Bot Token（必需）
//! - OPENAI_API_KEY 或 DEEPSEEK_API_KEY: LLM API Key（必需，二选一）

use anyhow::Context;
use courier::config::{load_config, AppConfig};
use courier::core::Orchestrator;

/// 校验必需环境变量；缺失即致命启动错误
fn validate_environment(cfg: &AppConfig) -> anyhow::Result<()> {
    let mut missing = Vec::new();
    if cfg.telegram_token().is_none() {
        missing.push("TELEGRAM_BOT_TOKEN");
    }
    if std::env::var("OPENAI_API_KEY").is_err() && std::env::var("DEEPSEEK_API_KEY").is_err() {
        missing.push("OPENAI_API_KEY or DEEPSEEK_API_KEY");
    }
    if !missing.is_empty() {
        anyhow::bail!(
            "Missing required environment variables: {}",
            missing.join(", ")
        );
    }
    tracing::info!("environment variables validated");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    courier::observability::init();

    let cfg = load_config(None).context("Failed to load configuration")?;
    validate_environment(&cfg)?;

    let mut orchestrator = Orchestrator::new(cfg);
    orchestrator
        .start()
        .await
        .context("Failed to start orchestrator")?;

    tracing::info!("🚀 Courier started, Telegram bot is listening for messages");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");

    orchestrator.stop().await;
    Ok(())
}
