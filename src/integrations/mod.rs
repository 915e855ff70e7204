//! 外部集成：Telegram 监听器与健康检查端点

pub mod health;
pub mod telegram;

pub use telegram::TelegramListener;
