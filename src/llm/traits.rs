//! 模型后端抽象
//!
//! 后端是无状态的：每次 run 接收完整消息历史，返回「原始」的助手消息 JSON，
//! 回复文本的提取（字段回退链）由 agent 包装层完成。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 模型后端 trait：单一调用契约
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// 对完整消息历史做一次补全，返回原始助手消息（JSON 值）
    async fn run(&self, messages: &[Message]) -> Result<Value, String>;

    /// 后端标识（用于日志与 model_info）
    fn model_name(&self) -> &str {
        "unknown"
    }
}
