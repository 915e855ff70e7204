//! Mock 后端（用于测试，无需 API）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ChatBackend, Message, Role};

/// Mock 后端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockBackend;

#[async_trait]
impl ChatBackend for MockBackend {
    async fn run(&self, messages: &[Message]) -> Result<Value, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(json!({ "content": format!("Echo from Mock: {}", last_user) }))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
