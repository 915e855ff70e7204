//! 通知任务（示例任务变体）
//!
//! 经由上下文注册的出站通道向指定 chat 发送固定消息；
//! 通道缺席时返回结构化错误而不是静默丢弃。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::context::BridgeContext;
use crate::tasks::Task;

/// 周期性通知：向单个 chat 推送一条固定文本
pub struct NotificationTask {
    id: String,
    message: String,
    chat_id: String,
}

impl NotificationTask {
    pub fn new(message: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let chat_id = chat_id.into();
        Self {
            id: format!("notification_{}", chat_id),
            message: message.into(),
            chat_id,
        }
    }
}

#[async_trait]
impl Task for NotificationTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Periodic Notification"
    }

    fn description(&self) -> &str {
        "Sends periodic notifications to a chat"
    }

    async fn run(&self, ctx: Option<&BridgeContext>) -> Result<Value, String> {
        let ctx = ctx.ok_or_else(|| "No messaging integration available".to_string())?;
        ctx.notify(&self.chat_id, &self.message).await?;
        Ok(json!(format!("Notification sent to {}", self.chat_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_derived_from_chat() {
        let task = NotificationTask::new("ping", "1001");
        assert_eq!(task.id(), "notification_1001");
    }

    #[tokio::test]
    async fn test_fails_without_context() {
        let task = NotificationTask::new("ping", "1001");
        let err = task.run(None).await.unwrap_err();
        assert!(err.contains("No messaging integration"));
    }
}
