//! 会话 Agent 包装
//!
//! 推理、记忆与工具选择全部委托给模型后端；本层只负责两件事：
//! 1. 独占维护本地转录（后端按调用无状态，每次 run 发送完整历史）；
//! 2. 从后端返回的原始消息中提取回复文本（字段回退链，抵御响应形状漂移）。

use std::sync::Arc;

use serde_json::{json, Value};

use crate::llm::{ChatBackend, Message};

const DEFAULT_SYSTEM_PROMPT: &str = "You are an intelligent AI assistant with access to various tools and capabilities. \
Analyze user messages, think through problems step by step, execute actions when needed, \
and provide helpful, accurate, contextual responses while maintaining a friendly conversational tone.";

/// 会话 Agent：后端句柄 + 系统提示词 + 本地转录
pub struct ConversationAgent {
    backend: Arc<dyn ChatBackend>,
    system_prompt: String,
    transcript: Vec<Message>,
}

impl ConversationAgent {
    pub fn new(backend: Arc<dyn ChatBackend>, system_prompt: Option<&str>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt
                .map(String::from)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            transcript: Vec::new(),
        }
    }

    /// 处理一条用户消息：调用后端，提取回复，追加 user/assistant 两条转录
    pub async fn process_message(&mut self, text: &str) -> Result<String, String> {
        let messages = self.compose_request(text);
        let raw = self.backend.run(&messages).await?;
        Ok(self.accept_reply(text, &raw))
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        self.backend.clone()
    }

    /// 组装一次补全请求：system + 完整转录 + 新的 user 消息。
    /// 与 accept_reply 拆开，调用方可以在不持有 Agent 的情况下等待后端。
    pub fn compose_request(&self, text: &str) -> Vec<Message> {
        tracing::info!(preview = %preview(text), "processing message");

        let mut messages = Vec::with_capacity(self.transcript.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(self.transcript.iter().cloned());
        messages.push(Message::user(text));
        messages
    }

    /// 从原始后端输出提取回复，并把 user/assistant 两条写入转录
    pub fn accept_reply(&mut self, text: &str, raw: &Value) -> String {
        let reply = extract_reply(raw);

        self.transcript.push(Message::user(text));
        self.transcript.push(Message::assistant(&reply));

        tracing::info!(preview = %preview(&reply), "generated response");
        reply
    }

    /// 单次思考：不进入转录
    pub async fn think(&self, prompt: &str) -> Result<String, String> {
        let messages = [Message::system(&self.system_prompt), Message::user(prompt)];
        let raw = self.backend.run(&messages).await?;
        Ok(extract_reply(&raw))
    }

    /// 分析给定内容：不进入转录
    pub async fn analyze(&self, content: &str) -> Result<String, String> {
        self.think(&format!("Analyze the following content: {}", content))
            .await
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        tracing::info!("transcript cleared");
    }

    pub fn model_info(&self) -> Value {
        json!({
            "model_name": self.backend.model_name(),
            "transcript_len": self.transcript.len(),
        })
    }
}

/// 从原始助手消息中提取回复文本。
/// 按优先级尝试 content / response / message / text 字段，都不命中时把整个值转为字符串。
/// 空字符串与 null 同样视为未命中，继续尝试下一个字段。
fn extract_reply(raw: &Value) -> String {
    for key in ["content", "response", "message", "text"] {
        match raw.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
    }
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn preview(s: &str) -> &str {
    let end = s
        .char_indices()
        .nth(100)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::MockBackend;

    struct ShapedBackend(Value);

    #[async_trait]
    impl ChatBackend for ShapedBackend {
        async fn run(&self, _messages: &[Message]) -> Result<Value, String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_process_message_appends_transcript() {
        let mut agent = ConversationAgent::new(Arc::new(MockBackend), None);
        let reply = agent.process_message("hello").await.unwrap();
        assert!(reply.contains("hello"));
        assert_eq!(agent.transcript().len(), 2);

        agent.process_message("again").await.unwrap();
        assert_eq!(agent.transcript().len(), 4);

        agent.clear_transcript();
        assert!(agent.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_think_leaves_transcript_alone() {
        let agent = ConversationAgent::new(Arc::new(MockBackend), None);
        agent.think("ponder this").await.unwrap();
        assert!(agent.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_prefixes_content() {
        // Mock 回显最后一条 user 消息，可据此验证前缀拼接
        let agent = ConversationAgent::new(Arc::new(MockBackend), None);
        let reply = agent.analyze("some log output").await.unwrap();
        assert!(reply.contains("Analyze the following content: some log output"));
        assert!(agent.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_extract_reply_fallback_chain() {
        // content 优先
        let mut agent = ConversationAgent::new(
            Arc::new(ShapedBackend(json!({"content": "a", "text": "b"}))),
            None,
        );
        assert_eq!(agent.process_message("x").await.unwrap(), "a");

        // content 缺失时退到 response
        let mut agent = ConversationAgent::new(
            Arc::new(ShapedBackend(json!({"response": "via response"}))),
            None,
        );
        assert_eq!(agent.process_message("x").await.unwrap(), "via response");

        // content 为 null 时跳过，退到 text
        let mut agent = ConversationAgent::new(
            Arc::new(ShapedBackend(json!({"content": null, "text": "via text"}))),
            None,
        );
        assert_eq!(agent.process_message("x").await.unwrap(), "via text");

        // content 为空串时同样跳过，不得落进整体转字符串
        let mut agent = ConversationAgent::new(
            Arc::new(ShapedBackend(json!({"content": "", "text": "via text"}))),
            None,
        );
        assert_eq!(agent.process_message("x").await.unwrap(), "via text");

        // 都不命中：整体转字符串
        let mut agent = ConversationAgent::new(Arc::new(ShapedBackend(json!(42))), None);
        assert_eq!(agent.process_message("x").await.unwrap(), "42");
    }
}
