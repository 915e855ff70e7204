//! 会话记录：按 user+chat 维度的对话簿记
//!
//! 首条消息时惰性创建，仅存活于进程生命周期内，不持久化、不过期。

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 会话键："{user_id}_{chat_id}"
pub fn session_key(user_id: &str, chat_id: &str) -> String {
    format!("{}_{}", user_id, chat_id)
}

/// 单个 user+chat 的会话记录
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub chat_id: String,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_response: Option<String>,
}

impl SessionRecord {
    pub fn new(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            message_count: 0,
            created_at: Utc::now(),
            last_message: None,
            last_response: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_format() {
        assert_eq!(session_key("42", "1001"), "42_1001");
    }

    #[test]
    fn test_new_record_starts_empty() {
        let r = SessionRecord::new("42", "1001");
        assert_eq!(r.message_count, 0);
        assert!(r.last_message.is_none());
        assert!(r.last_response.is_none());
    }
}
