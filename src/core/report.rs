//! 执行报告：动作/任务执行的结构化结果
//!
//! 未知 id、禁用、外部调用失败都以 status = "error" 的报告返回，
//! 而不是错误抛出——调用方（包括 LLM 工具层）拿到的永远是一个可序列化的值。

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// 执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Completed,
    Error,
}

/// 一次动作/任务执行的结果
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// 被执行的动作/任务 id
    pub id: String,
    pub status: ExecStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn completed(id: impl Into<String>, executed_at: DateTime<Utc>, result: Value) -> Self {
        Self {
            id: id.into(),
            status: ExecStatus::Completed,
            executed_at: Some(executed_at),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ExecStatus::Error,
            executed_at: None,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecStatus::Completed
    }
}
