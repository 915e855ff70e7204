//! Telegram 集成：长轮询监听器
//!
//! 通过 get_updates 长轮询接收消息：四个命令（/start /help /status /history）
//! 是围绕上下文数据的薄格式化层，自由文本先发 typing 指示再转发给
//! BridgeContext::handle_message，回复原样发回。监听器只持有上下文的
//! Weak 反向引用——升级失败即回固定的「系统未就绪」提示。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use teloxide::prelude::*;
use teloxide::types::{ChatAction, MediaKind, MessageKind, UpdateKind, User};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{BridgeContext, BridgeError, OutboundMessage};

const POLL_TIMEOUT_SECS: u32 = 30;
const POLL_RETRY_SECS: u64 = 5;
/// Telegram 消息长度上限 4096，留余量按字符分段
const MAX_MESSAGE_CHARS: usize = 4000;

const NOT_READY: &str = "System not ready. Orchestrator not connected.";

/// Telegram 监听器：Bot 句柄 + 上下文反向引用 + 轮询/出站两个后台任务
pub struct TelegramListener {
    bot: Bot,
    context: Weak<BridgeContext>,
    allowed_users: Vec<i64>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
    outbound_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramListener {
    pub fn new(bot_token: &str, context: Weak<BridgeContext>, allowed_users: Vec<i64>) -> Self {
        Self {
            bot: Bot::new(bot_token),
            context,
            allowed_users,
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            poll_handle: Mutex::new(None),
            outbound_handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 启动：验证 Bot 身份、注册出站通道、起长轮询任务
    pub async fn start(&self) -> Result<(), BridgeError> {
        if self.running.swap(true, Ordering::Relaxed) {
            tracing::warn!("telegram listener is already running");
            return Ok(());
        }

        let me = self.bot.get_me().await.map_err(|e| {
            self.running.store(false, Ordering::Relaxed);
            BridgeError::Telegram(format!("getMe failed: {}", e))
        })?;
        let bot_user_id = me.id.0.to_string();
        tracing::info!(bot_username = %me.username(), bot_id = %bot_user_id, "Telegram bot authenticated");

        let token = CancellationToken::new();
        *self.cancel.lock().await = Some(token.clone());

        // 出站通道：上下文（NotificationTask 等）经由它主动发消息
        if let Some(ctx) = self.context.upgrade() {
            let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
            ctx.set_notifier(tx).await;
            ctx.set_listener_connected(true);

            let bot = self.bot.clone();
            *self.outbound_handle.lock().await = Some(tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    match msg.chat_id.parse::<i64>() {
                        Ok(id) => {
                            if let Err(e) = send_text(&bot, ChatId(id), &msg.text).await {
                                tracing::error!(chat_id = %msg.chat_id, error = %e, "proactive send failed");
                            }
                        }
                        Err(_) => {
                            tracing::error!(chat_id = %msg.chat_id, "invalid Telegram chat id");
                        }
                    }
                }
            }));
        }

        let bot = self.bot.clone();
        let context = self.context.clone();
        let allowed_users = self.allowed_users.clone();
        *self.poll_handle.lock().await = Some(tokio::spawn(async move {
            poll_loop(bot, context, bot_user_id, allowed_users, token).await;
        }));

        tracing::info!("telegram listener started");
        Ok(())
    }

    /// 停止：取消轮询、注销出站通道；幂等
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(ctx) = self.context.upgrade() {
            ctx.clear_notifier().await;
            ctx.set_listener_connected(false);
        }
        if let Some(handle) = self.poll_handle.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.outbound_handle.lock().await.take() {
            // 通道的发送端已随 clear_notifier 释放，接收循环会自然结束
            let _ = handle.await;
        }

        tracing::info!("telegram listener stopped");
    }
}

/// 长轮询主循环：offset 续传、错误退避、逐条分发
async fn poll_loop(
    bot: Bot,
    context: Weak<BridgeContext>,
    bot_user_id: String,
    allowed_users: Vec<i64>,
    token: CancellationToken,
) {
    let mut offset: i32 = 0;

    loop {
        let updates = tokio::select! {
            _ = token.cancelled() => break,
            res = async { bot.get_updates().offset(offset).timeout(POLL_TIMEOUT_SECS).await } => res,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "long polling error, retrying in {}s", POLL_RETRY_SECS);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(POLL_RETRY_SECS)) => {}
                }
                continue;
            }
        };

        for update in &updates {
            offset = update.id.as_offset();

            let message = match &update.kind {
                UpdateKind::Message(msg) => msg,
                _ => continue,
            };
            let text = match &message.kind {
                MessageKind::Common(common) => match &common.media_kind {
                    MediaKind::Text(text) => text.text.clone(),
                    _ => continue,
                },
                _ => continue,
            };
            let Some(from) = message.from.as_ref() else {
                continue;
            };
            if from.id.0.to_string() == bot_user_id {
                continue;
            }
            if !allowed_users.is_empty() && !allowed_users.contains(&(from.id.0 as i64)) {
                tracing::debug!(user_id = from.id.0, "skipping message from non-allowed user");
                continue;
            }

            handle_text(&bot, &context, message.chat.id, from, &text).await;
        }
    }
}

/// 单条文本的分发：命令走格式化器，自由文本走 Agent 管线
async fn handle_text(
    bot: &Bot,
    context: &Weak<BridgeContext>,
    chat_id: ChatId,
    from: &User,
    text: &str,
) {
    let reply = match parse_command(text) {
        Some("start") => Some(start_text(&from.first_name)),
        Some("help") => Some(help_text()),
        Some("status") => Some(status_text(context).await),
        Some("history") => Some(history_text(context, from, chat_id).await),
        // 未注册的命令不回复
        Some(_) => None,
        None => {
            let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;
            Some(free_text_reply(context, from, chat_id, text).await)
        }
    };

    if let Some(reply) = reply {
        if let Err(e) = send_text(bot, chat_id, &reply).await {
            tracing::error!(chat_id = %chat_id.0, error = %e, "failed to send reply");
        }
    }
}

/// 解析命令名：去掉前导 '/' 与 @botname 后缀；非命令返回 None
fn parse_command(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    let cmd = rest.split_whitespace().next().unwrap_or("");
    Some(cmd.split('@').next().unwrap_or(""))
}

async fn free_text_reply(
    context: &Weak<BridgeContext>,
    from: &User,
    chat_id: ChatId,
    text: &str,
) -> String {
    let Some(ctx) = context.upgrade() else {
        return NOT_READY.to_string();
    };
    tracing::info!(user = %from.id.0, "received message");
    ctx.handle_message(text, &from.id.0.to_string(), &chat_id.0.to_string())
        .await
}

fn start_text(first_name: &str) -> String {
    format!(
        "🤖 Hello {}! I'm your AI assistant.\n\n\
         I can answer questions, reason through problems, and execute actions \
         like web searches, weather lookups, and API calls.\n\n\
         Type any message to get started, or use /help for more commands.",
        first_name
    )
}

fn help_text() -> String {
    "🔧 Available commands:\n\n\
     /start - Welcome message\n\
     /help - Show this help\n\
     /status - Check the system status\n\
     /history - Show recent conversation history\n\n\
     💬 Just send me any message and I'll respond using my AI capabilities!"
        .to_string()
}

async fn status_text(context: &Weak<BridgeContext>) -> String {
    let Some(ctx) = context.upgrade() else {
        return NOT_READY.to_string();
    };
    let health = ctx.health_check().await;
    let tasks = ctx.tasks_info().await;
    let mark = |up: bool| if up { "✅" } else { "❌" };
    format!(
        "🔍 System Status:\n\n\
         Orchestrator: {}\n\
         Agent: {}\n\
         Telegram: {}\n\
         Task Registry: {} ({} tasks, {} enabled)\n\
         Action Registry: {}\n\n\
         📊 Active Sessions: {}",
        mark(health.orchestrator),
        mark(health.agent),
        mark(health.telegram),
        mark(health.task_registry),
        tasks.total_tasks,
        tasks.enabled_tasks,
        mark(health.action_registry),
        health.active_sessions,
    )
}

async fn history_text(context: &Weak<BridgeContext>, from: &User, chat_id: ChatId) -> String {
    let Some(ctx) = context.upgrade() else {
        return NOT_READY.to_string();
    };
    let user_id = from.id.0.to_string();
    let chat = chat_id.0.to_string();

    match ctx.session_data(&user_id, &chat).await {
        Some(session) => {
            let transcript_len = ctx.transcript().await.len();
            let last = session.last_message.as_deref().unwrap_or("None");
            let last: String = last.chars().take(100).collect();
            format!(
                "📚 Session History:\n\n\
                 👤 User ID: {}\n\
                 💬 Messages: {}\n\
                 🕐 Created: {}\n\n\
                 🤖 Agent transcript: {} entries\n\n\
                 Last message: {}",
                session.user_id,
                session.message_count,
                session.created_at.to_rfc3339(),
                transcript_len,
                last,
            )
        }
        None => "📚 No session history found. Start a conversation!".to_string(),
    }
}

/// 发送文本，超长时按字符分段
async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), BridgeError> {
    if text.is_empty() {
        return Ok(());
    }
    let chunks: Vec<String> = if text.chars().count() <= MAX_MESSAGE_CHARS {
        vec![text.to_string()]
    } else {
        text.chars()
            .collect::<Vec<_>>()
            .chunks(MAX_MESSAGE_CHARS)
            .map(|c| c.iter().collect())
            .collect()
    };
    for chunk in chunks {
        bot.send_message(chat_id, chunk)
            .await
            .map_err(|e| BridgeError::Telegram(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some("start"));
        assert_eq!(parse_command("/help extra args"), Some("help"));
        assert_eq!(parse_command("/status@courier_bot"), Some("status"));
        assert_eq!(parse_command("hello"), None);
    }

    #[tokio::test]
    async fn test_dropped_context_yields_not_ready() {
        let weak: Weak<BridgeContext> = Weak::new();
        assert_eq!(status_text(&weak).await, NOT_READY);
    }
}
