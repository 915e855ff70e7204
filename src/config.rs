//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COURIER__*` 覆盖
//! （双下划线表示嵌套，如 `COURIER__LLM__MODEL=gpt-4o-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub tasks: TasksSection,
    #[serde(default)]
    pub health: HealthSection,
}

/// [app] 段：应用名与系统提示词
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// Agent 系统提示词，未设置时用内置默认
    pub system_prompt: Option<String>,
}

/// [llm] 段：后端选择、模型与采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek；优先级由 API Key 与 provider 共同决定
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            base_url: None,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// [telegram] 段：Bot Token（通常来自 TELEGRAM_BOT_TOKEN 环境变量）与用户白名单
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
    /// 允许交互的用户 ID，空表示不限制
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

/// [tasks] 段：调度循环的轮询间隔（循环本身是桩，见 tasks::registry）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksSection {
    pub poll_interval_secs: u64,
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

/// [health] 段：健康检查端点监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthSection {
    pub bind: String,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            telegram: TelegramSection::default(),
            tasks: TasksSection::default(),
            health: HealthSection::default(),
        }
    }
}

impl AppConfig {
    /// Bot Token：配置优先，其次 TELEGRAM_BOT_TOKEN 环境变量
    pub fn telegram_token(&self) -> Option<String> {
        self.telegram
            .bot_token
            .clone()
            .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
    }
}

/// 从 config 目录加载配置，环境变量 COURIER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COURIER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COURIER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.tasks.poll_interval_secs, 60);
        assert!(cfg.telegram.allowed_users.is_empty());
    }
}
