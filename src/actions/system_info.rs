//! 系统信息动作（纯计算）

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::actions::{Action, ActionKind};

pub struct SystemInfoAction;

#[async_trait]
impl Action for SystemInfoAction {
    fn id(&self) -> &str {
        "system_info"
    }

    fn name(&self) -> &str {
        "System Info"
    }

    fn description(&self) -> &str {
        "Get basic system information. No params required."
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Function
    }

    async fn run(&self, _params: &Value, _http: Option<&Client>) -> Result<Value, String> {
        Ok(json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "cpu_count": num_cpus::get(),
            "courier_version": env!("CARGO_PKG_VERSION"),
        }))
    }
}
