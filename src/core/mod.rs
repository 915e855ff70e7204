//! 核心层：错误、执行报告、会话记录、组合上下文、编排器

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod session;

pub use context::{BridgeContext, HealthReport, OutboundMessage, APOLOGY_PREFIX};
pub use error::BridgeError;
pub use orchestrator::{Orchestrator, RunState};
pub use report::{ExecStatus, ExecutionReport};
pub use session::{session_key, SessionRecord};
