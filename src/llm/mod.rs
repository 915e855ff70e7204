//! 模型后端层：抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockBackend;
pub use openai::{OpenAiBackend, DEEPSEEK_BASE_URL};
pub use traits::{ChatBackend, Message, Role};
