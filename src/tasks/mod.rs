//! 任务层：注册表、调度循环桩与两个示例任务

pub mod health_check;
pub mod notification;
pub mod registry;

pub use health_check::HealthCheckTask;
pub use notification::NotificationTask;
pub use registry::{RegistryInfo, Task, TaskDescriptor, TaskRegistry};
