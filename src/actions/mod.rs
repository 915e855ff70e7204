//! 动作层：注册表与五个内置动作

pub mod http_request;
pub mod registry;
pub mod system_info;
pub mod time;
pub mod weather;
pub mod web_search;

pub use http_request::HttpRequestAction;
pub use registry::{Action, ActionDescriptor, ActionKind, ActionRegistry};
pub use system_info::SystemInfoAction;
pub use time::TimeAction;
pub use weather::WeatherAction;
pub use web_search::WebSearchAction;
