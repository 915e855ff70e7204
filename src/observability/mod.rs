//! 可观测性
//!
//! 默认 info，RUST_LOG 可覆盖；长轮询依赖的 HTTP 内部日志压到 warn，
//! 否则每个 get_updates 周期都会刷屏。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::from_default_env()
        .add_directive("info".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
