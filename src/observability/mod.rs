//! 可观测性：tracing 初始化
//!
//! 默认 info 级别，可通过 RUST_LOG 覆盖。工具审计记录由 ToolExecutor 以 JSON 字段输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化（如测试中多次调用）时忽略
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
