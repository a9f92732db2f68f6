//! Hive HTTP 服务
//!
//! 启动: cargo run --bin hive-web --features web
//! 监听地址由 HIVE_BIND 指定，默认 127.0.0.1:8080

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use hive::config::load_config_or_default;
use hive::{observability, web, AgentService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(None);
    let service = Arc::new(AgentService::from_config(&cfg).context("Failed to create agent service")?);
    let app = web::router(service);

    let addr = std::env::var("HIVE_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Hive API listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
