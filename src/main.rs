//! Hive 命令行
//!
//! 逐行读取标准输入：普通文本交给 Agent，`/models`、`/model <id>`、`/clear`、`/quit` 为内置命令。
//! 循环过程事件实时打印到标准输出。

use std::path::PathBuf;

use anyhow::Context;
use hive::config::load_config_or_default;
use hive::{observability, AgentService, LoopEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config_or_default(config_path);
    let service = AgentService::from_config(&cfg).context("Failed to create agent service")?;
    let session = service.default_session().to_string();

    println!(
        "hive ready (model: {}, tools: {}). Commands: /models, /model <id>, /clear, /quit",
        service.active_model().await,
        service.tool_names().join(", ")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/models" => {
                let active = service.active_model().await;
                for model in service.list_models() {
                    let mark = if model == active { "*" } else { " " };
                    println!("{} {}", mark, model);
                }
            }
            "/clear" => {
                service.clear_memory(&session).await?;
                println!("memory cleared");
            }
            _ if line.starts_with("/model ") => {
                let name = line.trim_start_matches("/model ").trim();
                match service.switch_model(name).await {
                    Ok(()) => println!("switched to {}", name),
                    Err(e) => println!("{}", e),
                }
            }
            _ => {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        print_event(&event);
                    }
                });
                let result = service.ask_in(&session, line, Some(&tx)).await;
                drop(tx);
                let _ = printer.await;
                match result {
                    Ok(outcome) => println!("\n{}\n", outcome.response),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn print_event(event: &LoopEvent) {
    match event {
        LoopEvent::StateChanged { from, to } => println!("  [{} -> {}]", from, to),
        LoopEvent::SupervisorMessage { text, .. } => println!("supervisor: {}", text),
        LoopEvent::WorkerMessage { text } => println!("agent: {}", text),
        LoopEvent::ToolCall { tool, args, .. } => println!("  tool {} {}", tool, args),
        LoopEvent::ToolResult { tool, preview, .. } => println!("  {} => {}", tool, preview),
        LoopEvent::Finished { .. } => {}
    }
}
