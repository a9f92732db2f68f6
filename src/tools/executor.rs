//! 工具执行器
//!
//! 读取触发消息中的全部 ToolCall，按请求顺序逐个分发给 ToolRegistry，每个请求产出一条 Tool 消息
//! （tool_call_id 与请求 id 一致）。未知工具、参数不合法、超时都转为 `Error: ...` 结果，让 Worker 自行纠正；
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::ToolSpec;
use crate::memory::{Message, ToolCall};
use crate::tools::ToolRegistry;

/// 工具执行器：持有注册表与单次调用超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    /// timeout_secs 为 0 表示不限
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行触发消息中的全部工具调用，返回与请求一一对应、同序的结果消息
    pub async fn execute_batch(&self, trigger: &Message) -> Result<Vec<Message>, AgentError> {
        if !trigger.has_tool_calls() {
            return Err(AgentError::NoToolCalls);
        }
        let mut results = Vec::with_capacity(trigger.tool_calls.len());
        for call in &trigger.tool_calls {
            results.push(self.execute(call).await);
        }
        Ok(results)
    }

    /// 执行单个调用；任何失败都落在结果文本里
    pub async fn execute(&self, call: &ToolCall) -> Message {
        let start = Instant::now();
        let args_preview = args_preview(&call.arguments);
        let run = self.registry.execute(&call.name, call.arguments.clone());
        let result = match self.timeout {
            Some(limit) => timeout(limit, run).await.ok(),
            None => Some(run.await),
        };

        let (ok, outcome, text) = match result {
            Some(Ok(value)) => (true, "ok", render_output(value)),
            Some(Err(e)) => (false, "error", format!("Error: {}", e)),
            None => (
                false,
                "timeout",
                format!("Error: Tool {} timed out", call.name),
            ),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        Message::tool_result(call.id.clone(), call.name.clone(), text)
    }
}

/// 字符串原样返回，其它值序列化为 JSON 文本
fn render_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
