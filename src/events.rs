//! 编排过程事件：供 CLI 打印或前端以 JSON 展示循环进度

use serde::Serialize;

use crate::core::LoopState;
use crate::llm::TurnStatus;

/// 预览最多保留的字符数
const PREVIEW_CHARS: usize = 200;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// 状态转移
    StateChanged { from: LoopState, to: LoopState },
    /// Supervisor 产出的指令
    SupervisorMessage { text: String, status: TurnStatus },
    /// Worker 的纯文本回复或工具调用前的说明
    WorkerMessage { text: String },
    /// Worker 请求调用工具
    ToolCall {
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览）
    ToolResult {
        id: String,
        tool: String,
        preview: String,
    },
    /// 本轮结束
    Finished { response: String, steps: usize },
}

impl LoopEvent {
    pub(crate) fn tool_result(id: &str, tool: &str, output: &str) -> Self {
        LoopEvent::ToolResult {
            id: id.to_string(),
            tool: tool.to_string(),
            preview: preview(output),
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}
