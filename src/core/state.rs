//! 编排状态机
//!
//! START -> SUPERVISING -> (WORKING <-> TOOL_EXEC)* -> SUPERVISING -> ... -> END。
//! 转移只取决于刚追加的那条消息，不依赖其它隐藏状态。

use std::fmt;

use serde::Serialize;

use crate::llm::TurnStatus;
use crate::memory::Message;

/// 循环状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Start,
    Supervising,
    Working,
    ToolExec,
    End,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::End)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Start => "START",
            LoopState::Supervising => "SUPERVISING",
            LoopState::Working => "WORKING",
            LoopState::ToolExec => "TOOL_EXEC",
            LoopState::End => "END",
        };
        f.write_str(s)
    }
}

/// Supervisor 之后：内容非空且状态为 Continue 才交给 Worker
///
/// 只有真正的空串才结束；纯空白仍然交给 Worker
pub fn after_supervisor(message: &Message, status: TurnStatus) -> LoopState {
    if message.content.is_empty() || status != TurnStatus::Continue {
        LoopState::End
    } else {
        LoopState::Working
    }
}

/// Worker 之后：有工具调用则执行工具，否则回到 Supervisor
pub fn after_worker(message: &Message) -> LoopState {
    if message.has_tool_calls() {
        LoopState::ToolExec
    } else {
        LoopState::Supervising
    }
}
