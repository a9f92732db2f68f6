//! 核心编排层：错误类型、状态机与主循环

pub mod error;
pub mod orchestrator;
pub mod state;

pub use error::AgentError;
pub use orchestrator::{OrchestrationLoop, TurnOutcome, NO_RESPONSE};
pub use state::LoopState;
