//! Agent 层：Supervisor（虚拟用户）与 Worker（构建者）

pub mod supervisor;
pub mod worker;

pub use supervisor::{default_directive, Markers, SupervisorAgent, SupervisorTurn};
pub use worker::WorkerAgent;
