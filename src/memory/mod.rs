//! 记忆层：会话消息模型与按 session 隔离的会话存储

pub mod conversation;
pub mod store;

pub use conversation::{Message, Role, Session, ToolCall};
pub use store::{ConversationStore, InMemoryStore, StoreError};
