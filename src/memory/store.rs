//! 会话存储（checkpoint store）
//!
//! 按 session id 保存只追加的消息日志。append 以批为单位原子写入：一批要么全部追加，要么都不追加。
//! InMemoryStore 的生命周期即进程生命周期，不提供跨重启持久化。

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::memory::{Message, Session};

/// 存储层错误（容量或后端资源问题，对当前轮次是致命的）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Session {session} would exceed capacity of {limit} messages")]
    CapacityExceeded { session: String, limit: usize },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// 会话存储：append / load / reset，按 session id 隔离
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 将一批消息追加到会话末尾（原子）
    async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError>;

    /// 读取会话的完整有序序列；未知会话返回空会话
    async fn load(&self, session_id: &str) -> Result<Session, StoreError>;

    /// 清空会话
    async fn reset(&self, session_id: &str) -> Result<(), StoreError>;
}

/// 内存实现：HashMap<session_id, Vec<Message>>，可选单会话消息上限
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
    max_messages: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单会话最多保留 limit 条消息，超出时 append 失败而非剪枝
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_messages: Some(limit),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let log = sessions.entry(session_id.to_string()).or_default();
        if let Some(limit) = self.max_messages {
            if log.len() + messages.len() > limit {
                return Err(StoreError::CapacityExceeded {
                    session: session_id.to_string(),
                    limit,
                });
            }
        }
        log.extend(messages);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Session, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(Session {
            id: session_id.to_string(),
            messages: sessions.get(session_id).cloned().unwrap_or_default(),
        })
    }

    async fn reset(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(session_id);
        tracing::info!(session = %session_id, "conversation store reset");
        Ok(())
    }
}
