//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 注册时校验名称唯一与 schema 合法；调用时先按 schema 校验参数，未知工具返回 ToolError::UnknownTool。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolSpec;
use crate::tools::schema::{check_schema, validate_args};

/// 注册表层面的错误；工具内部错误不在此列
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid schema for {tool}: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
///
/// execute 的 Err 表示工具内部失败，由注册表转为 `Error: ...` 文本，不会中断编排。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（LLM tool call 中的 name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

struct Entry {
    tool: Arc<dyn Tool>,
    schema: Value,
}

/// 工具注册表：保持注册顺序，按名查找
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        let schema = tool.parameters_schema();
        check_schema(&schema).map_err(|reason| ToolError::InvalidSchema {
            tool: name.clone(),
            reason,
        })?;
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry {
            tool: Arc::new(tool),
            schema,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.entries[i].tool.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 查找 -> 校验参数 -> 执行；工具内部错误转为 `Error: ...` 文本
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        validate_args(&entry.schema, &args).map_err(|reason| ToolError::InvalidArguments {
            tool: name.to_string(),
            reason,
        })?;
        Ok(match entry.tool.execute(args).await {
            Ok(value) => value,
            Err(e) => Value::String(format!("Error: {}", e)),
        })
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.tool.name().to_string()).collect()
    }

    /// 绑定到 Worker 补全请求的工具声明
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.entries
            .iter()
            .map(|e| ToolSpec {
                name: e.tool.name().to_string(),
                description: e.tool.description().to_string(),
                parameters: e.schema.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
