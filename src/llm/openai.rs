//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! 请求用 async_openai 的类型化 builder 组装（含 tools 绑定与 tool 消息关联）；
//! 响应中的 tool_calls 解析为 ToolCall，arguments 字符串解析为 JSON。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseMessage, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{Completion, LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// OpenAI 兼容客户端：持有 Client、model 名与可选请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Option<Duration>,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: None,
        }
    }

    /// 单次请求超时（秒），0 表示不限
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        chat_request(&self.model, messages, tools)
            .map_err(|e| LlmError::Request(format!("Failed to build request: {e}")))
    }
}

/// 组装请求；Supervisor 消息以 user 身份发送，没有工具时不带 tools 字段
fn chat_request(
    model: &str,
    messages: &[Message],
    tools: &[ToolSpec],
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let messages = messages
        .iter()
        .map(to_openai_message)
        .collect::<Result<Vec<_>, _>>()?;

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(model).messages(messages);
    if !tools.is_empty() {
        let tools = tools
            .iter()
            .map(|t| {
                let function = FunctionObjectArgs::default()
                    .name(t.name.clone())
                    .description(t.description.clone())
                    .parameters(t.parameters.clone())
                    .build()?;
                Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
            })
            .collect::<Result<Vec<_>, OpenAIError>>()?;
        args.tools(tools);
    }
    args.build()
}

fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let message: ChatCompletionRequestMessage = match m.role {
        Role::User | Role::Supervisor => ChatCompletionRequestUserMessageArgs::default()
            .content(m.content.clone())
            .build()?
            .into(),
        Role::Agent => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            // 只有工具调用时 content 省略
            if !m.content.is_empty() || !m.has_tool_calls() {
                args.content(m.content.clone());
            }
            if m.has_tool_calls() {
                let calls: Vec<ChatCompletionMessageToolCalls> = m
                    .tool_calls
                    .iter()
                    .map(|c| {
                        ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                            id: c.id.clone(),
                            function: FunctionCall {
                                name: c.name.clone(),
                                arguments: c.arguments.to_string(),
                            },
                        })
                    })
                    .collect();
                args.tool_calls(calls);
            }
            args.build()?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .content(m.content.clone())
            .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
            .build()?
            .into(),
    };
    Ok(message)
}

/// 从响应 message 中提取文本与工具调用
fn parse_response_message(message: &ChatCompletionResponseMessage) -> Completion {
    let content = message.content.clone().unwrap_or_default();

    let tool_calls = message
        .tool_calls
        .iter()
        .flatten()
        .filter_map(|call| match call {
            ChatCompletionMessageToolCalls::Function(call) => Some(call),
            // custom tool 不在本系统的工具目录中
            ChatCompletionMessageToolCalls::Custom(_) => None,
        })
        .map(|call| {
            let raw = call.function.arguments.as_str();
            // 非法 JSON 原样保留，交由注册表校验后转为错误结果
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            };
            let id = if call.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                call.id.clone()
            };
            ToolCall::new(id, call.function.name.clone(), arguments)
        })
        .collect();

    Completion {
        content,
        tool_calls,
        status: None,
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Completion, LlmError> {
        let request = self.build_request(messages, tools)?;
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "chat completion request"
        );

        let chat = self.client.chat();
        let call = chat.create(request);
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::Timeout(limit.as_secs()))?,
            None => call.await,
        }
        .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "token usage"
            );
        }

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
        Ok(parse_response_message(&choice.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tool() -> ToolSpec {
        ToolSpec {
            name: "read_file".to_string(),
            description: "Read a text file".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        }
    }

    fn request_json(messages: &[Message], tools: &[ToolSpec]) -> Value {
        serde_json::to_value(chat_request("m", messages, tools).unwrap()).unwrap()
    }

    fn response(value: Value) -> ChatCompletionResponseMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_supervisor_is_sent_as_user() {
        let body = request_json(&[Message::supervisor("do it")], &[]);
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "do it");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_tool_round_trip_shape() {
        let messages = vec![
            Message::agent_with_tool_calls(
                "",
                vec![ToolCall::new("call_1", "read_file", json!({"path": "a.txt"}))],
            ),
            Message::tool_result("call_1", "read_file", "hello"),
        ];
        let body = request_json(&messages, &[sample_tool()]);
        let assistant = &body["messages"][0];
        assert_eq!(assistant["role"], "assistant");
        assert!(assistant.get("content").is_none());
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], r#"{"path":"a.txt"}"#);
        assert_eq!(body["messages"][1]["role"], "tool");
        assert_eq!(body["messages"][1]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "path");
    }

    #[test]
    fn test_plain_agent_reply_keeps_content() {
        let body = request_json(&[Message::agent("done")], &[]);
        assert_eq!(body["messages"][0]["role"], "assistant");
        assert_eq!(body["messages"][0]["content"], "done");
        assert!(body["messages"][0].get("tool_calls").is_none());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let message = response(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "create_file", "arguments": "{\"path\":\"hello.py\",\"content\":\"print(1)\"}"}
            }]
        }));
        let completion = parse_response_message(&message);
        assert_eq!(completion.content, "");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_9");
        assert_eq!(completion.tool_calls[0].arguments["path"], "hello.py");
    }

    #[test]
    fn test_parse_response_keeps_malformed_arguments() {
        let message = response(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"id": "", "type": "function", "function": {"name": "read_file", "arguments": "{oops"}}]
        }));
        let completion = parse_response_message(&message);
        assert_eq!(completion.tool_calls[0].arguments, Value::String("{oops".to_string()));
        assert!(completion.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn test_parse_response_text_only() {
        let completion = parse_response_message(&response(json!({"role": "assistant", "content": "Hi"})));
        assert_eq!(completion.content, "Hi");
        assert!(completion.tool_calls.is_empty());
    }
}
