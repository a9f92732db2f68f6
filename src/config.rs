//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub supervisor: SupervisorSection,
}

/// [app] 段：会话 id、工作目录、循环步数上限、轮次超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 默认会话 id
    pub session_id: String,
    /// 文件工具的根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 单轮内状态转移次数上限，0 表示不限
    pub max_steps: usize,
    /// 调用方施加的单轮超时（秒），0 表示不限
    pub turn_timeout_secs: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            session_id: "1".to_string(),
            workspace_root: None,
            max_steps: 200,
            turn_timeout_secs: 0,
        }
    }
}

/// [llm] 段：后端、初始模型、可选模型集合
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；有 API Key 时才会真正走远端
    pub provider: String,
    /// 启动时的活动模型，必须在 models 中
    pub model: String,
    pub base_url: Option<String>,
    /// 可切换的模型集合（固定、可枚举）
    pub models: Vec<String>,
    /// 单次补全请求超时（秒），0 表示不限
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            models: default_models(),
            request_timeout_secs: 120,
        }
    }
}

fn default_models() -> Vec<String> {
    vec![
        "deepseek-chat".into(),
        "deepseek-reasoner".into(),
        "gpt-4o".into(),
        "gpt-4o-mini".into(),
        "gpt-4.1".into(),
        "gpt-4.1-mini".into(),
    ]
}

/// [tools] 段：工具超时与 Shell 能力开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒），0 表示不限；超时转为错误结果
    pub tool_timeout_secs: u64,
    pub shell: ShellSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 300,
            shell: ShellSection::default(),
        }
    }
}

/// [tools.shell] 段：run_command 需要嵌入方显式开启
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    pub enabled: bool,
    /// 单条命令超时（秒），0 表示不限
    pub timeout_secs: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 120,
        }
    }
}

/// [supervisor] 段：控制标记与可选的指令覆盖
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub completion_marker: String,
    pub clarification_marker: String,
    /// 覆盖默认 Supervisor 指令
    pub prompt: Option<String>,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            completion_marker: "Project is done".to_string(),
            clarification_marker: "Ask user:".to_string(),
            prompt: None,
        }
    }
}

impl AppConfig {
    /// 工作目录：配置 > 当前目录下的 workspace
    pub fn workspace_root(&self) -> PathBuf {
        self.app.workspace_root.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("workspace")
        })
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    if let Some(name) = default_names
        .into_iter()
        .find(|name| std::path::Path::new(&format!("{}.toml", name)).exists())
    {
        builder = builder.add_source(config::File::with_name(name).required(false));
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 加载配置，失败时记录警告并回退到默认值
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}
