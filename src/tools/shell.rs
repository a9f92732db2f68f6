//! Shell 命令工具：run_command
//!
//! 以 sh -c / cmd /C 在工作区目录执行任意命令，捕获 stdout/stderr；非零退出码不视为异常。
//! 这是一个信任边界：只有嵌入方显式开启（配置 tools.shell.enabled）时才会注册。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

#[derive(Debug, Deserialize, JsonSchema)]
struct CommandArgs {
    #[schemars(description = "The shell command to execute")]
    command: String,
}

/// Shell 工具：执行命令并把结果转为状态文本
pub struct ShellTool {
    workdir: PathBuf,
    timeout_secs: u64,
}

impl ShellTool {
    /// timeout_secs 为 0 表示不限
    pub fn new(workdir: impl AsRef<Path>, timeout_secs: u64) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            timeout_secs,
        }
    }

    async fn run(&self, command: &str) -> String {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&self.workdir).kill_on_drop(true);

        let output = if self.timeout_secs > 0 {
            match tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return format!("Exception: Command timed out after {}s", self.timeout_secs)
                }
            }
        } else {
            cmd.output().await
        };

        match output {
            Ok(output) if output.status.success() => format!(
                "Command executed successfully:\n{}",
                String::from_utf8_lossy(&output.stdout)
            ),
            Ok(output) => format!(
                "Error executing command:\n{}",
                String::from_utf8_lossy(&output.stderr)
            ),
            Err(e) => format!("Exception: {}", e),
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace and return its output (or error)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<CommandArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: CommandArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        let command = args.command.trim();
        if command.is_empty() {
            return Err("Empty command".to_string());
        }
        tracing::info!(command = %command, "run_command tool execute");
        Ok(Value::String(self.run(command).await))
    }
}
