//! 文件系统工具
//!
//! Workspace 绑定根目录：相对路径按根目录解析，`..` 越出根目录的路径被拒绝。
//! 目标可以尚不存在：取其最深的已存在祖先做规范化，因此经符号链接指向根目录外的路径同样被拒绝。
//! 七个工具（read_file / write_file / create_file / delete_file / get_all_file_paths /
//! create_folder / delete_folder）都在 Workspace 上操作，内部错误以文本返回。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

/// 工具的工作目录
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// 根目录不存在时创建
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&root) {
            tracing::warn!(root = %root.display(), "failed to create workspace: {}", e);
        }
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析工具参数中的路径
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let path = path.trim();
        if path.is_empty() {
            return Err("Empty path".to_string());
        }
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(format!("Path escapes workspace: {}", path));
        }
        let real = canonicalize_existing(&normalized)
            .ok_or_else(|| format!("Cannot resolve path: {}", path))?;
        if real.starts_with(&self.root) {
            Ok(real)
        } else {
            Err(format!("Path escapes workspace: {}", path))
        }
    }
}

/// 规范化最深的已存在祖先，再接回尚不存在的部分。
/// 悬空的符号链接无法判断指向，返回 None
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(real) => {
                return Some(missing.iter().rev().fold(real, |acc, part| acc.join(part)));
            }
            Err(_) if std::fs::symlink_metadata(&existing).is_ok() => return None,
            Err(_) => {
                missing.push(existing.file_name()?.to_os_string());
                existing.pop();
            }
        }
    }
}

/// 词法规范化：去掉 `.`，`..` 回退一级
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PathArgs {
    #[schemars(description = "File path, relative to the workspace")]
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteArgs {
    #[schemars(description = "File path, relative to the workspace")]
    path: String,
    #[schemars(description = "Full text content of the file")]
    content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DirectoryArgs {
    #[schemars(description = "Directory to list recursively, relative to the workspace")]
    directory: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FolderArgs {
    #[schemars(description = "Folder path, relative to the workspace")]
    path: String,
}

fn write_text(workspace: &Workspace, path: &str, content: &str) -> Result<(), String> {
    let resolved = workspace.resolve(path)?;
    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create parent directory: {}", e))?;
    }
    std::fs::write(&resolved, content).map_err(|e| format!("Write failed: {}", e))
}

/// read_file：读取文本文件
pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a text file."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<PathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: PathArgs = parse_args(args)?;
        tracing::info!(path = %args.path, "read_file tool execute");
        let resolved = self.workspace.resolve(&args.path)?;
        std::fs::read_to_string(&resolved)
            .map(Value::String)
            .map_err(|e| format!("Read failed for {}: {}", args.path, e))
    }
}

/// write_file：覆盖写入（不存在则创建）
pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content into a text file (overwrites if it already exists)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<WriteArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: WriteArgs = parse_args(args)?;
        tracing::info!(path = %args.path, bytes = args.content.len(), "write_file tool execute");
        write_text(&self.workspace, &args.path, &args.content)?;
        Ok(Value::String(format!("Content successfully written to {}", args.path)))
    }
}

/// create_file：创建新文件（已存在则覆盖）
pub struct CreateFileTool {
    workspace: Workspace,
}

impl CreateFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new text file with the given content."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<WriteArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: WriteArgs = parse_args(args)?;
        tracing::info!(path = %args.path, bytes = args.content.len(), "create_file tool execute");
        write_text(&self.workspace, &args.path, &args.content)?;
        Ok(Value::String(format!(
            "File {} has been created with the provided content.",
            args.path
        )))
    }
}

/// delete_file：存在则删除
pub struct DeleteFileTool {
    workspace: Workspace,
}

impl DeleteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a text file."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<PathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: PathArgs = parse_args(args)?;
        tracing::info!(path = %args.path, "delete_file tool execute");
        let resolved = self.workspace.resolve(&args.path)?;
        if !resolved.exists() {
            return Ok(Value::String(format!("File {} does not exist.", args.path)));
        }
        if resolved.is_dir() {
            return Err(format!("{} is a directory, use delete_folder", args.path));
        }
        std::fs::remove_file(&resolved).map_err(|e| format!("Delete failed: {}", e))?;
        Ok(Value::String(format!("File {} has been deleted.", args.path)))
    }
}

/// get_all_file_paths：递归列出目录下所有文件；目录不存在时返回空列表
pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "get_all_file_paths"
    }

    fn description(&self) -> &str {
        "Get all file paths inside a directory (recursively)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<DirectoryArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: DirectoryArgs = parse_args(args)?;
        tracing::info!(directory = %args.directory, "get_all_file_paths tool execute");
        let resolved = self.workspace.resolve(&args.directory)?;
        if !resolved.is_dir() {
            return Ok(Value::Array(Vec::new()));
        }
        let mut paths = Vec::new();
        for entry in WalkDir::new(&resolved).sort_by_file_name() {
            let entry = entry.map_err(|e| format!("List failed: {}", e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&resolved).unwrap_or(entry.path());
            let shown = Path::new(&args.directory).join(relative);
            paths.push(Value::String(shown.to_string_lossy().to_string()));
        }
        Ok(Value::Array(paths))
    }
}

/// create_folder：递归创建，幂等
pub struct CreateFolderTool {
    workspace: Workspace,
}

impl CreateFolderTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreateFolderTool {
    fn name(&self) -> &str {
        "create_folder"
    }

    fn description(&self) -> &str {
        "Create a new folder (including parent directories if needed)."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<FolderArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: FolderArgs = parse_args(args)?;
        tracing::info!(path = %args.path, "create_folder tool execute");
        let resolved = self.workspace.resolve(&args.path)?;
        std::fs::create_dir_all(&resolved).map_err(|e| format!("Create folder failed: {}", e))?;
        Ok(Value::String(format!("Folder {} has been created.", args.path)))
    }
}

/// delete_folder：存在则递归删除；不允许删除工作区根目录
pub struct DeleteFolderTool {
    workspace: Workspace,
}

impl DeleteFolderTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for DeleteFolderTool {
    fn name(&self) -> &str {
        "delete_folder"
    }

    fn description(&self) -> &str {
        "Delete a folder and all its contents."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<FolderArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: FolderArgs = parse_args(args)?;
        tracing::info!(path = %args.path, "delete_folder tool execute");
        let resolved = self.workspace.resolve(&args.path)?;
        if resolved == self.workspace.root() {
            return Err("Refusing to delete the workspace root".to_string());
        }
        if !resolved.exists() {
            return Ok(Value::String(format!("Folder {} does not exist.", args.path)));
        }
        std::fs::remove_dir_all(&resolved).map_err(|e| format!("Delete folder failed: {}", e))?;
        Ok(Value::String(format!("Folder {} has been deleted.", args.path)))
    }
}
