//! 工具箱：注册表、参数 schema、文件系统工具、run_command 与执行器

pub mod executor;
pub mod filesystem;
pub mod registry;
pub mod schema;
pub mod shell;

use std::path::Path;

pub use executor::ToolExecutor;
pub use filesystem::{
    CreateFileTool, CreateFolderTool, DeleteFileTool, DeleteFolderTool, ListFilesTool,
    ReadFileTool, Workspace, WriteFileTool,
};
pub use registry::{Tool, ToolError, ToolRegistry};
pub use schema::{args_schema, validate_args};
pub use shell::ShellTool;

/// 内置工具目录：七个文件工具；shell 为 Some 时额外注册 run_command
pub fn builtin_registry(
    workspace_root: impl AsRef<Path>,
    shell: Option<ShellTool>,
) -> Result<ToolRegistry, ToolError> {
    let workspace = Workspace::new(workspace_root);
    let mut tools = ToolRegistry::new();
    tools.register(ReadFileTool::new(workspace.clone()))?;
    tools.register(WriteFileTool::new(workspace.clone()))?;
    tools.register(CreateFileTool::new(workspace.clone()))?;
    tools.register(DeleteFileTool::new(workspace.clone()))?;
    tools.register(ListFilesTool::new(workspace.clone()))?;
    tools.register(CreateFolderTool::new(workspace.clone()))?;
    tools.register(DeleteFolderTool::new(workspace))?;
    if let Some(shell) = shell {
        tools.register(shell)?;
    }
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let without_shell = builtin_registry(dir.path(), None).unwrap();
        assert_eq!(
            without_shell.tool_names(),
            vec![
                "read_file",
                "write_file",
                "create_file",
                "delete_file",
                "get_all_file_paths",
                "create_folder",
                "delete_folder",
            ]
        );
        assert!(!without_shell.contains("run_command"));

        let with_shell = builtin_registry(dir.path(), Some(ShellTool::new(dir.path(), 5))).unwrap();
        assert!(with_shell.contains("run_command"));
        assert_eq!(with_shell.len(), 8);
    }
}
