pub mod create_file;
pub mod delete;
pub mod edit_file;
pub mod read_file;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::model::ToolDefinition;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(
        &self,
        workspace_root: &Path,
        input: serde_json::Value,
    ) -> Result<ToolOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// Normal text result returned to the model.
    Success(String),
    /// Error text returned to the model (the agent can recover).
    Error(String),
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error(_))
    }

    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Success(text) | ToolOutput::Error(text) => text,
        }
    }
}

/// Pull a required string argument out of the tool input, or return early
/// with error text the model can act on.
macro_rules! require_param {
    ($input:expr, $name:literal) => {
        match $input[$name].as_str() {
            Some(value) => value,
            None => {
                return Ok($crate::agent::tools::ToolOutput::Error(format!(
                    "Missing '{}' parameter",
                    $name
                )))
            }
        }
    };
}
pub(crate) use require_param;

/// Same as [`require_param!`] for 1-indexed line numbers.
macro_rules! require_line {
    ($input:expr, $name:literal) => {
        match $input[$name].as_u64() {
            Some(value) if value >= 1 => value as usize,
            _ => {
                return Ok($crate::agent::tools::ToolOutput::Error(format!(
                    "'{}' must be a positive 1-indexed line number",
                    $name
                )))
            }
        }
    };
}
pub(crate) use require_line;

/// Resolve a model-supplied path inside the workspace, turning rejection into tool error text.
pub fn verified_path(
    workspace_root: &Path,
    relative_path: &str,
) -> std::result::Result<PathBuf, ToolOutput> {
    crate::workspace::verify_path(workspace_root, relative_path).map_err(|e| match e {
        AppError::Workspace(msg) => ToolOutput::Error(msg),
        other => ToolOutput::Error(other.to_string()),
    })
}

/// Prefix each line with its 1-indexed number, `"{n}. {line}"`.
pub fn number_lines<'a>(lines: impl IntoIterator<Item = &'a str>, first: usize) -> String {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| format!("{}. {}", first + i, line.trim_end_matches(['\n', '\r'])))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Full toolset for the edit loop.
    pub fn file_editing(max_file_lines: usize) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(read_file::ReadFileTool::new(max_file_lines)),
            Box::new(read_file::ReadFileRangeTool),
            Box::new(create_file::CreateFileTool),
            Box::new(delete::DeleteTool),
            Box::new(edit_file::EditFileTool),
        ];

        Self { tools }
    }

    /// Inspection-only toolset, used by the reviewer.
    pub fn read_only(max_file_lines: usize) -> Self {
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(read_file::ReadFileTool::new(max_file_lines)),
            Box::new(read_file::ReadFileRangeTool),
        ];

        Self { tools }
    }

    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_lines() {
        assert_eq!(number_lines(["a\n", "b"], 4), "4. a\n5. b");
        assert_eq!(number_lines(Vec::<&str>::new(), 1), "");
    }

    #[test]
    fn test_registries() {
        let editing = ToolRegistry::file_editing(1000);
        assert_eq!(
            editing.names(),
            vec![
                "read_file",
                "read_file_with_line_numbers",
                "create_file",
                "delete",
                "edit_file"
            ]
        );
        assert!(ToolRegistry::read_only(1000).get("edit_file").is_none());
        assert!(ToolRegistry::empty().definitions().is_empty());
    }

    #[test]
    fn test_verified_path_reports_text() {
        let tmp = tempfile::tempdir().unwrap();
        let err = verified_path(tmp.path(), "/abs/path.rs").unwrap_err();
        assert_eq!(
            err,
            ToolOutput::Error("/abs/path.rs is an absolute path, not a relative path".to_string())
        );
    }
}
