//! File Reader Tool (§4.4): reads a local file back into the
//! conversation, restricted to an allowed base directory so an agent
//! cannot read arbitrary paths on the host.
//!
//! Path-containment and extension checks are never-throw the same way
//! as the other tools: a rejected path comes back as `{"error": ...}`
//! rather than propagating a [`crate::error::Error`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, IoError, Result};
use crate::io;
use crate::progress::ProgressHandle;

use super::Tool;

/// Extensions the File Reader tool will open, matching the plain-text
/// and markup formats a research agent can reasonably digest.
const ALLOWED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "yaml", "yml", "log"];

/// Largest file the tool will return inline before truncating.
const MAX_INLINE_CHARS: usize = 200_000;

#[derive(Debug, Deserialize)]
struct FileReaderInput {
    path: String,
}

/// The File Reader Tool: reads files under a fixed allowed base
/// directory, rejecting anything outside it or with an unsupported
/// extension.
pub struct FileReaderTool {
    allowed_base: PathBuf,
}

impl FileReaderTool {
    /// Creates the tool, restricting every read to within
    /// `allowed_base`.
    pub fn new<P: AsRef<Path>>(allowed_base: P) -> Self {
        Self {
            allowed_base: allowed_base.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for FileReaderTool {
    fn name(&self) -> &str {
        "file_reader"
    }

    fn description(&self) -> &str {
        "Reads the content of a local file (plain text, markdown, CSV, JSON, YAML, or log) within the mission's allowed workspace."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file to read, relative to or inside the allowed workspace."}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, _progress: Option<&ProgressHandle>) -> Result<Value> {
        let args: FileReaderInput = match serde_json::from_value(input) {
            Ok(args) => args,
            Err(e) => {
                return Ok(serde_json::json!({ "error": format!("invalid file_reader arguments: {e}") }));
            }
        };

        let requested = PathBuf::from(&args.path);

        let allowed_base = self.allowed_base.clone();
        let result = tokio::task::spawn_blocking(move || read_within(&requested, &allowed_base))
            .await
            .map_err(|e| Error::from(IoError::Generic(e.to_string())))?;

        match result {
            Ok(mut content) => {
                let truncated = content.chars().count() > MAX_INLINE_CHARS;
                if truncated {
                    content = content.chars().take(MAX_INLINE_CHARS).collect();
                }
                Ok(serde_json::json!({ "content": content, "truncated": truncated }))
            }
            Err(message) => Ok(serde_json::json!({ "error": message })),
        }
    }
}

fn read_within(path: &Path, allowed_base: &Path) -> std::result::Result<String, String> {
    io::validate_containment(path, allowed_base).map_err(|e| e.to_string())?;
    io::validate_extension(path, ALLOWED_EXTENSIONS).map_err(|e| e.to_string())?;
    io::read_file(path).map_err(|e| e.to_string())
}
