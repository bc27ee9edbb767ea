//! External tool discovery and execution.
//!
//! Tool locations are resolved once at construction via a PATH
//! lookup; a missing tool only becomes an error when an item actually
//! needs it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::StageError;

/// The external tools the pipeline can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Aria2c,
    Curl,
    Ffmpeg,
    Mp4Box,
    Mp4Decrypt,
    Packager,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Aria2c => "aria2c",
            Tool::Curl => "curl",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Mp4Box => "MP4Box",
            Tool::Mp4Decrypt => "mp4decrypt",
            Tool::Packager => "packager",
        }
    }
}

/// Names (or explicit paths) to look the tools up by.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub aria2c: String,
    pub curl: String,
    pub ffmpeg: String,
    pub mp4box: String,
    pub mp4decrypt: String,
    pub packager: String,
}

impl Default for ToolConfig {
    fn default() -> ToolConfig {
        ToolConfig {
            aria2c: "aria2c".to_string(),
            curl: "curl".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            mp4box: "MP4Box".to_string(),
            mp4decrypt: "mp4decrypt".to_string(),
            packager: "packager".to_string(),
        }
    }
}

/// Resolved tool locations.
#[derive(Debug, Clone, Default)]
pub struct Tools {
    pub(crate) aria2c: Option<PathBuf>,
    pub(crate) curl: Option<PathBuf>,
    pub(crate) ffmpeg: Option<PathBuf>,
    pub(crate) mp4box: Option<PathBuf>,
    pub(crate) mp4decrypt: Option<PathBuf>,
    pub(crate) packager: Option<PathBuf>,
    /// Suppress tool stdout/stderr.
    pub quiet: bool,
}

impl Tools {
    pub fn discover(config: &ToolConfig) -> Tools {
        Tools {
            aria2c: which::which(&config.aria2c).ok(),
            curl: which::which(&config.curl).ok(),
            ffmpeg: which::which(&config.ffmpeg).ok(),
            mp4box: which::which(&config.mp4box).ok(),
            mp4decrypt: which::which(&config.mp4decrypt).ok(),
            packager: which::which(&config.packager).ok(),
            quiet: false,
        }
    }

    fn path(&self, tool: Tool) -> Option<&Path> {
        let path = match tool {
            Tool::Aria2c => &self.aria2c,
            Tool::Curl => &self.curl,
            Tool::Ffmpeg => &self.ffmpeg,
            Tool::Mp4Box => &self.mp4box,
            Tool::Mp4Decrypt => &self.mp4decrypt,
            Tool::Packager => &self.packager,
        };
        path.as_deref()
    }

    pub fn available(&self, tool: Tool) -> bool {
        self.path(tool).is_some()
    }

    /// Location of `tool`, or the skip condition naming it.
    pub fn require(&self, tool: Tool) -> Result<&Path, StageError> {
        self.path(tool)
            .ok_or_else(|| StageError::DependencyNotFound(tool.name().to_string()))
    }

    /// Run `tool` to completion; non-zero exit becomes `ToolFailed`.
    pub async fn run<I, S>(&self, tool: Tool, args: I) -> Result<(), StageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.require(tool)?;
        let mut command = Command::new(program);
        command.args(args);
        if self.quiet {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        tracing::debug!(tool = tool.name(), "running external tool");
        let status = command.status().await?;
        if !status.success() {
            return Err(StageError::ToolFailed {
                tool: tool.name().to_string(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}
