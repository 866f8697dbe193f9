//! External node tools (`tsc`, `lessc`).
//!
//! The project's own `node_modules/.bin` is preferred over `PATH` so the
//! version pinned by the package is the one that runs.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct NodeTool {
    name: &'static str,
    program: PathBuf,
}

impl NodeTool {
    /// Find `name` under `cwd/**/node_modules/.bin` (walking up) or on `PATH`.
    pub fn locate(name: &'static str, cwd: &Path) -> Result<Self> {
        let local = cwd
            .ancestors()
            .map(|dir| dir.join("node_modules").join(".bin").join(name))
            .find(|candidate| candidate.is_file());

        let program = match local {
            Some(path) => path,
            None => which::which(name).map_err(|_| Error::Tool {
                tool: name.to_string(),
                message: format!(
                    "`{name}` not found in node_modules/.bin or PATH; install it as a dev dependency"
                ),
            })?,
        };
        debug!(tool = name, program = %program.display(), "located tool");
        Ok(Self { name, program })
    }

    /// Whether the tool can be found at all.
    pub fn is_available(name: &'static str, cwd: &Path) -> bool {
        Self::locate(name, cwd).is_ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn command(&self, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    /// Run to completion and return stdout. Non-zero exit is an error
    /// carrying stderr (or stdout when stderr is empty).
    pub async fn output(&self, cwd: &Path, args: &[String]) -> Result<String> {
        let output = self
            .command(cwd)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Tool {
                tool: self.name.to_string(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr.into_owned()
        };
        Err(Error::Tool {
            tool: self.name.to_string(),
            message: message.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn prefers_local_bin() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("node_modules/.bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("lessc"), "").unwrap();

        let nested = dir.path().join("packages/a");
        std::fs::create_dir_all(&nested).unwrap();
        let tool = NodeTool::locate("lessc", &nested).unwrap();
        assert_eq!(tool.program, bin.join("lessc"));
        assert_eq!(tool.name(), "lessc");
    }
}
