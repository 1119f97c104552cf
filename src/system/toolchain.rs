//! Subprocess runner
//!
//! Every external tool is started from a [`ToolCommand`]: explicit program,
//! leading arguments, working directory and environment. The child never sees
//! the parent's working directory or any variable not listed in the command.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::ToolCommand;
use satctl_core_interface::{ExternalError, Result};

/// Captured output of a finished tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stdout and stderr, for parsers that accept either
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs one configured tool
#[derive(Debug, Clone)]
pub struct ToolRunner {
    command: ToolCommand,
}

impl ToolRunner {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    fn label(&self) -> String {
        match self.command.args.first() {
            Some(first) => format!("{} {}", self.command.program, first),
            None => self.command.program.clone(),
        }
    }

    fn build(&self, args: &[String], env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .args(args)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for name in &self.command.inherit_env {
            if let Some(value) = std::env::var_os(name) {
                cmd.env(name, value);
            }
        }
        cmd.envs(&self.command.env);
        cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(cwd) = &self.command.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Run and capture output whatever the exit status
    pub async fn output(&self, args: &[String], env: &[(String, String)]) -> Result<ToolOutput> {
        debug!(tool = %self.label(), ?args, "running external tool");
        let output = self.build(args, env).output().await?;
        let result = ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(stdout = %result.stdout, stderr = %result.stderr, "tool output");
        Ok(result)
    }

    /// Run and fail with the verbatim stderr on a non-zero exit
    pub async fn run(&self, args: &[String], env: &[(String, String)]) -> Result<ToolOutput> {
        let output = self.output(args, env).await?;
        if output.success {
            Ok(output)
        } else {
            Err(ExternalError::ToolFailed {
                tool: self.label(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn shell(script: &str) -> ToolRunner {
        ToolRunner::new(ToolCommand::new("/bin/sh").with_args(["-c", script]))
    }

    #[tokio::test]
    async fn test_env_is_explicit() {
        let mut command = ToolCommand::new("/bin/sh").with_args(["-c", "echo \"$FROM_CONFIG:$FROM_CALL:$HOME\""]);
        command.inherit_env.clear();
        command.env = BTreeMap::from([("FROM_CONFIG".to_string(), "a".to_string())]);

        let output = ToolRunner::new(command)
            .run(&[], &[("FROM_CALL".to_string(), "b".to_string())])
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "a:b:");
    }

    #[tokio::test]
    async fn test_cwd_is_explicit() {
        let dir = TempDir::new().unwrap();
        let runner = ToolRunner::new(
            ToolCommand::new("/bin/sh")
                .with_args(["-c", "pwd"])
                .with_cwd(dir.path()),
        );
        let output = runner.run(&[], &[]).await.unwrap();
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_failure_keeps_stderr() {
        let err = shell("echo 'execution reverted' >&2; exit 3")
            .run(&[], &[])
            .await
            .unwrap_err();
        match err {
            ExternalError::ToolFailed { stderr, status, .. } => {
                assert_eq!(stderr, "execution reverted");
                assert!(status.contains('3'));
            }
            other => panic!("unexpected {other:?}"),
        }

        let output = shell("echo out; echo err >&2; exit 1")
            .output(&[], &[])
            .await
            .unwrap();
        assert!(!output.success);
        assert!(output.combined().contains("err"));
    }
}
