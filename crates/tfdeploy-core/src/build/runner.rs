//! Build step execution.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::stage::BuildStep;
use super::Builder;
use crate::error::{DeployError, Result};

/// Result of a single build step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Lambda the step ran for.
    pub artifact: String,

    /// Which step ran.
    pub step: BuildStep,

    /// Exit code (0 = success, -1 = killed by signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl StepResult {
    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Step stdout with trailing whitespace removed, if it printed anything.
    pub fn stdout_lines(&self) -> Option<&str> {
        let out = self.stdout.trim_end();
        (!out.trim_start().is_empty()).then_some(out)
    }
}

/// Runs build steps as child processes of the configured build tool.
#[derive(Debug, Clone)]
pub struct MakeBuilder {
    program: String,
}

impl Default for MakeBuilder {
    fn default() -> Self {
        MakeBuilder::new("make")
    }
}

impl MakeBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        MakeBuilder {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Execute one step inside `dir` and return its result.
    ///
    /// A step that cannot be launched is an error; a step that runs and exits
    /// non-zero is reported through [`StepResult::passed`].
    pub async fn execute_step(
        &self,
        artifact: &str,
        dir: &Path,
        step: BuildStep,
    ) -> std::io::Result<StepResult> {
        let start = Instant::now();
        let command = step.command(&self.program);

        let output = Command::new(&command[0])
            .args(&command[1..])
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(StepResult {
            artifact: artifact.to_string(),
            step,
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn run_step(&self, artifact: &str, dir: &Path, step: BuildStep) -> Result<()> {
        let command = step.command(&self.program).join(" ");
        let result = self
            .execute_step(artifact, dir, step)
            .await
            .map_err(|e| DeployError::BuildStep {
                artifact: artifact.to_string(),
                command: command.clone(),
                reason: format!("failed to start in {:?}: {}", dir, e),
            })?;

        debug!(
            artifact = %artifact,
            step = %step,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "Build step finished"
        );
        if let Some(stdout) = result.stdout_lines() {
            debug!(artifact = %artifact, step = %step, "{}", stdout);
        }

        if !result.passed() {
            return Err(DeployError::BuildStep {
                artifact: artifact.to_string(),
                command,
                reason: format!(
                    "exited with code {}: {}",
                    result.exit_code,
                    result.stderr.trim()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Builder for MakeBuilder {
    async fn test(&self, artifact: &str, dir: &Path) -> Result<()> {
        self.run_step(artifact, dir, BuildStep::Test).await
    }

    async fn build(&self, artifact: &str, dir: &Path) -> Result<()> {
        self.run_step(artifact, dir, BuildStep::Target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn result(exit_code: i32) -> StepResult {
        StepResult {
            artifact: "authorizer".to_string(),
            step: BuildStep::Test,
            exit_code,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
        }
    }

    #[test]
    fn test_step_result_passed() {
        assert!(result(0).passed());
        assert!(!result(2).passed());
        assert!(!result(-1).passed());
    }

    #[test]
    fn test_stdout_lines() {
        assert_eq!(result(0).stdout_lines(), None);

        let mut noisy = result(0);
        noisy.stdout = "  \n\t\n".to_string();
        assert_eq!(noisy.stdout_lines(), None);

        noisy.stdout = "ok 3 tests\nbuilt bootstrap.zip\n\n".to_string();
        assert_eq!(noisy.stdout_lines(), Some("ok 3 tests\nbuilt bootstrap.zip"));
    }

    #[test]
    fn test_default_program_is_make() {
        assert_eq!(MakeBuilder::default().program(), "make");
    }

    #[tokio::test]
    async fn test_execute_step_captures_output() {
        let dir = tempdir().unwrap();
        let builder = MakeBuilder::new("echo");

        let result = builder
            .execute_step("authorizer", dir.path(), BuildStep::Target)
            .await
            .expect("execute failed");
        assert!(result.passed());
        assert_eq!(result.stdout.trim(), "target");
    }

    #[tokio::test]
    async fn test_passing_steps() {
        let dir = tempdir().unwrap();
        let builder = MakeBuilder::new("true");

        builder.test("authorizer", dir.path()).await.expect("test step");
        builder.build("authorizer", dir.path()).await.expect("target step");
    }

    #[tokio::test]
    async fn test_failing_step_is_error() {
        let dir = tempdir().unwrap();
        let builder = MakeBuilder::new("false");

        let err = builder.test("authorizer", dir.path()).await.unwrap_err();
        match err {
            DeployError::BuildStep {
                artifact, command, ..
            } => {
                assert_eq!(artifact, "authorizer");
                assert_eq!(command, "false test");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let dir = tempdir().unwrap();
        let builder = MakeBuilder::new("true");

        let err = builder
            .build("ghost", &dir.path().join("ghost"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let dir = tempdir().unwrap();
        let builder = MakeBuilder::new("/nonexistent/make");

        let err = builder.test("authorizer", dir.path()).await.unwrap_err();
        assert!(matches!(err, DeployError::BuildStep { .. }));
    }
}
