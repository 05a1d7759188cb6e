//! Terraform execution session
//!
//! A [`Terraform`] handle binds one executable to one working directory and
//! runs `init`, `plan`, `apply` and `output` as child processes. Stdout of
//! every lifecycle command is appended to a buffer owned by the session so
//! the caller can log it once the operation is over.

use crate::error::TerraformError;
use crate::outputs::{parse_outputs, OutputSet};
use crate::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

/// `plan -detailed-exitcode` exit status meaning "succeeded, changes present"
const PLAN_CHANGES_PRESENT: i32 = 2;

/// Options for `terraform init`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    /// Pass `-upgrade` to refresh providers and modules
    pub upgrade: bool,
    /// `-backend-config=key=value` pairs, in order
    pub backend_config: Vec<(String, String)>,
}

/// Options shared by `terraform plan` and `terraform apply`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Refresh state before computing changes
    pub refresh: bool,
    /// `-var key=value` pairs, in order
    pub vars: Vec<(String, String)>,
    /// `-var-file`, relative to the working directory
    pub var_file: Option<PathBuf>,
}

/// Apply takes the same variable configuration as plan
pub type ApplyOptions = PlanOptions;

/// Cancels whatever command the owning session is running, and every
/// command started afterwards.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A Terraform session bound to a working directory and executable
#[derive(Debug)]
pub struct Terraform {
    working_dir: PathBuf,
    exec_path: PathBuf,
    stdout: Mutex<String>,
    cancel: CancelHandle,
}

impl Terraform {
    /// Open a session. The working directory must already exist.
    pub fn new(working_dir: impl Into<PathBuf>, exec_path: impl Into<PathBuf>) -> Result<Self> {
        let working_dir = working_dir.into();
        let exec_path = exec_path.into();

        if exec_path.as_os_str().is_empty() {
            return Err(TerraformError::EmptyExecPath);
        }
        if !working_dir.is_dir() {
            return Err(TerraformError::WorkingDirNotFound(working_dir));
        }

        let (tx, _rx) = watch::channel(false);
        Ok(Terraform {
            working_dir,
            exec_path,
            stdout: Mutex::new(String::new()),
            cancel: CancelHandle { tx: Arc::new(tx) },
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn exec_path(&self) -> &Path {
        &self.exec_path
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drain everything captured from lifecycle command stdout so far.
    pub fn take_stdout(&self) -> String {
        let mut buf = self.stdout.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    /// `terraform init`
    pub async fn init(&self, opts: &InitOptions) -> Result<()> {
        self.run(init_args(opts), true, &[0]).await?;
        Ok(())
    }

    /// `terraform plan`. Returns `true` when the plan contains changes.
    pub async fn plan(&self, opts: &PlanOptions) -> Result<bool> {
        self.check_var_file(opts)?;
        let code = self
            .run(plan_args(opts), true, &[0, PLAN_CHANGES_PRESENT])
            .await?;
        Ok(code == PLAN_CHANGES_PRESENT)
    }

    /// `terraform apply -auto-approve`
    pub async fn apply(&self, opts: &ApplyOptions) -> Result<()> {
        self.check_var_file(opts)?;
        self.run(apply_args(opts), true, &[0]).await?;
        Ok(())
    }

    /// `terraform output -json`
    ///
    /// Output stdout carries sensitive values in clear text, so it is parsed
    /// directly and never appended to the session buffer.
    pub async fn outputs(&self) -> Result<OutputSet> {
        let args = vec!["output".to_string(), "-no-color".to_string(), "-json".to_string()];
        let stdout = self.run_captured(args, false, &[0]).await?.1;
        parse_outputs(stdout.as_bytes())
    }

    fn check_var_file(&self, opts: &PlanOptions) -> Result<()> {
        if let Some(var_file) = &opts.var_file {
            let path = self.working_dir.join(var_file);
            if !path.is_file() {
                return Err(TerraformError::VarFileNotFound(path));
            }
        }
        Ok(())
    }

    async fn run(&self, args: Vec<String>, capture: bool, ok_codes: &[i32]) -> Result<i32> {
        Ok(self.run_captured(args, capture, ok_codes).await?.0)
    }

    async fn run_captured(
        &self,
        args: Vec<String>,
        capture: bool,
        ok_codes: &[i32],
    ) -> Result<(i32, String)> {
        let command_line = format!("{} {}", self.exec_path.display(), args.join(" "));

        let mut cancelled = self.cancel.tx.subscribe();
        if *cancelled.borrow() {
            return Err(TerraformError::Cancelled(command_line));
        }

        debug!("Running {}", command_line);
        let start = Instant::now();

        let child = Command::new(&self.exec_path)
            .args(&args)
            .current_dir(&self.working_dir)
            .env("TF_IN_AUTOMATION", "1")
            .env("CHECKPOINT_DISABLE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TerraformError::Launch {
                command: command_line.clone(),
                source,
            })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancelled.wait_for(|c| *c) => {
                return Err(TerraformError::Cancelled(command_line));
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        info!(command = %args[0], exit_code = code, duration_ms, "Terraform command finished");

        if capture {
            let mut buf = self.stdout.lock().unwrap_or_else(|e| e.into_inner());
            buf.push_str(&stdout);
        }

        if !ok_codes.contains(&code) {
            return Err(TerraformError::CommandFailed {
                command: command_line,
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok((code, stdout))
    }
}

pub(crate) fn init_args(opts: &InitOptions) -> Vec<String> {
    let mut args = vec![
        "init".to_string(),
        "-no-color".to_string(),
        "-input=false".to_string(),
    ];
    if opts.upgrade {
        args.push("-upgrade".to_string());
    }
    for (key, value) in &opts.backend_config {
        args.push(format!("-backend-config={}={}", key, value));
    }
    args
}

fn change_args(command: &str, extra: &[&str], opts: &PlanOptions) -> Vec<String> {
    let mut args = vec![
        command.to_string(),
        "-no-color".to_string(),
        "-input=false".to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    args.push(format!("-refresh={}", opts.refresh));
    for (key, value) in &opts.vars {
        args.push("-var".to_string());
        args.push(format!("{}={}", key, value));
    }
    if let Some(var_file) = &opts.var_file {
        args.push(format!("-var-file={}", var_file.display()));
    }
    args
}

pub(crate) fn plan_args(opts: &PlanOptions) -> Vec<String> {
    change_args("plan", &["-detailed-exitcode"], opts)
}

pub(crate) fn apply_args(opts: &ApplyOptions) -> Vec<String> {
    change_args("apply", &["-auto-approve"], opts)
}
