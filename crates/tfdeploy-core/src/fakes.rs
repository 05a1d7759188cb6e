//! In-memory fakes for the build and provisioning seams (testing only)
//!
//! Provides `RecordingBuilder`, `FakeProvisioner` and `FakeProvisionerSource`
//! that record every call without spawning any process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use terraform_manager::{
    ApplyOptions, InitOptions, OutputSet, PlanOptions, TerraformError,
};

use crate::build::Builder;
use crate::error::{DeployError, Result};
use crate::provision::{Provisioner, ProvisionerSource};

// ---------------------------------------------------------------------------
// RecordingBuilder
// ---------------------------------------------------------------------------

/// One recorded build tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildCall {
    Test(String),
    Build(String),
}

/// Builder that records calls and optionally fails on one of them.
#[derive(Debug, Default)]
pub struct RecordingBuilder {
    calls: Mutex<Vec<(BuildCall, PathBuf)>>,
    fail_on: Option<BuildCall>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (after recording) when `call` is made.
    pub fn failing_on(call: BuildCall) -> Self {
        RecordingBuilder {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(call),
        }
    }

    pub fn calls(&self) -> Vec<BuildCall> {
        let calls = self.calls.lock().unwrap();
        calls.iter().map(|(call, _)| call.clone()).collect()
    }

    /// Directory each call was made in, in call order.
    pub fn dirs(&self) -> Vec<PathBuf> {
        let calls = self.calls.lock().unwrap();
        calls.iter().map(|(_, dir)| dir.clone()).collect()
    }

    fn record(&self, call: BuildCall, dir: &Path) -> Result<()> {
        self.calls.lock().unwrap().push((call.clone(), dir.to_path_buf()));
        if self.fail_on.as_ref() == Some(&call) {
            let (artifact, command) = match call {
                BuildCall::Test(a) => (a, "make test"),
                BuildCall::Build(a) => (a, "make target"),
            };
            return Err(DeployError::BuildStep {
                artifact,
                command: command.to_string(),
                reason: "exited with code 2".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Builder for RecordingBuilder {
    async fn test(&self, artifact: &str, dir: &Path) -> Result<()> {
        self.record(BuildCall::Test(artifact.to_string()), dir)
    }

    async fn build(&self, artifact: &str, dir: &Path) -> Result<()> {
        self.record(BuildCall::Build(artifact.to_string()), dir)
    }
}

// ---------------------------------------------------------------------------
// FakeProvisioner
// ---------------------------------------------------------------------------

/// One recorded provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionerCall {
    Init(InitOptions),
    Plan(PlanOptions),
    Apply(ApplyOptions),
    Outputs,
}

impl ProvisionerCall {
    fn name(&self) -> &'static str {
        match self {
            ProvisionerCall::Init(_) => "init",
            ProvisionerCall::Plan(_) => "plan",
            ProvisionerCall::Apply(_) => "apply",
            ProvisionerCall::Outputs => "output",
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Mutex<Vec<ProvisionerCall>>,
    acquired: Mutex<Vec<PathBuf>>,
    flushes: AtomicUsize,
}

/// Session fake. Each lifecycle call appends `<name>\n` to its stdout buffer.
#[derive(Debug)]
pub struct FakeProvisioner {
    state: Arc<FakeState>,
    outputs: OutputSet,
    fail_on: Option<&'static str>,
    plan_changes: bool,
    stdout: Mutex<String>,
}

impl FakeProvisioner {
    fn record(&self, call: ProvisionerCall, capture: bool) -> terraform_manager::Result<()> {
        let name = call.name();
        self.state.calls.lock().unwrap().push(call);
        if capture {
            self.stdout.lock().unwrap().push_str(&format!("{}\n", name));
        }
        if self.fail_on == Some(name) {
            return Err(TerraformError::CommandFailed {
                command: format!("terraform {}", name),
                code: 1,
                stderr: format!("Error: {} failed", name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn init(&self, opts: &InitOptions) -> terraform_manager::Result<()> {
        self.record(ProvisionerCall::Init(opts.clone()), true)
    }

    async fn plan(&self, opts: &PlanOptions) -> terraform_manager::Result<bool> {
        self.record(ProvisionerCall::Plan(opts.clone()), true)?;
        Ok(self.plan_changes)
    }

    async fn apply(&self, opts: &ApplyOptions) -> terraform_manager::Result<()> {
        self.record(ProvisionerCall::Apply(opts.clone()), true)
    }

    async fn outputs(&self) -> terraform_manager::Result<OutputSet> {
        self.record(ProvisionerCall::Outputs, false)?;
        Ok(self.outputs.clone())
    }

    fn take_stdout(&self) -> String {
        self.state.flushes.fetch_add(1, Ordering::SeqCst);
        std::mem::take(&mut *self.stdout.lock().unwrap())
    }
}

// ---------------------------------------------------------------------------
// FakeProvisionerSource
// ---------------------------------------------------------------------------

/// Hands out [`FakeProvisioner`]s that share one call log with the source.
#[derive(Debug, Default)]
pub struct FakeProvisionerSource {
    state: Arc<FakeState>,
    outputs: OutputSet,
    fail_on: Option<&'static str>,
    fail_acquire: bool,
    plan_changes: bool,
}

impl FakeProvisionerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outputs returned after apply.
    pub fn with_outputs(mut self, outputs: OutputSet) -> Self {
        self.outputs = outputs;
        self
    }

    /// Make the named operation (`init`, `plan`, `apply`, `output`) fail.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Make session acquisition fail, as if Terraform could not be installed.
    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// Report a non-empty plan.
    pub fn with_plan_changes(mut self) -> Self {
        self.plan_changes = true;
        self
    }

    pub fn calls(&self) -> Vec<ProvisionerCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Working directories sessions were opened in.
    pub fn acquired(&self) -> Vec<PathBuf> {
        self.state.acquired.lock().unwrap().clone()
    }

    /// How many times a session's stdout buffer was drained.
    pub fn flushes(&self) -> usize {
        self.state.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvisionerSource for FakeProvisionerSource {
    async fn acquire(&self, working_dir: &Path) -> terraform_manager::Result<Box<dyn Provisioner>> {
        self.state
            .acquired
            .lock()
            .unwrap()
            .push(working_dir.to_path_buf());
        if self.fail_acquire {
            return Err(TerraformError::WorkingDirNotFound(working_dir.to_path_buf()));
        }
        Ok(Box::new(FakeProvisioner {
            state: self.state.clone(),
            outputs: self.outputs.clone(),
            fail_on: self.fail_on,
            plan_changes: self.plan_changes,
            stdout: Mutex::new(String::new()),
        }))
    }
}
