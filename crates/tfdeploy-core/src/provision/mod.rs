//! Terraform provisioning.
//!
//! [`Provisioner`] is the capability seam over a Terraform session;
//! [`ProvisionerSource`] opens one. The real pair is backed by
//! `terraform_manager`; in-memory fakes live in [`crate::fakes`].

pub mod reporting;
pub mod workflow;

use std::path::Path;

use async_trait::async_trait;
use terraform_manager::{
    ApplyOptions, InitOptions, InstallConfig, OutputSet, PlanOptions, Terraform,
};

pub use reporting::report_outputs;
pub use workflow::{init_options, plan_options, run_workflow};

/// Terraform lifecycle operations used by the workflow.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Configure the backend and install providers.
    async fn init(&self, opts: &InitOptions) -> terraform_manager::Result<()>;

    /// Compute changes. Returns `true` when the plan is non-empty.
    async fn plan(&self, opts: &PlanOptions) -> terraform_manager::Result<bool>;

    /// Apply changes without prompting.
    async fn apply(&self, opts: &ApplyOptions) -> terraform_manager::Result<()>;

    /// Read root-module outputs of the current state.
    async fn outputs(&self) -> terraform_manager::Result<OutputSet>;

    /// Drain stdout captured from lifecycle commands so far.
    fn take_stdout(&self) -> String;
}

/// Opens the single provisioning session of a run.
#[async_trait]
pub trait ProvisionerSource: Send + Sync {
    async fn acquire(&self, working_dir: &Path) -> terraform_manager::Result<Box<dyn Provisioner>>;
}

#[async_trait]
impl Provisioner for Terraform {
    async fn init(&self, opts: &InitOptions) -> terraform_manager::Result<()> {
        Terraform::init(self, opts).await
    }

    async fn plan(&self, opts: &PlanOptions) -> terraform_manager::Result<bool> {
        Terraform::plan(self, opts).await
    }

    async fn apply(&self, opts: &ApplyOptions) -> terraform_manager::Result<()> {
        Terraform::apply(self, opts).await
    }

    async fn outputs(&self) -> terraform_manager::Result<OutputSet> {
        Terraform::outputs(self).await
    }

    fn take_stdout(&self) -> String {
        Terraform::take_stdout(self)
    }
}

/// Installs the pinned Terraform release and opens a real session.
#[derive(Debug, Clone)]
pub struct TerraformSource {
    config: InstallConfig,
}

impl TerraformSource {
    pub fn new(config: InstallConfig) -> Self {
        TerraformSource { config }
    }

    pub fn from_env() -> Self {
        Self::new(InstallConfig::from_env())
    }
}

#[async_trait]
impl ProvisionerSource for TerraformSource {
    async fn acquire(&self, working_dir: &Path) -> terraform_manager::Result<Box<dyn Provisioner>> {
        let tf = terraform_manager::setup_terraform(working_dir, self.config.clone()).await?;
        Ok(Box::new(tf))
    }
}
