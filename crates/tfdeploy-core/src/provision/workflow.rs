//! Operation dispatch for the Terraform lifecycle.
//!
//! Maps `--tfop` onto exactly one session call (plus the output report after
//! an apply), assembling backend and variable configuration from the
//! deployment configuration.

use std::io::Write;

use terraform_manager::{InitOptions, PlanOptions};
use tracing::{info, warn};

use super::reporting::report_outputs;
use super::{Provisioner, ProvisionerSource};
use crate::config::{DeploymentConfig, Layout, Operation};
use crate::error::{DeployError, Result};

/// Backend settings for `terraform init`: state key, bucket, region.
pub fn init_options(config: &DeploymentConfig) -> InitOptions {
    InitOptions {
        upgrade: true,
        backend_config: vec![
            ("key".to_string(), config.state_key()),
            ("bucket".to_string(), config.backend_bucket()),
            ("region".to_string(), config.region.clone()),
        ],
    }
}

/// Variables shared by plan and apply.
pub fn plan_options(config: &DeploymentConfig) -> PlanOptions {
    PlanOptions {
        refresh: true,
        vars: vec![
            (
                "terraform_working_bucket".to_string(),
                config.backend_bucket(),
            ),
            (
                "account_number".to_string(),
                config.account_number.to_string(),
            ),
            ("environment".to_string(), config.environment.clone()),
            ("vpc_id".to_string(), config.vpc_id.clone()),
        ],
        var_file: Some(config.var_file()),
    }
}

/// Run the requested Terraform operation.
///
/// `destroy` is refused before any session is opened. For the other
/// operations the session's captured stdout is logged once the operation
/// has finished, whether it succeeded or not.
pub async fn run_workflow<W: Write + Send>(
    config: &DeploymentConfig,
    layout: &Layout,
    source: &dyn ProvisionerSource,
    out: &mut W,
) -> Result<()> {
    if config.operation == Operation::Destroy {
        return Err(DeployError::DestroyNotImplemented);
    }

    let tf = source
        .acquire(&layout.terraform_dir)
        .await
        .map_err(DeployError::Setup)?;

    let result = dispatch(config, tf.as_ref(), out).await;

    let captured = tf.take_stdout();
    if !captured.trim().is_empty() {
        info!("Terraform output:\n{}", captured.trim_end());
    }

    result
}

async fn dispatch<W: Write + Send>(
    config: &DeploymentConfig,
    tf: &dyn Provisioner,
    out: &mut W,
) -> Result<()> {
    match config.operation {
        Operation::Init => {
            info!("Initialising Terraform...");
            tf.init(&init_options(config))
                .await
                .map_err(DeployError::provisioning("init"))?;
        }
        Operation::Plan => {
            warn_missing_vpc(config);
            info!("Planning Terraform...");
            let changes = tf
                .plan(&plan_options(config))
                .await
                .map_err(DeployError::provisioning("plan"))?;
            info!(changes, "Plan complete");
        }
        Operation::Apply => {
            warn_missing_vpc(config);
            info!("Applying Terraform...");
            tf.apply(&plan_options(config))
                .await
                .map_err(DeployError::provisioning("apply"))?;

            let outputs = tf
                .outputs()
                .await
                .map_err(DeployError::provisioning("output"))?;
            report_outputs(&outputs, out)?;
        }
        Operation::Destroy => return Err(DeployError::DestroyNotImplemented),
    }
    Ok(())
}

fn warn_missing_vpc(config: &DeploymentConfig) {
    if config.vpc_id.is_empty() {
        warn!("--vpc-id is empty; Terraform will receive vpc_id=\"\"");
    }
}
