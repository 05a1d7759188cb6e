//! End-to-end deployment: optional Lambda builds, then one Terraform operation.

use std::io::Write;

use tracing::info;

use crate::build::{build_all, should_build, Builder};
use crate::config::{DeploymentConfig, DeploymentSettings, Layout};
use crate::error::Result;
use crate::provision::{run_workflow, ProvisionerSource};

/// Run a deployment from validated configuration.
///
/// Builds (when the operation and `--build` call for them) finish completely
/// before Terraform is touched; a failed build means no Terraform session is
/// ever opened.
pub async fn deploy<W: Write + Send>(
    config: &DeploymentConfig,
    layout: &Layout,
    builder: &dyn Builder,
    source: &dyn ProvisionerSource,
    out: &mut W,
) -> Result<()> {
    info!(
        operation = %config.operation,
        environment = %config.environment,
        region = %config.region,
        app = %config.app_name,
        build = %config.build,
        "Starting deployment"
    );

    if should_build(config.operation, &config.build) {
        let built = build_all(&layout.lambdas_dir, &config.build, builder).await?;
        info!(lambdas = ?built, "Lambdas built");
    }

    run_workflow(config, layout, source, out).await
}

/// Validate raw settings, then [`deploy`]. An invalid `--tfop` or `--build`
/// fails here, before any build or Terraform call.
pub async fn deploy_with_settings<W: Write + Send>(
    settings: DeploymentSettings,
    layout: &Layout,
    builder: &dyn Builder,
    source: &dyn ProvisionerSource,
    out: &mut W,
) -> Result<()> {
    let config = DeploymentConfig::try_from(settings)?;
    deploy(&config, layout, builder, source, out).await
}
