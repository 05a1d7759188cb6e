//! Terraform-Manager: pinned Terraform installs and execution sessions
//!
//! This crate is the provisioning-tool layer of tfdeploy. It resolves an
//! exact Terraform release, then exposes a [`Terraform`] session that runs
//! the init/plan/apply/output lifecycle in a fixed working directory.
//!
//! ## Key Components
//!
//! - `ExactVersionInstaller`: download, verify and cache one Terraform version
//! - `Terraform`: session handle with a shared stdout capture buffer
//! - `OutputSet`: parsed `terraform output -json`

pub mod error;
pub mod install;
pub mod outputs;
pub mod session;

pub use error::TerraformError;
pub use install::{
    installed_version, ExactVersionInstaller, InstallConfig, Platform, TerraformVersion,
    TERRAFORM_VERSION,
};
pub use outputs::{parse_outputs, OutputMeta, OutputSet};
pub use session::{ApplyOptions, CancelHandle, InitOptions, PlanOptions, Terraform};

use std::path::Path;
use tracing::info;

/// Result type for terraform-manager operations
pub type Result<T> = std::result::Result<T, TerraformError>;

/// Install the pinned Terraform release and open a session in `working_dir`.
pub async fn setup_terraform(working_dir: &Path, config: InstallConfig) -> Result<Terraform> {
    info!("Installing Terraform {}...", TERRAFORM_VERSION);
    let installer = ExactVersionInstaller::new(config, TERRAFORM_VERSION)?;
    let exec_path = installer.install().await?;
    Terraform::new(working_dir, exec_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_setup_fails_without_reachable_mirror() {
        let dir = tempdir().unwrap();
        let config = InstallConfig::new("http://127.0.0.1:9", dir.path().join("cache"));

        let err = setup_terraform(dir.path(), config).await.unwrap_err();
        assert!(
            matches!(
                err,
                TerraformError::Download { .. } | TerraformError::UnsupportedPlatform { .. }
            ),
            "unexpected error: {err}"
        );
    }
}
