//! Error taxonomy for tfdeploy.
//!
//! Every variant is terminal: the binary reports the first error it sees
//! and exits non-zero. Nothing is retried or rolled back here.

use std::path::PathBuf;
use terraform_manager::TerraformError;

/// Deployment errors.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("bad operation {0:?}: --tfop should be one of init, plan, apply, destroy")]
    BadOperation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("error setting up Terraform: {0}")]
    Setup(#[source] TerraformError),

    #[error("error listing Lambdas in {path:?}: {source}")]
    ArtifactDiscovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error running `{command}` for {artifact} Lambda: {reason}")]
    BuildStep {
        artifact: String,
        command: String,
        reason: String,
    },

    #[error("error running Terraform {operation}: {source}")]
    Provisioning {
        operation: &'static str,
        #[source]
        source: TerraformError,
    },

    #[error("destroy needs implementing: refusing to run any destructive Terraform action")]
    DestroyNotImplemented,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub(crate) fn provisioning(operation: &'static str) -> impl FnOnce(TerraformError) -> Self {
        move |source| DeployError::Provisioning { operation, source }
    }
}

/// Result type for tfdeploy operations.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_operation_lists_valid_set() {
        let msg = DeployError::BadOperation("refresh".to_string()).to_string();
        assert!(msg.contains("\"refresh\""));
        assert!(msg.contains("init, plan, apply, destroy"));
    }

    #[test]
    fn test_build_step_names_command() {
        let err = DeployError::BuildStep {
            artifact: "authorizer".to_string(),
            command: "make test".to_string(),
            reason: "exited with code 2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("make test"));
        assert!(msg.contains("authorizer"));
    }

    #[test]
    fn test_provisioning_error_keeps_source() {
        let err = DeployError::provisioning("plan")(TerraformError::CommandFailed {
            command: "terraform plan".to_string(),
            code: 1,
            stderr: "Error: no credentials".to_string(),
        });
        assert!(err.to_string().contains("Terraform plan"));
        assert!(err.to_string().contains("no credentials"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
