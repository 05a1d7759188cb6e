//! tfdeploy Core Library
//!
//! Builds Lambda artifacts and drives a Terraform init/plan/apply against an
//! S3 state backend.
//!
//! ## Key Components
//!
//! - `DeploymentConfig`: validated, read-only flags
//! - `build`: Lambda discovery and the test-then-target build sequence
//! - `provision`: Terraform operation dispatch and output reporting
//! - `fakes`: in-memory `Builder`/`Provisioner` doubles for tests

pub mod build;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fakes;
pub mod provision;
pub mod telemetry;

pub use build::{build_all, build_one, discover_artifacts, should_build, Builder, MakeBuilder};
pub use config::{
    backend_bucket, BuildSelector, DeploymentConfig, DeploymentSettings, Layout, Operation,
};
pub use deploy::{deploy, deploy_with_settings};
pub use error::{DeployError, Result};
pub use provision::{
    report_outputs, run_workflow, Provisioner, ProvisionerSource, TerraformSource,
};
pub use telemetry::init_tracing;
