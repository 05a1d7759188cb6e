//! Lambda build orchestration.
//!
//! Decides whether a deployment needs fresh Lambda builds, discovers which
//! Lambdas exist, and runs the test-then-target sequence for each one. The
//! first failing step stops everything; later Lambdas are not attempted.

pub mod runner;
pub mod stage;

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::config::{BuildSelector, Operation};
use crate::error::{DeployError, Result};

pub use runner::{MakeBuilder, StepResult};
pub use stage::BuildStep;

/// External build tool, one call per step.
///
/// `dir` is the Lambda's own directory under the Lambdas root.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Run the Lambda's tests.
    async fn test(&self, artifact: &str, dir: &Path) -> Result<()>;

    /// Produce the deployable Lambda artifact.
    async fn build(&self, artifact: &str, dir: &Path) -> Result<()>;
}

/// Builds run only ahead of a plan or apply, and never with `--build none`.
pub fn should_build(operation: Operation, selector: &BuildSelector) -> bool {
    matches!(operation, Operation::Plan | Operation::Apply) && *selector != BuildSelector::None
}

/// List Lambda directory names under `root`: every directory entry that is
/// itself a directory, sorted by name. Files are ignored.
///
/// Names are kept as raw `OsString`s so a directory whose name is not UTF-8
/// is still built in place.
pub fn discover_artifacts(root: &Path) -> Result<Vec<OsString>> {
    let discovery_err = |source| DeployError::ArtifactDiscovery {
        path: root.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(root).map_err(discovery_err)? {
        let entry = entry.map_err(discovery_err)?;
        if entry.file_type().map_err(discovery_err)?.is_dir() {
            names.push(entry.file_name());
        }
    }
    names.sort();
    Ok(names)
}

/// Build the Lambdas chosen by `selector`, returning their names in build order.
pub async fn build_all(
    root: &Path,
    selector: &BuildSelector,
    builder: &dyn Builder,
) -> Result<Vec<String>> {
    let artifacts = match selector {
        BuildSelector::None => return Ok(Vec::new()),
        BuildSelector::All => discover_artifacts(root)?,
        BuildSelector::Only(name) => vec![OsString::from(name)],
    };

    info!(count = artifacts.len(), "Building Lambdas...");
    let mut built = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let name = artifact.to_string_lossy();
        build_in(&root.join(artifact), &name, builder).await?;
        built.push(name.into_owned());
    }
    Ok(built)
}

/// Test, then build, a single Lambda.
pub async fn build_one(root: &Path, artifact: &str, builder: &dyn Builder) -> Result<()> {
    build_in(&root.join(artifact), artifact, builder).await
}

async fn build_in(dir: &Path, artifact: &str, builder: &dyn Builder) -> Result<()> {
    for step in BuildStep::SEQUENCE {
        match step {
            BuildStep::Test => {
                info!("Running tests for {} Lambda...", artifact);
                builder.test(artifact, dir).await?;
            }
            BuildStep::Target => {
                info!("Building {} Lambda...", artifact);
                builder.build(artifact, dir).await?;
            }
        }
    }
    Ok(())
}
