//! Deployment configuration.
//!
//! Raw flag values arrive as [`DeploymentSettings`] and are validated once
//! into an immutable [`DeploymentConfig`] that the build and provisioning
//! stages read from. Nothing external runs before validation succeeds.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{DeployError, Result};

/// Terraform lifecycle operation requested with `--tfop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Init,
    Plan,
    Apply,
    Destroy,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Init,
        Operation::Plan,
        Operation::Apply,
        Operation::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::Plan => "plan",
            Operation::Apply => "apply",
            Operation::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DeployError::BadOperation(s.to_string()))
    }
}

/// Which Lambdas to build before a plan or apply (`--build`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildSelector {
    /// Every directory under the Lambdas root
    All,
    /// Skip building
    None,
    /// A single Lambda by directory name
    Only(String),
}

impl fmt::Display for BuildSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSelector::All => f.write_str("all"),
            BuildSelector::None => f.write_str("none"),
            BuildSelector::Only(name) => f.write_str(name),
        }
    }
}

impl FromStr for BuildSelector {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(BuildSelector::All),
            "none" => Ok(BuildSelector::None),
            "" => Err(DeployError::InvalidConfig(
                "--build must be all, none, or the name of a Lambda".to_string(),
            )),
            name => Ok(BuildSelector::Only(name.to_string())),
        }
    }
}

/// Unvalidated flag values, defaulted the same way as the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSettings {
    pub account_number: u64,
    pub environment: String,
    pub region: String,
    pub app_name: String,
    pub tfop: String,
    pub build: String,
    pub vpc_id: String,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        DeploymentSettings {
            account_number: 0,
            environment: "nonprod".to_string(),
            region: "us-east-1".to_string(),
            app_name: "jwt-authorizer".to_string(),
            tfop: String::new(),
            build: "all".to_string(),
            vpc_id: String::new(),
        }
    }
}

/// Validated, read-only deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub account_number: u64,
    pub environment: String,
    pub region: String,
    pub app_name: String,
    pub operation: Operation,
    pub build: BuildSelector,
    pub vpc_id: String,
}

impl TryFrom<DeploymentSettings> for DeploymentConfig {
    type Error = DeployError;

    fn try_from(settings: DeploymentSettings) -> Result<Self> {
        let operation: Operation = settings.tfop.parse()?;
        // --build is only read ahead of a plan or apply
        let build = match operation {
            Operation::Plan | Operation::Apply => settings.build.parse()?,
            Operation::Init | Operation::Destroy => {
                settings.build.parse().unwrap_or(BuildSelector::None)
            }
        };

        Ok(DeploymentConfig {
            account_number: settings.account_number,
            environment: settings.environment,
            region: settings.region,
            app_name: settings.app_name,
            operation,
            build,
            vpc_id: settings.vpc_id,
        })
    }
}

impl DeploymentConfig {
    /// S3 bucket holding Terraform state for this account and region.
    pub fn backend_bucket(&self) -> String {
        backend_bucket(self.account_number, &self.region)
    }

    /// State object key inside the backend bucket.
    pub fn state_key(&self) -> String {
        format!("tfstate/{}/{}.json", self.environment, self.app_name)
    }

    /// Per-environment variables file, relative to the Terraform directory.
    pub fn var_file(&self) -> PathBuf {
        PathBuf::from(format!("environments/{}.tfvars", self.environment))
    }
}

/// `{account}-{region}-terraform-deployments`
pub fn backend_bucket(account_number: u64, region: &str) -> String {
    format!("{}-{}-terraform-deployments", account_number, region)
}

/// Filesystem layout of a deployment workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// One sub-directory per Lambda
    pub lambdas_dir: PathBuf,
    /// Terraform root module
    pub terraform_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            lambdas_dir: PathBuf::from("lambdas"),
            terraform_dir: PathBuf::from("terraform"),
        }
    }
}

impl Layout {
    /// The standard layout under an explicit workspace root.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Layout {
            lambdas_dir: root.join("lambdas"),
            terraform_dir: root.join("terraform"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(tfop: &str) -> DeploymentSettings {
        DeploymentSettings {
            tfop: tfop.to_string(),
            ..DeploymentSettings::default()
        }
    }

    #[test]
    fn test_operations_parse() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_operation_rejected() {
        for bad in ["", "refresh", "skip", "PLAN", " plan"] {
            let err = bad.parse::<Operation>().unwrap_err();
            assert!(matches!(err, DeployError::BadOperation(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_build_selector_parse() {
        assert_eq!("all".parse::<BuildSelector>().unwrap(), BuildSelector::All);
        assert_eq!("none".parse::<BuildSelector>().unwrap(), BuildSelector::None);
        assert_eq!(
            "authorizer".parse::<BuildSelector>().unwrap(),
            BuildSelector::Only("authorizer".to_string())
        );
        assert!("".parse::<BuildSelector>().is_err());
    }

    #[test]
    fn test_defaults_match_cli() {
        let s = DeploymentSettings::default();
        assert_eq!(s.account_number, 0);
        assert_eq!(s.environment, "nonprod");
        assert_eq!(s.region, "us-east-1");
        assert_eq!(s.app_name, "jwt-authorizer");
        assert_eq!(s.build, "all");
        assert!(s.tfop.is_empty());
        assert!(s.vpc_id.is_empty());
    }

    #[test]
    fn test_missing_tfop_is_config_error() {
        let err = DeploymentConfig::try_from(DeploymentSettings::default()).unwrap_err();
        assert!(matches!(err, DeployError::BadOperation(_)));
    }

    #[test]
    fn test_config_from_settings() {
        let config = DeploymentConfig::try_from(settings("apply")).unwrap();
        assert_eq!(config.operation, Operation::Apply);
        assert_eq!(config.build, BuildSelector::All);
        assert_eq!(config.environment, "nonprod");
    }

    #[test]
    fn test_empty_build_only_rejected_when_building() {
        for tfop in ["init", "destroy"] {
            let config = DeploymentConfig::try_from(DeploymentSettings {
                build: String::new(),
                ..settings(tfop)
            })
            .unwrap();
            assert_eq!(config.build, BuildSelector::None, "{tfop}");
        }

        for tfop in ["plan", "apply"] {
            let err = DeploymentConfig::try_from(DeploymentSettings {
                build: String::new(),
                ..settings(tfop)
            })
            .unwrap_err();
            assert!(matches!(err, DeployError::InvalidConfig(_)), "{tfop}");
        }
    }

    #[test]
    fn test_init_keeps_explicit_build_selector() {
        let config = DeploymentConfig::try_from(settings("init")).unwrap();
        assert_eq!(config.build, BuildSelector::All);
    }

    #[test]
    fn test_backend_bucket() {
        assert_eq!(
            backend_bucket(123, "eu-west-1"),
            "123-eu-west-1-terraform-deployments"
        );
        assert_eq!(
            backend_bucket(123, "eu-west-1"),
            backend_bucket(123, "eu-west-1")
        );
    }

    #[test]
    fn test_derived_paths() {
        let config = DeploymentConfig::try_from(DeploymentSettings {
            account_number: 42,
            environment: "prod".to_string(),
            app_name: "billing".to_string(),
            ..settings("plan")
        })
        .unwrap();

        assert_eq!(config.backend_bucket(), "42-us-east-1-terraform-deployments");
        assert_eq!(config.state_key(), "tfstate/prod/billing.json");
        assert_eq!(config.var_file(), PathBuf::from("environments/prod.tfvars"));
    }

    #[test]
    fn test_layout_rooted() {
        let layout = Layout::rooted("/srv/app");
        assert_eq!(layout.lambdas_dir, PathBuf::from("/srv/app/lambdas"));
        assert_eq!(layout.terraform_dir, PathBuf::from("/srv/app/terraform"));
    }
}
