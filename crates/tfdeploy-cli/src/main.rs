//! tfdeploy - Lambda build and Terraform deployment gate
//!
//! Builds the Lambdas under `lambdas/` (ahead of a plan or apply), then runs
//! exactly one Terraform operation in `terraform/` against the S3 state
//! backend for the target account and region.
//!
//! ## Operations
//!
//! - `init`: configure the state backend
//! - `plan`: show pending changes
//! - `apply`: apply changes and print non-sensitive outputs
//! - `destroy`: refused

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, Level};

use tfdeploy_core::{
    deploy_with_settings, DeploymentSettings, Layout, MakeBuilder, TerraformSource,
};

#[derive(Parser, Debug)]
#[command(name = "tfdeploy")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build Lambdas and run Terraform against an S3 backend", long_about = None)]
struct Cli {
    /// Target account id
    #[arg(long, env = "TFDEPLOY_ACCOUNT_NUMBER", default_value_t = 0)]
    account_number: u64,

    /// Deployment environment name
    #[arg(long, env = "TFDEPLOY_ENVIRONMENT", default_value = "nonprod")]
    environment: String,

    /// Target region
    #[arg(long, env = "TFDEPLOY_REGION", default_value = "us-east-1")]
    region: String,

    /// Logical application name, used in the state key
    #[arg(long, env = "TFDEPLOY_APP_NAME", default_value = "jwt-authorizer")]
    app_name: String,

    /// Terraform operation: init, plan, apply or destroy
    #[arg(long, env = "TFDEPLOY_TFOP", default_value = "")]
    tfop: String,

    /// Lambdas to build: all, none, or a single Lambda name
    #[arg(long, env = "TFDEPLOY_BUILD", default_value = "all")]
    build: String,

    /// Target VPC id
    #[arg(long, env = "TFDEPLOY_VPC_ID", default_value = "")]
    vpc_id: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn settings(&self) -> DeploymentSettings {
        DeploymentSettings {
            account_number: self.account_number,
            environment: self.environment.clone(),
            region: self.region.clone(),
            app_name: self.app_name.clone(),
            tfop: self.tfop.clone(),
            build: self.build.clone(),
            vpc_id: self.vpc_id.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tfdeploy_core::init_tracing(cli.json, level);

    if let Err(err) = run(&cli).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let layout = Layout::default();
    let builder = MakeBuilder::default();
    let source = TerraformSource::from_env();
    let mut stdout = std::io::stdout();

    deploy_with_settings(cli.settings(), &layout, &builder, &source, &mut stdout)
        .await
        .with_context(|| format!("tfdeploy {} failed", display_op(&cli.tfop)))
}

fn display_op(tfop: &str) -> &str {
    if tfop.is_empty() {
        "<no --tfop>"
    } else {
        tfop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tfdeploy", "--tfop", "plan"]).unwrap();
        let settings = cli.settings();

        assert_eq!(
            settings,
            DeploymentSettings {
                tfop: "plan".to_string(),
                ..DeploymentSettings::default()
            }
        );
        assert!(!cli.verbose);
        assert!(!cli.json);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "tfdeploy",
            "--account-number",
            "123",
            "--environment",
            "prod",
            "--region",
            "eu-west-1",
            "--app-name",
            "billing",
            "--tfop",
            "apply",
            "--build",
            "authorizer",
            "--vpc-id",
            "vpc-0abc",
            "--verbose",
            "--json",
        ])
        .unwrap();

        let settings = cli.settings();
        assert_eq!(settings.account_number, 123);
        assert_eq!(settings.environment, "prod");
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.app_name, "billing");
        assert_eq!(settings.tfop, "apply");
        assert_eq!(settings.build, "authorizer");
        assert_eq!(settings.vpc_id, "vpc-0abc");
        assert!(cli.verbose && cli.json);
    }

    #[test]
    fn test_negative_account_number_rejected() {
        assert!(Cli::try_parse_from(["tfdeploy", "--account-number", "-1"]).is_err());
    }

    #[test]
    fn test_display_op() {
        assert_eq!(display_op(""), "<no --tfop>");
        assert_eq!(display_op("plan"), "plan");
    }
}
