//! Error types for terraform-manager

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while installing or running Terraform
#[derive(Error, Debug)]
pub enum TerraformError {
    /// No release exists for this os/arch combination
    #[error("Unsupported platform for Terraform releases: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// Release download failed
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// The archive did not match the published SHA256SUMS entry
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// SHA256SUMS did not list the requested archive
    #[error("No checksum published for {0}")]
    ChecksumMissing(String),

    /// Release archive could not be read
    #[error("Invalid release archive: {0}")]
    Archive(String),

    /// Installed binary reports a different version than the pin
    #[error("Terraform at {path:?} reports version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Working directory for a session does not exist
    #[error("Terraform working directory not found: {0:?}")]
    WorkingDirNotFound(PathBuf),

    /// Empty executable path handed to a session
    #[error("Terraform executable path must not be empty")]
    EmptyExecPath,

    /// A variables file passed to plan/apply is missing
    #[error("Variables file not found: {0:?}")]
    VarFileNotFound(PathBuf),

    /// Terraform could not be launched
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Terraform exited non-zero
    #[error("`{command}` exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The session was cancelled while a command was running
    #[error("Terraform command cancelled: {0}")]
    Cancelled(String),

    /// `terraform output -json` or `version -json` returned unparsable data
    #[error("Unexpected Terraform JSON output: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TerraformError {
    fn from(err: reqwest::Error) -> Self {
        TerraformError::Download {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for TerraformError {
    fn from(err: zip::result::ZipError) -> Self {
        TerraformError::Archive(err.to_string())
    }
}
