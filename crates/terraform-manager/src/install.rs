//! Version-pinned Terraform installation
//!
//! Resolves an exact Terraform release for the current platform. A previously
//! installed binary is reused when it reports the pinned version; otherwise
//! the release archive is downloaded, checked against the published
//! SHA256SUMS, and unpacked into the install directory.

use crate::error::TerraformError;
use crate::Result;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// The Terraform release every session runs against.
pub const TERRAFORM_VERSION: TerraformVersion = TerraformVersion::new(1, 6, 0);

/// Default HashiCorp releases endpoint.
pub const DEFAULT_RELEASES_URL: &str = "https://releases.hashicorp.com";

/// A `major.minor.patch` Terraform version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerraformVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl TerraformVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        TerraformVersion {
            major,
            minor,
            patch,
        }
    }

    /// Parse `1.6`, `1.6.0` or `v1.6.0`. Pre-release and build suffixes are
    /// dropped; a missing patch component is read as zero.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_start_matches('v');
        let core = raw.split(['-', '+']).next()?;
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(TerraformVersion::new(major, minor, patch))
    }
}

impl std::fmt::Display for TerraformVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Release platform in HashiCorp naming (`linux`/`amd64`, `darwin`/`arm64`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Result<Self> {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's `std::env::consts` names onto release names.
    pub fn from_rust(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || TerraformError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let os_name = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "windows" => "windows",
            "freebsd" => "freebsd",
            "openbsd" => "openbsd",
            _ => return Err(unsupported()),
        };
        let arch_name = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "arm" => "arm",
            _ => return Err(unsupported()),
        };

        Ok(Platform {
            os: os_name,
            arch: arch_name,
        })
    }

    /// File name of the terraform executable inside the release archive.
    pub fn binary_name(&self) -> &'static str {
        if self.os == "windows" {
            "terraform.exe"
        } else {
            "terraform"
        }
    }
}

/// Installer configuration
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Base URL of the releases server
    pub releases_url: String,
    /// Directory holding one sub-directory per installed version
    pub install_dir: PathBuf,
}

impl Default for InstallConfig {
    fn default() -> Self {
        InstallConfig {
            releases_url: std::env::var("TFDEPLOY_TERRAFORM_RELEASES_URL")
                .unwrap_or_else(|_| DEFAULT_RELEASES_URL.to_string()),
            install_dir: std::env::var_os("TFDEPLOY_TERRAFORM_INSTALL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("tfdeploy").join("terraform")),
        }
    }
}

impl InstallConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific mirror and install location
    pub fn new(releases_url: &str, install_dir: impl Into<PathBuf>) -> Self {
        InstallConfig {
            releases_url: releases_url.trim_end_matches('/').to_string(),
            install_dir: install_dir.into(),
        }
    }
}

/// Installs exactly one Terraform version
pub struct ExactVersionInstaller {
    config: InstallConfig,
    version: TerraformVersion,
    platform: Platform,
    http_client: reqwest::Client,
}

impl ExactVersionInstaller {
    /// Create an installer for `version` on the current platform
    pub fn new(config: InstallConfig, version: TerraformVersion) -> Result<Self> {
        Self::for_platform(config, version, Platform::current()?)
    }

    /// Create an installer for an explicit platform
    pub fn for_platform(
        config: InstallConfig,
        version: TerraformVersion,
        platform: Platform,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("tfdeploy-terraform-manager/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ExactVersionInstaller {
            config,
            version,
            platform,
            http_client,
        })
    }

    pub fn version(&self) -> TerraformVersion {
        self.version
    }

    /// `terraform_1.6.0_linux_amd64.zip`
    pub fn archive_name(&self) -> String {
        format!(
            "terraform_{}_{}_{}.zip",
            self.version, self.platform.os, self.platform.arch
        )
    }

    fn release_url(&self, file: &str) -> String {
        format!(
            "{}/terraform/{}/{}",
            self.config.releases_url.trim_end_matches('/'),
            self.version,
            file
        )
    }

    pub fn archive_url(&self) -> String {
        self.release_url(&self.archive_name())
    }

    pub fn checksums_url(&self) -> String {
        self.release_url(&format!("terraform_{}_SHA256SUMS", self.version))
    }

    /// Where the executable lives once installed.
    pub fn install_path(&self) -> PathBuf {
        self.config
            .install_dir
            .join(self.version.to_string())
            .join(self.platform.binary_name())
    }

    /// Ensure the pinned version is installed and return its executable path.
    pub async fn install(&self) -> Result<PathBuf> {
        let path = self.install_path();

        if path.is_file() {
            match installed_version(&path).await {
                Ok(found) if found == self.version => {
                    info!("Reusing Terraform {} at {:?}", found, path);
                    return Ok(path);
                }
                Ok(found) => warn!(
                    "Cached Terraform at {:?} is {}, reinstalling {}",
                    path, found, self.version
                ),
                Err(e) => warn!("Cached Terraform at {:?} is unusable: {}", path, e),
            }
        }

        info!(
            "Downloading Terraform {} for {}/{}",
            self.version, self.platform.os, self.platform.arch
        );

        let sums = self.fetch(&self.checksums_url()).await?;
        let sums = String::from_utf8_lossy(&sums);
        let archive_name = self.archive_name();
        let expected = checksum_for(&sums, &archive_name)
            .ok_or_else(|| TerraformError::ChecksumMissing(archive_name.clone()))?;

        let archive = self.fetch(&self.archive_url()).await?;
        verify_checksum(&archive_name, &archive, &expected)?;
        extract_binary(&archive, self.platform.binary_name(), &path)?;

        let found = installed_version(&path).await?;
        if found != self.version {
            return Err(TerraformError::VersionMismatch {
                path,
                expected: self.version.to_string(),
                found: found.to_string(),
            });
        }

        info!("Installed Terraform {} at {:?}", found, path);
        Ok(path)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);
        let response = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Find the digest for `file` in a SHA256SUMS document.
pub fn checksum_for(sums: &str, file: &str) -> Option<String> {
    sums.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let name = fields.next()?.trim_start_matches('*');
        (name == file).then(|| digest.to_ascii_lowercase())
    })
}

/// Compare the SHA-256 of `data` with `expected` (hex).
pub fn verify_checksum(file: &str, data: &[u8], expected: &str) -> Result<()> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let actual = hex::encode(hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(TerraformError::ChecksumMismatch {
            file: file.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Unpack `entry` from a zip archive to `dest`, marking it executable.
///
/// The file is written next to `dest` and renamed into place so a partial
/// download never looks like an installed binary.
pub fn extract_binary(archive: &[u8], entry: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut file = zip.by_name(entry)?;
    let mut contents = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut contents)?;

    let partial = dest.with_extension("partial");
    std::fs::write(&partial, &contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o755))?;
    }

    std::fs::rename(&partial, dest)?;
    Ok(())
}

#[derive(Deserialize)]
struct VersionOutput {
    terraform_version: String,
}

/// Ask a terraform binary for its version via `terraform version -json`.
pub async fn installed_version(path: &Path) -> Result<TerraformVersion> {
    let output = Command::new(path)
        .args(["version", "-json"])
        .env("CHECKPOINT_DISABLE", "1")
        .output()
        .await
        .map_err(|source| TerraformError::Launch {
            command: format!("{} version -json", path.display()),
            source,
        })?;

    if !output.status.success() {
        return Err(TerraformError::CommandFailed {
            command: format!("{} version -json", path.display()),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let parsed: VersionOutput = serde_json::from_slice(&output.stdout)?;
    TerraformVersion::parse(&parsed.terraform_version).ok_or_else(|| {
        TerraformError::VersionMismatch {
            path: path.to_path_buf(),
            expected: TERRAFORM_VERSION.to_string(),
            found: parsed.terraform_version.clone(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn linux_installer(dir: &Path) -> ExactVersionInstaller {
        ExactVersionInstaller::for_platform(
            InstallConfig::new("https://mirror.example.com/", dir),
            TERRAFORM_VERSION,
            Platform::from_rust("linux", "x86_64").unwrap(),
        )
        .unwrap()
    }

    fn zip_with(entry: &str, contents: &[u8]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(entry, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_version_forms() {
        assert_eq!(
            TerraformVersion::parse("1.6"),
            Some(TerraformVersion::new(1, 6, 0))
        );
        assert_eq!(
            TerraformVersion::parse("v1.6.5"),
            Some(TerraformVersion::new(1, 6, 5))
        );
        assert_eq!(
            TerraformVersion::parse("1.7.0-beta1"),
            Some(TerraformVersion::new(1, 7, 0))
        );
        assert_eq!(TerraformVersion::parse("one.six"), None);
        assert_eq!(TerraformVersion::parse("1.6.0.1"), None);
    }

    #[test]
    fn test_pinned_version_display() {
        assert_eq!(TERRAFORM_VERSION.to_string(), "1.6.0");
    }

    #[test]
    fn test_platform_mapping() {
        let p = Platform::from_rust("macos", "aarch64").unwrap();
        assert_eq!(p.os, "darwin");
        assert_eq!(p.arch, "arm64");
        assert_eq!(p.binary_name(), "terraform");

        let p = Platform::from_rust("windows", "x86_64").unwrap();
        assert_eq!(p.binary_name(), "terraform.exe");
    }

    #[test]
    fn test_unsupported_platform() {
        let err = Platform::from_rust("solaris", "sparc64").unwrap_err();
        assert!(matches!(err, TerraformError::UnsupportedPlatform { .. }));
    }

    #[test]
    fn test_release_urls() {
        let dir = tempdir().unwrap();
        let installer = linux_installer(dir.path());

        assert_eq!(installer.archive_name(), "terraform_1.6.0_linux_amd64.zip");
        assert_eq!(
            installer.archive_url(),
            "https://mirror.example.com/terraform/1.6.0/terraform_1.6.0_linux_amd64.zip"
        );
        assert_eq!(
            installer.checksums_url(),
            "https://mirror.example.com/terraform/1.6.0/terraform_1.6.0_SHA256SUMS"
        );
        assert_eq!(
            installer.install_path(),
            dir.path().join("1.6.0").join("terraform")
        );
    }

    #[test]
    fn test_checksum_for_finds_archive() {
        let sums = "aaaa  terraform_1.6.0_darwin_arm64.zip\n\
                    BBBB  terraform_1.6.0_linux_amd64.zip\n";
        assert_eq!(
            checksum_for(sums, "terraform_1.6.0_linux_amd64.zip").as_deref(),
            Some("bbbb")
        );
        assert!(checksum_for(sums, "terraform_1.6.0_windows_386.zip").is_none());
    }

    #[test]
    fn test_verify_checksum() {
        let data = b"terraform";
        let digest = hex::encode(Sha256::digest(data));

        verify_checksum("a.zip", data, &digest).unwrap();
        verify_checksum("a.zip", data, &digest.to_uppercase()).unwrap();

        let err = verify_checksum("a.zip", b"tampered", &digest).unwrap_err();
        assert!(matches!(err, TerraformError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_extract_binary_writes_executable() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("1.6.0").join("terraform");
        let archive = zip_with("terraform", b"#!/bin/sh\n");

        extract_binary(&archive, "terraform", &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"#!/bin/sh\n");
        assert!(!dest.with_extension("partial").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_extract_binary_missing_entry() {
        let dir = tempdir().unwrap();
        let archive = zip_with("LICENSE.txt", b"MPL");

        let err = extract_binary(&archive, "terraform", &dir.path().join("terraform"))
            .unwrap_err();
        assert!(matches!(err, TerraformError::Archive(_)));
    }

    #[test]
    fn test_extract_binary_rejects_garbage() {
        let dir = tempdir().unwrap();
        let err = extract_binary(b"not a zip", "terraform", &dir.path().join("terraform"))
            .unwrap_err();
        assert!(matches!(err, TerraformError::Archive(_)));
    }

    #[tokio::test]
    async fn test_installed_version_launch_failure() {
        let err = installed_version(Path::new("/nonexistent/terraform"))
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::Launch { .. }));
    }
}
