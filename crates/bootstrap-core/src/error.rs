use std::path::PathBuf;
use thiserror::Error;

use crate::toolchain::{ToolchainRequirement, Version};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("ToolchainNotFound: none of [{}] found on PATH", .candidates.join(", "))]
    ToolchainNotInstalled { candidates: Vec<String> },

    #[error("ToolchainNotFound: '{command}' reported no major.minor.patch version (output: {output:?})")]
    ToolchainVersionUnreadable { command: String, output: String },

    #[error("ToolchainNotFound: '{command}' at {} could not be started: {source}", .path.display())]
    ToolchainNotRunnable {
        command: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ToolchainTooOld: {command} {detected} found, {required} or newer is required")]
    ToolchainTooOld {
        command: String,
        detected: Version,
        required: ToolchainRequirement,
    },

    #[error(
        "ProvisioningCorrupt: {} exists but has no {}; remove the directory and re-run",
        .path.display(),
        .marker.display()
    )]
    ProvisioningCorrupt { path: PathBuf, marker: PathBuf },

    #[error("ProvisioningFailed: could not create sandbox at {}: {diagnostic}", .path.display())]
    ProvisioningFailed { path: PathBuf, diagnostic: String },

    #[error("TemplateMissing: template {} does not exist", .0.display())]
    TemplateMissing(PathBuf),

    #[error("InstallFailed: `{command}` failed: {diagnostic}")]
    InstallFailed { command: String, diagnostic: String },

    #[error("RequiredImportFailed: could not import {}", .packages.join(", "))]
    RequiredImportFailed { packages: Vec<String> },

    #[error("interrupted while running `{0}`")]
    Interrupted(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {message}", .path.display())]
    InvalidSettings { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    /// Taxonomy name shown in reports and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            BootstrapError::ToolchainNotInstalled { .. }
            | BootstrapError::ToolchainVersionUnreadable { .. }
            | BootstrapError::ToolchainNotRunnable { .. } => "ToolchainNotFound",
            BootstrapError::ToolchainTooOld { .. } => "ToolchainTooOld",
            BootstrapError::ProvisioningCorrupt { .. } => "ProvisioningCorrupt",
            BootstrapError::ProvisioningFailed { .. } => "ProvisioningFailed",
            BootstrapError::TemplateMissing(_) => "TemplateMissing",
            BootstrapError::InstallFailed { .. } => "InstallFailed",
            BootstrapError::RequiredImportFailed { .. } => "RequiredImportFailed",
            BootstrapError::Interrupted(_) => "Interrupted",
            BootstrapError::Spawn { .. } => "SpawnFailed",
            BootstrapError::InvalidSettings { .. } => "InvalidSettings",
            BootstrapError::Io(_) => "Io",
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, BootstrapError::Interrupted(_))
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
