//! Python runtime discovery and version gate.
//!
//! Candidates are probed in priority order and the first one on `PATH` wins;
//! there is no attempt to pick the "best" of several installs. The resolved
//! [`DetectedToolchain`] is the only record of which interpreter later stages
//! use, so nothing downstream probes again.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{BootstrapError, Result};
use crate::process::{CommandRunner, CommandSpec};

/// Runtime command names, highest priority first.
pub const RUNTIME_CANDIDATES: &[&str] = &["python3", "python"];

/// Oldest accepted runtime.
pub const MIN_TOOLCHAIN: ToolchainRequirement = ToolchainRequirement {
    major: 3,
    minor: 12,
};

// ---------------------------------------------------------------------------
// Version / ToolchainRequirement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainRequirement {
    pub major: u32,
    pub minor: u32,
}

impl ToolchainRequirement {
    /// Lexicographic on (major, minor); patch never matters.
    pub fn accepts(&self, version: &Version) -> bool {
        (version.major, version.minor) >= (self.major, self.minor)
    }
}

impl fmt::Display for ToolchainRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ---------------------------------------------------------------------------
// DetectedToolchain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedToolchain {
    /// Candidate name that matched, e.g. `python3`.
    pub command: String,
    /// Absolute path the name resolved to.
    pub path: PathBuf,
    pub version: Version,
}

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| {
        Regex::new(r"(?:^|[^\d.])(\d+)\.(\d+)\.(\d+)(?:[^\d.]|$)").expect("static regex")
    })
}

/// Extract the first strict `major.minor.patch` token from a version banner.
pub fn parse_version(text: &str) -> Option<Version> {
    version_re().captures_iter(text).find_map(|caps| {
        Some(Version {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
        })
    })
}

/// Find the first installed candidate and read its version.
pub fn detect(runner: &dyn CommandRunner, candidates: &[&str]) -> Result<DetectedToolchain> {
    let Some((command, path)) = candidates
        .iter()
        .find_map(|name| runner.locate(name).map(|p| (name.to_string(), p)))
    else {
        return Err(BootstrapError::ToolchainNotInstalled {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        });
    };
    tracing::debug!(%command, path = %path.display(), "runtime located");

    let output = runner
        .run(&CommandSpec::new(&path).arg("--version"))
        .map_err(|e| match e {
            // A shim whose target interpreter is gone resolves on PATH but cannot start.
            BootstrapError::Spawn { source, .. } => BootstrapError::ToolchainNotRunnable {
                command: command.clone(),
                path: path.clone(),
                source,
            },
            other => other,
        })?;
    // Python 2 prints its banner on stderr.
    let banner = if output.stdout.trim().is_empty() {
        output.stderr.trim().to_string()
    } else {
        output.stdout.trim().to_string()
    };

    let version = parse_version(&banner)
        .filter(|_| output.success())
        .ok_or_else(|| BootstrapError::ToolchainVersionUnreadable {
            command: command.clone(),
            output: banner.clone(),
        })?;

    Ok(DetectedToolchain {
        command,
        path,
        version,
    })
}

pub fn validate(detected: &DetectedToolchain, requirement: &ToolchainRequirement) -> Result<()> {
    if requirement.accepts(&detected.version) {
        Ok(())
    } else {
        Err(BootstrapError::ToolchainTooOld {
            command: detected.command.clone(),
            detected: detected.version,
            required: *requirement,
        })
    }
}
