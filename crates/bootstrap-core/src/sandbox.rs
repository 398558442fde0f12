//! Dependency sandbox (virtualenv) provisioning and scoped activation.

use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{BootstrapError, Result};
use crate::paths;
use crate::process::{CommandRunner, CommandSpec};
use crate::toolchain::DetectedToolchain;

/// Lines of creation output kept in a provisioning error.
const DIAGNOSTIC_LINES: usize = 20;

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sandbox {
    pub path: PathBuf,
    pub marker: PathBuf,
}

impl Sandbox {
    pub fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            marker: path.join(paths::sandbox_marker_rel()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.path.is_dir() && self.marker.is_file()
    }

    pub fn python(&self) -> PathBuf {
        paths::sandbox_python(&self.path)
    }

    /// Begin a scope in which commands run "inside" the sandbox.
    pub fn activate(&self) -> ActiveSandbox<'_> {
        ActiveSandbox::new(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub sandbox: Sandbox,
    /// False when an existing valid sandbox was reused.
    pub created: bool,
}

/// Reuse the sandbox at `path` or create it with `<python> -m venv`.
///
/// An existing directory without the activation marker is reported as corrupt
/// and left untouched.
pub fn ensure(
    runner: &dyn CommandRunner,
    toolchain: &DetectedToolchain,
    path: &Path,
) -> Result<Provisioned> {
    let sandbox = Sandbox::at(path);

    if path.exists() {
        if sandbox.is_valid() {
            tracing::info!(path = %path.display(), "reusing existing sandbox");
            return Ok(Provisioned {
                sandbox,
                created: false,
            });
        }
        return Err(BootstrapError::ProvisioningCorrupt {
            path: sandbox.path,
            marker: sandbox.marker,
        });
    }

    let spec = CommandSpec::new(&toolchain.path)
        .args(["-m", "venv"])
        .arg(path.as_os_str());
    let output = runner.run(&spec).map_err(|e| match e {
        BootstrapError::Spawn { source, .. } => BootstrapError::ProvisioningFailed {
            path: path.to_path_buf(),
            diagnostic: source.to_string(),
        },
        other => other,
    })?;

    if !output.success() {
        return Err(BootstrapError::ProvisioningFailed {
            path: path.to_path_buf(),
            diagnostic: output.diagnostic(DIAGNOSTIC_LINES),
        });
    }
    if !sandbox.marker.is_file() {
        return Err(BootstrapError::ProvisioningFailed {
            path: path.to_path_buf(),
            diagnostic: format!(
                "`{}` succeeded but {} was not created",
                spec.display(),
                sandbox.marker.display()
            ),
        });
    }

    tracing::info!(path = %path.display(), "sandbox created");
    Ok(Provisioned {
        sandbox,
        created: true,
    })
}

// ---------------------------------------------------------------------------
// ActiveSandbox
// ---------------------------------------------------------------------------

/// Scoped activation of a sandbox.
///
/// Rather than mutating this process's environment the way `source activate`
/// does, the scope hands out commands carrying the activated environment
/// (`VIRTUAL_ENV`, sandbox `bin` first on `PATH`, `PYTHONHOME` cleared).
/// Nothing outlives the scope, so every exit path restores the caller's
/// environment by construction.
#[derive(Debug)]
pub struct ActiveSandbox<'a> {
    sandbox: &'a Sandbox,
    path_var: OsString,
}

impl<'a> ActiveSandbox<'a> {
    fn new(sandbox: &'a Sandbox) -> Self {
        let bin = paths::sandbox_bin_dir(&sandbox.path);
        let mut entries = vec![bin];
        if let Some(existing) = std::env::var_os("PATH") {
            entries.extend(std::env::split_paths(&existing));
        }
        // join_paths only fails on entries containing the separator.
        let path_var = std::env::join_paths(&entries)
            .unwrap_or_else(|_| paths::sandbox_bin_dir(&sandbox.path).into_os_string());
        tracing::debug!(sandbox = %sandbox.path.display(), "activated");
        Self { sandbox, path_var }
    }

    /// `python <args...>` using the sandbox interpreter and environment.
    pub fn python<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        CommandSpec::new(self.sandbox.python())
            .args(args)
            .env("VIRTUAL_ENV", self.sandbox.path.as_os_str())
            .env("PATH", self.path_var.clone())
            .env_remove("PYTHONHOME")
    }
}

impl Drop for ActiveSandbox<'_> {
    fn drop(&mut self) {
        tracing::debug!(sandbox = %self.sandbox.path.display(), "deactivated");
    }
}
