use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Artifact defaults (relative to the project root)
// ---------------------------------------------------------------------------

pub const SANDBOX_DIR: &str = "venv";
pub const CONFIG_TEMPLATE: &str = ".env.example";
pub const CONFIG_FILE: &str = ".env";
pub const MANIFEST_FILE: &str = "requirements.txt";
pub const SETTINGS_FILE: &str = ".bootstrap.yaml";

// ---------------------------------------------------------------------------
// Sandbox layout
// ---------------------------------------------------------------------------

#[cfg(windows)]
pub const SANDBOX_BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
pub const SANDBOX_BIN_DIR: &str = "bin";

#[cfg(windows)]
pub const SANDBOX_PYTHON: &str = "python.exe";
#[cfg(not(windows))]
pub const SANDBOX_PYTHON: &str = "python";

pub const ACTIVATE_SCRIPT: &str = "activate";

/// Relative path of the marker whose presence proves sandbox creation finished.
pub fn sandbox_marker_rel() -> PathBuf {
    Path::new(SANDBOX_BIN_DIR).join(ACTIVATE_SCRIPT)
}

pub fn sandbox_bin_dir(sandbox: &Path) -> PathBuf {
    sandbox.join(SANDBOX_BIN_DIR)
}

pub fn sandbox_python(sandbox: &Path) -> PathBuf {
    sandbox_bin_dir(sandbox).join(SANDBOX_PYTHON)
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

/// Shell command a user types to activate the sandbox.
pub fn activation_command(sandbox_rel: &Path) -> String {
    let script = sandbox_rel.join(sandbox_marker_rel());
    if cfg!(windows) {
        script.display().to_string()
    } else {
        format!("source {}", script.display())
    }
}
