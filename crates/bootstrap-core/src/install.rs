use std::path::{Path, PathBuf};

use crate::error::{BootstrapError, Result};
use crate::process::{CommandRunner, CommandSpec};
use crate::sandbox::ActiveSandbox;

/// Lines of pip output kept in an install error.
const DIAGNOSTIC_LINES: usize = 30;

// ---------------------------------------------------------------------------
// DependencyManifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyManifest {
    pub path: PathBuf,
}

impl DependencyManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Package declarations in file order: blank lines, comments and pip
    /// options (`-r`, `--index-url`, ...) are not declarations.
    pub fn declarations(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(parse_declarations(&content))
    }
}

pub fn parse_declarations(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| match line.find(" #") {
            Some(i) => &line[..i],
            None => line,
        })
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// install
// ---------------------------------------------------------------------------

/// Upgrade pip, then install the manifest, both inside the active sandbox.
///
/// Either step failing fails the whole install; nothing is recorded about
/// which packages may have landed before the failure.
pub fn install(
    runner: &dyn CommandRunner,
    active: &ActiveSandbox<'_>,
    manifest: &DependencyManifest,
) -> Result<usize> {
    if !manifest.path.is_file() {
        return Err(BootstrapError::InstallFailed {
            command: "pip install -r".to_string(),
            diagnostic: format!("manifest {} does not exist", manifest.path.display()),
        });
    }
    let declared = manifest.declarations()?;

    let upgrade = active.python(["-m", "pip", "install", "--upgrade", "pip"]);
    run_step(runner, &upgrade)?;

    let install_manifest = active
        .python(["-m", "pip", "install", "-r"])
        .arg(manifest.path.as_os_str());
    run_step(runner, &with_manifest_dir(install_manifest, &manifest.path))?;

    tracing::info!(packages = declared.len(), "manifest installed");
    Ok(declared.len())
}

/// Relative `-r` includes inside the manifest resolve against its directory.
fn with_manifest_dir(spec: CommandSpec, manifest: &Path) -> CommandSpec {
    match manifest.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => spec.current_dir(dir),
        None => spec,
    }
}

fn run_step(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<()> {
    let command = spec.display();
    let output = runner.run(spec).map_err(|e| match e {
        BootstrapError::Spawn { command, source } => BootstrapError::InstallFailed {
            command,
            diagnostic: source.to_string(),
        },
        other => other,
    })?;
    if !output.success() {
        return Err(BootstrapError::InstallFailed {
            command,
            diagnostic: output.diagnostic(DIAGNOSTIC_LINES),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::{fail, ok, FakeRunner};
    use crate::sandbox::Sandbox;
    use tempfile::TempDir;

    const MANIFEST: &str = "\
# Galileo tutorial
galileo>=1.0
langgraph
pandas  # optional
python-dotenv

--extra-index-url https://example.invalid/simple
langchain-openai
";

    fn manifest_in(dir: &TempDir) -> DependencyManifest {
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, MANIFEST).unwrap();
        DependencyManifest::new(path)
    }

    #[test]
    fn parses_declarations_in_order() {
        assert_eq!(
            parse_declarations(MANIFEST),
            [
                "galileo>=1.0",
                "langgraph",
                "pandas",
                "python-dotenv",
                "langchain-openai"
            ]
        );
    }

    #[test]
    fn upgrades_pip_then_installs_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = manifest_in(&dir);
        let sandbox = Sandbox::at(&dir.path().join("venv"));
        let runner = FakeRunner::new();

        let count = install(&runner, &sandbox.activate(), &manifest).unwrap();

        assert_eq!(count, 5);
        let calls = runner.call_lines();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].ends_with("-m pip install --upgrade pip"));
        assert!(calls[1].contains("-m pip install -r "));
        assert!(calls[1].ends_with("requirements.txt"));
        let spec = &runner.calls.borrow()[1];
        assert_eq!(spec.program, sandbox.python());
        assert_eq!(spec.cwd.as_deref(), Some(dir.path()));
    }

    #[test]
    fn failed_upgrade_stops_before_install() {
        let dir = TempDir::new().unwrap();
        let manifest = manifest_in(&dir);
        let sandbox = Sandbox::at(&dir.path().join("venv"));
        let runner = FakeRunner::new().on_run(|_| Ok(fail(1, "network unreachable")));

        let err = install(&runner, &sandbox.activate(), &manifest).unwrap_err();

        assert_eq!(err.kind(), "InstallFailed");
        assert!(err.to_string().contains("--upgrade pip"));
        assert!(err.to_string().contains("network unreachable"));
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn failed_manifest_install_carries_diagnostic() {
        let dir = TempDir::new().unwrap();
        let manifest = manifest_in(&dir);
        let sandbox = Sandbox::at(&dir.path().join("venv"));
        let runner = FakeRunner::new().on_run(|spec| {
            if spec.args.iter().any(|a| a == "-r") {
                Ok(fail(
                    1,
                    "ERROR: No matching distribution found for galileo>=1.0",
                ))
            } else {
                Ok(ok("Successfully installed pip"))
            }
        });

        let err = install(&runner, &sandbox.activate(), &manifest).unwrap_err();

        assert!(matches!(err, BootstrapError::InstallFailed { .. }));
        assert!(err.to_string().contains("No matching distribution"));
    }

    #[test]
    fn missing_manifest_fails_without_running_pip() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::at(&dir.path().join("venv"));
        let runner = FakeRunner::new();
        let manifest = DependencyManifest::new(dir.path().join("requirements.txt"));

        let err = install(&runner, &sandbox.activate(), &manifest).unwrap_err();

        assert_eq!(err.kind(), "InstallFailed");
        assert!(err.to_string().contains("does not exist"));
        assert!(runner.calls.borrow().is_empty());
    }
}
