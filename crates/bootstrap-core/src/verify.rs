//! Post-install import checks.
//!
//! Required packages gate the run; optional ones only produce warnings. All
//! required packages are tried even after one fails so the report lists
//! everything that is broken at once.

use serde::Serialize;

use crate::error::Result;
use crate::process::CommandRunner;
use crate::sandbox::ActiveSandbox;

/// Packages the tutorials cannot run without, in check order.
pub const REQUIRED_PACKAGES: &[&str] = &["galileo", "langgraph"];

/// Packages only some tutorial steps use.
pub const OPTIONAL_PACKAGES: &[&str] = &["pandas", "dotenv", "langchain-openai"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportCheckResult {
    pub package: String,
    pub required: bool,
    pub succeeded: bool,
    /// Last line of interpreter output when the import failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub results: Vec<ImportCheckResult>,
}

impl VerifyReport {
    pub fn required_failures(&self) -> Vec<&ImportCheckResult> {
        self.results
            .iter()
            .filter(|r| r.required && !r.succeeded)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ImportCheckResult> {
        self.results
            .iter()
            .filter(|r| !r.required && !r.succeeded)
            .collect()
    }

    /// Only required results count toward the verdict.
    pub fn passed(&self) -> bool {
        self.required_failures().is_empty()
    }
}

/// Map a distribution name to the module name Python imports.
pub fn import_name(package: &str) -> String {
    package.trim().replace('-', "_")
}

pub fn verify(
    runner: &dyn CommandRunner,
    active: &ActiveSandbox<'_>,
    required: &[&str],
    optional: &[&str],
) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for (packages, is_required) in [(required, true), (optional, false)] {
        for package in packages {
            let result = check(runner, active, package, is_required)?;
            if !result.succeeded {
                tracing::info!(package = %result.package, required = is_required, "import failed");
            }
            report.results.push(result);
        }
    }

    Ok(report)
}

fn check(
    runner: &dyn CommandRunner,
    active: &ActiveSandbox<'_>,
    package: &str,
    required: bool,
) -> Result<ImportCheckResult> {
    let module = import_name(package);
    let spec = active.python(["-c".to_string(), format!("import {module}")]);
    // A spawn failure is an import failure for this package; an interrupt is not.
    let (succeeded, reason) = match runner.run(&spec) {
        Ok(output) if output.success() => (true, None),
        Ok(output) => (false, output.last_line()),
        Err(e) if e.is_interrupted() => return Err(e),
        Err(e) => (false, Some(e.to_string())),
    };
    Ok(ImportCheckResult {
        package: package.to_string(),
        required,
        succeeded,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;
    use crate::process::fake::{fail, ok, FakeRunner};
    use crate::sandbox::Sandbox;
    use std::path::Path;

    fn failing_imports(modules: &'static [&'static str]) -> FakeRunner {
        FakeRunner::new().on_run(move |spec| {
            let code = spec.args.last().unwrap().to_string_lossy().into_owned();
            let module = code.trim_start_matches("import ").to_string();
            if modules.iter().any(|m| *m == module) {
                Ok(fail(
                    1,
                    &format!(
                        "Traceback (most recent call last):\nModuleNotFoundError: No module named '{module}'\n"
                    ),
                ))
            } else {
                Ok(ok(""))
            }
        })
    }

    #[test]
    fn normalizes_hyphens() {
        assert_eq!(import_name("langchain-openai"), "langchain_openai");
        assert_eq!(import_name(" galileo "), "galileo");
    }

    #[test]
    fn all_imports_succeed() {
        let sandbox = Sandbox::at(Path::new("/work/venv"));
        let runner = failing_imports(&[]);
        let report = verify(
            &runner,
            &sandbox.activate(),
            REQUIRED_PACKAGES,
            OPTIONAL_PACKAGES,
        )
        .unwrap();

        assert!(report.passed());
        assert_eq!(report.results.len(), 5);
        assert_eq!(
            runner.calls.borrow()[4].args.last().unwrap(),
            "import langchain_openai"
        );
    }

    #[test]
    fn continues_through_required_failures() {
        let sandbox = Sandbox::at(Path::new("/work/venv"));
        let runner = failing_imports(&["galileo", "langgraph"]);
        let report = verify(
            &runner,
            &sandbox.activate(),
            REQUIRED_PACKAGES,
            OPTIONAL_PACKAGES,
        )
        .unwrap();

        assert!(!report.passed());
        let failed: Vec<_> = report
            .required_failures()
            .iter()
            .map(|r| r.package.as_str())
            .collect();
        assert_eq!(failed, ["galileo", "langgraph"]);
        assert_eq!(
            report.results[0].reason.as_deref(),
            Some("ModuleNotFoundError: No module named 'galileo'")
        );
        assert_eq!(runner.calls.borrow().len(), 5);
    }

    #[test]
    fn optional_failures_are_only_warnings() {
        let sandbox = Sandbox::at(Path::new("/work/venv"));
        let runner = failing_imports(&["pandas", "langchain_openai"]);
        let report = verify(
            &runner,
            &sandbox.activate(),
            REQUIRED_PACKAGES,
            OPTIONAL_PACKAGES,
        )
        .unwrap();

        assert!(report.passed());
        let warned: Vec<_> = report
            .warnings()
            .iter()
            .map(|r| r.package.as_str())
            .collect();
        assert_eq!(warned, ["pandas", "langchain-openai"]);
    }

    #[test]
    fn interrupt_aborts_verification() {
        let sandbox = Sandbox::at(Path::new("/work/venv"));
        let runner = FakeRunner::new()
            .on_run(|spec| Err(BootstrapError::Interrupted(spec.display())));
        let err = verify(&runner, &sandbox.activate(), REQUIRED_PACKAGES, &[]).unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(runner.calls.borrow().len(), 1);
    }
}
