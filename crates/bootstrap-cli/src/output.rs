use bootstrap_core::pipeline::{PipelineEvent, RunReport, Stage, EXIT_INTERRUPTED};
use bootstrap_core::verify::ImportCheckResult;
use crossterm::style::{Color, Stylize};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::Path;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

// ---------------------------------------------------------------------------
// Status lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Warning,
    Error,
    Info,
}

impl Status {
    fn icon(self, unicode: bool) -> &'static str {
        match (unicode, self) {
            (true, Status::Success) => "✓",
            (true, Status::Warning) => "⚠",
            (true, Status::Error) => "✗",
            (true, Status::Info) => "●",
            (false, Status::Success) => "[ok]",
            (false, Status::Warning) => "[warn]",
            (false, Status::Error) => "[error]",
            (false, Status::Info) => "[..]",
        }
    }

    fn color(self) -> Color {
        match self {
            Status::Success => Color::Green,
            Status::Warning => Color::Yellow,
            Status::Error => Color::Red,
            Status::Info => Color::Cyan,
        }
    }
}

/// Renders pipeline progress and the final report for a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub color: bool,
    pub unicode: bool,
}

impl Printer {
    /// Color only on a real terminal without `NO_COLOR`.
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal();
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self {
            color: tty && !no_color,
            unicode: !cfg!(windows) || tty,
        }
    }

    pub fn line(&self, status: Status, text: &str) -> String {
        let icon = status.icon(self.unicode);
        if self.color {
            format!("{} {}", icon.with(status.color()), text)
        } else {
            format!("{icon} {text}")
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn header(&self, root: &Path) {
        println!("{}", self.bold("Galileo tutorial environment setup"));
        println!("Project root: {}\n", root.display());
    }

    pub fn warning(&self, text: &str) {
        println!("{}", self.line(Status::Warning, text));
    }

    pub fn event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted(stage) => {
                println!("{}", self.line(Status::Info, &format!("{}...", stage.title())));
            }
            PipelineEvent::StageCompleted { detail, .. } => {
                println!("{}", self.line(Status::Success, detail));
            }
            PipelineEvent::Import(result) => println!("  {}", self.import_line(result)),
            PipelineEvent::StageFailed { stage, message } => {
                println!("{}", self.line(Status::Error, &format!("[{stage}] {message}")));
            }
        }
    }

    fn import_line(&self, result: &ImportCheckResult) -> String {
        let reason = result
            .reason
            .as_deref()
            .map(|r| format!(": {r}"))
            .unwrap_or_default();
        match (result.succeeded, result.required) {
            (true, _) => self.line(Status::Success, &result.package),
            (false, true) => self.line(Status::Error, &format!("{}{reason}", result.package)),
            (false, false) => self.line(
                Status::Warning,
                &format!("{} (optional){reason}", result.package),
            ),
        }
    }

    pub fn summary(&self, report: &RunReport) {
        println!();
        if report.succeeded() {
            self.success_summary(report);
        } else {
            self.failure_summary(report);
        }
    }

    fn success_summary(&self, report: &RunReport) {
        let banner = "Setup complete";
        let rule = "=".repeat(40);
        if self.color {
            println!("{}", rule.as_str().with(Color::Green));
            println!("{}", banner.with(Color::Green).bold());
            println!("{}", rule.as_str().with(Color::Green));
        } else {
            println!("{rule}\n{banner}\n{rule}");
        }

        let warnings = report.warnings().count();
        if warnings > 0 {
            self.warning(&format!(
                "{warnings} optional package(s) failed to import; some tutorial steps may not run"
            ));
        }

        let Some(next) = &report.next_steps else {
            return;
        };
        println!("\n{}", self.bold("Next steps:"));
        println!("  1. Activate the environment:");
        println!("       {}", next.activate);
        println!(
            "  2. Fill in these keys in {}:",
            next.config_file.display()
        );
        for key in &next.required_keys {
            println!("       {key}");
        }
        println!("  3. Run the first tutorial step:");
        println!("       {}", next.example);
    }

    fn failure_summary(&self, report: &RunReport) {
        let Some(failure) = &report.failure else {
            return;
        };
        let banner = if report.exit_code() == EXIT_INTERRUPTED {
            "Setup interrupted".to_string()
        } else {
            format!("Setup failed at stage '{}'", failure.stage)
        };
        println!("{}", self.line(Status::Error, &self.bold(&banner)));
        if let Some(hint) = hint(failure.stage, failure.error.kind()) {
            println!("  {hint}");
        }
    }
}

/// Remediation advice for the operator.
fn hint(stage: Stage, kind: &str) -> Option<&'static str> {
    match (stage, kind) {
        (_, "Interrupted") => None,
        (Stage::Toolchain, "ToolchainNotFound") => {
            Some("Install Python 3.12 or newer and make sure `python3` is on your PATH.")
        }
        (Stage::Toolchain, "ToolchainTooOld") => {
            Some("Upgrade Python (or put a newer interpreter first on PATH) and re-run.")
        }
        (Stage::Sandbox, "ProvisioningCorrupt") => {
            Some("Delete the directory shown above yourself, then re-run; it is never removed automatically.")
        }
        (Stage::Sandbox, _) => Some("Make sure the `venv` module is available (e.g. the python3-venv package)."),
        (Stage::Config, _) => Some("Restore the template file from version control and re-run."),
        (Stage::Install, _) => Some("Check the pip output above, fix the manifest or network access, and re-run."),
        (Stage::Verify, _) => Some("Reinstall the failing packages inside the environment and re-run."),
        _ => None,
    }
}
