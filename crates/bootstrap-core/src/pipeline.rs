//! The bootstrap state machine.
//!
//! ```text
//! Start → VersionChecked → Provisioned → ConfigSeeded → DependenciesInstalled → Verified → Done
//!   └──────────────┴──────────────┴──────────────┴──────────────┴──────→ Failed(stage, error)
//! ```
//!
//! Each state carries exactly what the next stage needs, so the detected
//! interpreter and the sandbox flow forward as values. Transitions never go
//! backward and nothing is retried; the first failure is terminal.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::error::{BootstrapError, Result};
use crate::install::{self, DependencyManifest};
use crate::paths;
use crate::process::CommandRunner;
use crate::sandbox::{self, Provisioned, Sandbox};
use crate::seed::{self, SeedOutcome, REQUIRED_CONFIG_KEYS};
use crate::settings::Layout;
use crate::toolchain::{self, DetectedToolchain, ToolchainRequirement, MIN_TOOLCHAIN, RUNTIME_CANDIDATES};
use crate::verify::{self, ImportCheckResult, OPTIONAL_PACKAGES, REQUIRED_PACKAGES};

/// First tutorial step, suggested once setup succeeds.
pub const EXAMPLE_SCRIPT: &str = "getting_started/rag/step1_get_started.py";

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Toolchain,
    Sandbox,
    Config,
    Install,
    Verify,
}

impl Stage {
    #[cfg(test)]
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Toolchain,
            Stage::Sandbox,
            Stage::Config,
            Stage::Install,
            Stage::Verify,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Toolchain => "toolchain",
            Stage::Sandbox => "sandbox",
            Stage::Config => "config",
            Stage::Install => "install",
            Stage::Verify => "verify",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Toolchain => "Checking Python version",
            Stage::Sandbox => "Provisioning virtual environment",
            Stage::Config => "Seeding configuration",
            Stage::Install => "Installing dependencies",
            Stage::Verify => "Verifying imports",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageFailure
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: BootstrapError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

impl Serialize for StageFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("StageFailure", 3)?;
        s.serialize_field("stage", &self.stage)?;
        s.serialize_field("kind", self.error.kind())?;
        s.serialize_field("message", &self.error.to_string())?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PipelineState {
    Start,
    VersionChecked { toolchain: DetectedToolchain },
    Provisioned { sandbox: Sandbox },
    ConfigSeeded { sandbox: Sandbox },
    DependenciesInstalled { sandbox: Sandbox },
    Verified,
    Done,
    Failed(StageFailure),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::VersionChecked { .. } => "version_checked",
            PipelineState::Provisioned { .. } => "provisioned",
            PipelineState::ConfigSeeded { .. } => "config_seeded",
            PipelineState::DependenciesInstalled { .. } => "dependencies_installed",
            PipelineState::Verified => "verified",
            PipelineState::Done => "done",
            PipelineState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// Stage that runs when leaving this state.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Start => Some(Stage::Toolchain),
            PipelineState::VersionChecked { .. } => Some(Stage::Sandbox),
            PipelineState::Provisioned { .. } => Some(Stage::Config),
            PipelineState::ConfigSeeded { .. } => Some(Stage::Install),
            PipelineState::DependenciesInstalled { .. } => Some(Stage::Verify),
            PipelineState::Verified | PipelineState::Done | PipelineState::Failed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Progress notifications, delivered while the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted(Stage),
    StageCompleted { stage: Stage, detail: String },
    Import(ImportCheckResult),
    StageFailed { stage: Stage, message: String },
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    pub detail: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextSteps {
    pub activate: String,
    pub config_file: PathBuf,
    pub required_keys: Vec<String>,
    pub example: String,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub state: &'static str,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<DetectedToolchain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<Provisioned>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<SeedOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<usize>,
    pub imports: Vec<ImportCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<NextSteps>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            state: PipelineState::Start.name(),
            stages: Vec::new(),
            toolchain: None,
            sandbox: None,
            config: None,
            installed: None,
            imports: Vec::new(),
            failure: None,
            next_steps: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.state == PipelineState::Done.name()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ImportCheckResult> {
        self.imports.iter().filter(|r| !r.required && !r.succeeded)
    }

    pub fn exit_code(&self) -> i32 {
        match &self.failure {
            None if self.succeeded() => EXIT_OK,
            Some(f) if f.error.is_interrupted() => EXIT_INTERRUPTED,
            _ => EXIT_FAILED,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    layout: Layout,
    requirement: ToolchainRequirement,
    candidates: &'a [&'a str],
    required: &'a [&'a str],
    optional: &'a [&'a str],
}

impl<'a> Pipeline<'a> {
    pub fn new(runner: &'a dyn CommandRunner, layout: Layout) -> Self {
        Self {
            runner,
            layout,
            requirement: MIN_TOOLCHAIN,
            candidates: RUNTIME_CANDIDATES,
            required: REQUIRED_PACKAGES,
            optional: OPTIONAL_PACKAGES,
        }
    }

    pub fn with_requirement(mut self, requirement: ToolchainRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Drive the state machine to a terminal state.
    pub fn run(&self, on_event: &mut dyn FnMut(&PipelineEvent)) -> RunReport {
        let mut report = RunReport::new();
        let mut state = PipelineState::Start;

        while !state.is_terminal() {
            state = match state.next_stage() {
                Some(stage) => self.advance(stage, state, &mut report, on_event),
                None => PipelineState::Done,
            };
            report.state = state.name();
            tracing::info!(state = report.state, "pipeline transition");
        }

        match state {
            PipelineState::Failed(failure) => {
                on_event(&PipelineEvent::StageFailed {
                    stage: failure.stage,
                    message: failure.error.to_string(),
                });
                report.failure = Some(failure);
            }
            _ => report.next_steps = Some(self.next_steps()),
        }
        report
    }

    fn advance(
        &self,
        stage: Stage,
        state: PipelineState,
        report: &mut RunReport,
        on_event: &mut dyn FnMut(&PipelineEvent),
    ) -> PipelineState {
        on_event(&PipelineEvent::StageStarted(stage));
        let started = Instant::now();

        let result = self.transition(state, report, on_event);

        let (status, detail) = match &result {
            Ok((_, detail)) => (StageStatus::Ok, detail.clone()),
            Err(e) => (StageStatus::Failed, e.to_string()),
        };
        report.stages.push(StageRecord {
            stage,
            status,
            detail: detail.clone(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });

        match result {
            Ok((next, _)) => {
                on_event(&PipelineEvent::StageCompleted { stage, detail });
                next
            }
            Err(error) => PipelineState::Failed(StageFailure { stage, error }),
        }
    }

    /// Run the stage that leaves `state`; returns the next state and a one-line detail.
    fn transition(
        &self,
        state: PipelineState,
        report: &mut RunReport,
        on_event: &mut dyn FnMut(&PipelineEvent),
    ) -> Result<(PipelineState, String)> {
        match state {
            PipelineState::Start => {
                let found = toolchain::detect(self.runner, self.candidates)?;
                report.toolchain = Some(found.clone());
                toolchain::validate(&found, &self.requirement)?;
                let detail = format!(
                    "{} {} ({}) satisfies >= {}",
                    found.command,
                    found.version,
                    found.path.display(),
                    self.requirement
                );
                Ok((PipelineState::VersionChecked { toolchain: found }, detail))
            }
            PipelineState::VersionChecked { toolchain } => {
                let provisioned = sandbox::ensure(self.runner, &toolchain, &self.layout.sandbox_dir)?;
                let verb = if provisioned.created { "created" } else { "reused" };
                let detail = format!("{verb} {}", self.layout.sandbox_rel.display());
                let sandbox = provisioned.sandbox.clone();
                report.sandbox = Some(provisioned);
                Ok((PipelineState::Provisioned { sandbox }, detail))
            }
            PipelineState::Provisioned { sandbox } => {
                let outcome = seed::seed(&self.layout.config_template, &self.layout.config_file)?;
                report.config = Some(outcome);
                let detail = match outcome {
                    SeedOutcome::Created => format!(
                        "created {} from {}",
                        self.layout.config_file.display(),
                        self.layout.config_template.display()
                    ),
                    SeedOutcome::Skipped => format!(
                        "{} already exists, left unchanged",
                        self.layout.config_file.display()
                    ),
                };
                Ok((PipelineState::ConfigSeeded { sandbox }, detail))
            }
            PipelineState::ConfigSeeded { sandbox } => {
                let manifest = DependencyManifest::new(&self.layout.manifest);
                let count = {
                    let active = sandbox.activate();
                    install::install(self.runner, &active, &manifest)?
                };
                report.installed = Some(count);
                let detail = format!(
                    "{count} package(s) from {}",
                    self.layout.manifest.display()
                );
                Ok((PipelineState::DependenciesInstalled { sandbox }, detail))
            }
            PipelineState::DependenciesInstalled { sandbox } => {
                let verified = {
                    let active = sandbox.activate();
                    verify::verify(self.runner, &active, self.required, self.optional)?
                };
                for result in &verified.results {
                    on_event(&PipelineEvent::Import(result.clone()));
                }
                let failed: Vec<String> = verified
                    .required_failures()
                    .iter()
                    .map(|r| r.package.clone())
                    .collect();
                let ok = verified.results.iter().filter(|r| r.succeeded).count();
                let total = verified.results.len();
                report.imports = verified.results;
                if !failed.is_empty() {
                    return Err(BootstrapError::RequiredImportFailed { packages: failed });
                }
                Ok((PipelineState::Verified, format!("{ok}/{total} imports succeeded")))
            }
            // No stage leaves these; `run` never calls in with them.
            other @ (PipelineState::Verified | PipelineState::Done | PipelineState::Failed(_)) => {
                Ok((other, String::new()))
            }
        }
    }

    fn next_steps(&self) -> NextSteps {
        NextSteps {
            activate: paths::activation_command(&self.layout.sandbox_rel),
            config_file: self.layout.config_file.clone(),
            required_keys: REQUIRED_CONFIG_KEYS.iter().map(|k| k.to_string()).collect(),
            example: format!("python {EXAMPLE_SCRIPT}"),
        }
    }
}
