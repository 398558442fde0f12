//! External process invocation.
//!
//! Every stage talks to the outside world through [`CommandRunner`]: locate a
//! program on `PATH`, or run one to completion and capture stdout, stderr and
//! the exit code. [`SystemRunner`] is the real implementation; tests swap in
//! a scripted runner.
//!
//! Runs are blocking. The only way to abort one early is the shared
//! [`Interrupt`] flag, normally raised by a Ctrl-C handler: the child is
//! killed and the call returns [`BootstrapError::Interrupted`].

use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{BootstrapError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Interrupt
// ---------------------------------------------------------------------------

/// Cloneable cancellation flag shared between a signal handler and the runner.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// CommandSpec / ProcessOutput
// ---------------------------------------------------------------------------

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, OsString)>,
    pub env_remove: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            env_remove: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Human-readable rendering used in logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best diagnostic text: stderr when present, stdout otherwise, trimmed to
    /// the last `max_lines` lines.
    pub fn diagnostic(&self, max_lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.trim_end().lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        let text = lines[start..].join("\n");
        if text.is_empty() {
            match self.code {
                Some(code) => format!("exit code {code}, no output"),
                None => "terminated by signal, no output".to_string(),
            }
        } else {
            text
        }
    }

    /// Last non-empty line of the combined output.
    pub fn last_line(&self) -> Option<String> {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(String::from)
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

pub trait CommandRunner {
    /// Resolve `program` against `PATH`. Returns `None` if it is not installed.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run `spec` to completion. A nonzero exit is *not* an error here; callers
    /// decide what a failure means for their stage.
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput>;
}

// ---------------------------------------------------------------------------
// SystemRunner
// ---------------------------------------------------------------------------

/// Runs real processes, polling for completion so an interrupt can kill the child.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    interrupt: Interrupt,
}

impl SystemRunner {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }
}

impl CommandRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        let command_line = spec.display();
        if self.interrupt.is_triggered() {
            return Err(BootstrapError::Interrupted(command_line));
        }
        tracing::debug!(command = %command_line, "spawning");

        let mut child = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BootstrapError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_or_interrupt(&mut child, &self.interrupt)? {
            Some(status) => status,
            None => {
                tracing::debug!(command = %command_line, "interrupted, child killed");
                return Err(BootstrapError::Interrupted(command_line));
            }
        };

        // Ctrl-C reaches the whole foreground group, so the child usually dies
        // of it before the poll notices; report that as an interrupt too.
        if self.interrupt.is_triggered() {
            return Err(BootstrapError::Interrupted(command_line));
        }

        let output = ProcessOutput {
            code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        };
        tracing::debug!(command = %command_line, code = ?output.code, "exited");
        Ok(output)
    }
}

/// Wait for `child`, killing it if the interrupt fires first.
/// Returns `None` when the child was killed.
fn wait_or_interrupt(child: &mut Child, interrupt: &Interrupt) -> Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if interrupt.is_triggered() {
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to the end on a background thread so a chatty child never
/// blocks on a full pipe while we poll.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted runner for unit tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    type Handler = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput>>;

    #[derive(Default)]
    pub struct FakeRunner {
        pub installed: HashMap<String, PathBuf>,
        handler: Option<Handler>,
        pub calls: RefCell<Vec<CommandSpec>>,
        pub located: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_program(mut self, name: &str, path: &str) -> Self {
            self.installed.insert(name.to_string(), PathBuf::from(path));
            self
        }

        pub fn on_run(mut self, f: impl Fn(&CommandSpec) -> Result<ProcessOutput> + 'static) -> Self {
            self.handler = Some(Box::new(f));
            self
        }

        pub fn call_lines(&self) -> Vec<String> {
            self.calls.borrow().iter().map(CommandSpec::display).collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn locate(&self, program: &str) -> Option<PathBuf> {
            self.located.borrow_mut().push(program.to_string());
            self.installed.get(program).cloned()
        }

        fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
            self.calls.borrow_mut().push(spec.clone());
            match &self.handler {
                Some(f) => f(spec),
                None => Ok(ok("")),
            }
        }
    }

    pub fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}
