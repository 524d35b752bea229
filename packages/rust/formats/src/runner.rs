//! External process seam.
//!
//! Generators never spawn processes themselves; they describe an
//! [`Invocation`] and hand it to a [`CommandRunner`].

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace};

use bookforge_shared::{BookForgeError, DEFAULT_TIMEOUT, Result};

/// One fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (always the project root for generators).
    pub cwd: PathBuf,
    /// File the command is expected to create, if any.
    pub output: Option<PathBuf>,
    /// Exit codes that count as success.
    pub accepted_codes: Vec<i32>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            output: None,
            accepted_codes: vec![0],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn accept_codes(mut self, codes: &[i32]) -> Self {
        self.accepted_codes = codes.to_vec();
        self
    }

    /// Whether `code` counts as a successful exit.
    pub fn accepts(&self, code: Option<i32>) -> bool {
        code.is_some_and(|c| self.accepted_codes.contains(&c))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg.replace('"', "\\\""))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands.
///
/// `Err` means the command could not be run to completion at all (missing
/// program, timeout); a non-zero exit is a normal `Ok` output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput>> + Send;
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(command = %invocation, "spawning");

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BookForgeError::Process(format!("{} not found on PATH", invocation.program))
                } else {
                    BookForgeError::Process(format!("failed to spawn {}: {e}", invocation.program))
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| BookForgeError::Timeout {
                program: invocation.program.clone(),
                elapsed: self.timeout,
            })?
            .map_err(|e| BookForgeError::Process(format!("{}: {e}", invocation.program)))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(program = %invocation.program, code = ?result.code, "process finished");
        Ok(result)
    }
}

/// Ask a tool for its version; `None` when it cannot be run.
pub async fn probe_version<R: CommandRunner>(runner: &R, program: &str) -> Option<String> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let invocation = Invocation::new(program, cwd).arg("--version");
    let output = runner.run(&invocation).await.ok()?;

    // kindlegen prints its banner and exits non-zero for unknown flags.
    let text = if output.stdout.trim().is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// FakeRunner
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeRunner;

#[cfg(any(test, feature = "test-util"))]
mod fake {
    use std::sync::Mutex;

    use super::*;

    type Predicate = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;

    /// Scripted runner for tests.
    ///
    /// By default every invocation succeeds and creates its expected output
    /// file. Failures are scripted by program name or predicate. Every call
    /// is recorded.
    #[derive(Default)]
    pub struct FakeRunner {
        failures: Vec<Predicate>,
        silent: Vec<Predicate>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every invocation of `program` exits with code 2.
        pub fn fail_program(self, program: &str) -> Self {
            let program = program.to_string();
            self.fail_when(move |inv| inv.program == program)
        }

        /// Invocations matching `predicate` exit with code 2.
        pub fn fail_when(mut self, predicate: impl Fn(&Invocation) -> bool + Send + Sync + 'static) -> Self {
            self.failures.push(Box::new(predicate));
            self
        }

        /// `program` exits 0 but never writes its output file.
        pub fn no_output_from(mut self, program: &str) -> Self {
            let program = program.to_string();
            self.silent.push(Box::new(move |inv| inv.program == program));
            self
        }

        /// All invocations received so far, in call order.
        pub fn invocations(&self) -> Vec<Invocation> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(invocation.clone());
            }

            if self.failures.iter().any(|p| p(invocation)) {
                return Ok(CommandOutput {
                    code: Some(2),
                    stdout: String::new(),
                    stderr: format!("{}: scripted failure", invocation.program),
                });
            }

            if let Some(output) = &invocation.output {
                if !self.silent.iter().any(|p| p(invocation)) {
                    if let Some(parent) = output.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| BookForgeError::io(parent, e))?;
                    }
                    std::fs::write(output, format!("fake output of {}", invocation.program))
                        .map_err(|e| BookForgeError::io(output, e))?;
                }
            }

            Ok(CommandOutput {
                code: invocation.accepted_codes.first().copied(),
                stdout: format!("{} ok", invocation.program),
                stderr: String::new(),
            })
        }
    }
}
