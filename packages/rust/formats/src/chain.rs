//! Ordered attempt chains and the "first success wins" combinator.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use bookforge_shared::{BookForgeError, BuildResult, BuildStatus, Format};

use crate::runner::{CommandRunner, Invocation};

/// Position of an attempt in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Full-featured invocation from the format settings.
    Primary,
    /// Reduced-functionality retry.
    Fallback,
    /// Produces a different artifact standing in for the requested one.
    Substitute,
}

/// One named strategy in a format's chain.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub name: String,
    pub tier: Tier,
    pub invocation: Invocation,
    /// File that must exist before this attempt can run.
    pub requires: Option<PathBuf>,
}

impl Attempt {
    pub fn new(name: impl Into<String>, tier: Tier, invocation: Invocation) -> Self {
        Self {
            name: name.into(),
            tier,
            invocation,
            requires: None,
        }
    }

    pub fn requires(mut self, input: impl Into<PathBuf>) -> Self {
        self.requires = Some(input.into());
        self
    }

    fn output(&self) -> PathBuf {
        self.invocation.output.clone().unwrap_or_default()
    }
}

/// Run `attempts` in order until one succeeds.
///
/// An attempt succeeds when the process exits with an accepted code and its
/// output file exists afterwards. Every attempt failure is kept in the
/// diagnostics of the returned result; `notes` are prepended to them.
pub async fn run_chain<R: CommandRunner>(
    runner: &R,
    language: &str,
    format: Format,
    attempts: &[Attempt],
    notes: Vec<String>,
) -> BuildResult {
    let start = Instant::now();
    let mut diagnostics = notes;

    let Some(first) = attempts.first() else {
        diagnostics.push(format!("no strategy available for {format}"));
        return BuildResult {
            language: language.to_string(),
            format,
            status: BuildStatus::Failed,
            output: PathBuf::new(),
            invocation: String::new(),
            fallback: false,
            degraded: false,
            diagnostics: diagnostics.join("\n"),
            elapsed: start.elapsed(),
        };
    };

    let mut last = first;

    for attempt in attempts {
        if let Some(input) = &attempt.requires {
            if !input.is_file() {
                let msg = format!("{}: skipped, input {} is missing", attempt.name, input.display());
                warn!(lang = language, %format, attempt = %attempt.name, "{msg}");
                diagnostics.push(msg);
                continue;
            }
        }
        last = attempt;

        let output = attempt.output();
        if let Err(e) = tokio::fs::remove_file(&output).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                diagnostics.push(format!("could not remove stale {}: {e}", output.display()));
            }
        }

        let failure = match runner.run(&attempt.invocation).await {
            Ok(out) if attempt.invocation.accepts(out.code) && output.is_file() => {
                if attempt.tier == Tier::Substitute {
                    let msg = format!(
                        "no real {format} package was produced; wrote substitute {}",
                        output.display()
                    );
                    warn!(lang = language, %format, "{msg}");
                    diagnostics.push(msg);
                } else {
                    info!(lang = language, %format, attempt = %attempt.name, output = %output.display(), "artifact generated");
                }
                let stderr = out.stderr.trim();
                if !stderr.is_empty() {
                    diagnostics.push(stderr.to_string());
                }
                return BuildResult {
                    language: language.to_string(),
                    format,
                    status: BuildStatus::Success,
                    output,
                    invocation: attempt.invocation.to_string(),
                    fallback: attempt.tier != Tier::Primary,
                    degraded: attempt.tier == Tier::Substitute,
                    diagnostics: diagnostics.join("\n"),
                    elapsed: start.elapsed(),
                };
            }
            Ok(out) if attempt.invocation.accepts(out.code) => {
                format!("exited successfully but {} was not created", output.display())
            }
            Ok(out) => {
                let code = out.code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                format!("exit code {code}: {}", tail(&out.stderr))
            }
            Err(e) => e.to_string(),
        };

        warn!(lang = language, %format, attempt = %attempt.name, "attempt failed: {failure}");
        diagnostics.push(format!("{}: {failure}", attempt.name));
    }

    let exhausted = BookForgeError::conversion(
        format.as_str(),
        format!("no strategy succeeded for {language} ({} tried)", attempts.len()),
    );
    warn!(lang = language, %format, "{exhausted}");
    diagnostics.push(exhausted.to_string());

    BuildResult {
        language: language.to_string(),
        format,
        status: BuildStatus::Failed,
        output: first.output(),
        invocation: last.invocation.to_string(),
        fallback: last.tier != Tier::Primary,
        degraded: false,
        diagnostics: diagnostics.join("\n"),
        elapsed: start.elapsed(),
    }
}

/// Last few non-empty lines of tool output.
fn tail(text: &str) -> String {
    const LINES: usize = 5;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let from = lines.len().saturating_sub(LINES);
    lines[from..].join("\n")
}
