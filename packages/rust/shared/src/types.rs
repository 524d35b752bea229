//! Build result and report types.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Format;

/// File name of the JSON report written under `build/`.
pub const REPORT_FILE_NAME: &str = "build-report.json";

// ---------------------------------------------------------------------------
// BuildResult
// ---------------------------------------------------------------------------

/// Terminal state of one (language, format) task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failed,
}

/// Outcome of generating one format for one language. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub language: String,
    pub format: Format,
    pub status: BuildStatus,
    /// Artifact path (the intended one when the task failed).
    pub output: PathBuf,
    /// Human-readable command line of the last attempt made.
    pub invocation: String,
    /// A fallback tier produced (or last tried to produce) the artifact.
    pub fallback: bool,
    /// The artifact is a substitute, not a real artifact of the requested format.
    #[serde(default)]
    pub degraded: bool,
    /// Collected warnings and tool stderr.
    pub diagnostics: String,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// BuildReport
// ---------------------------------------------------------------------------

/// Aggregated results of one build run (`build/build-report.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Time-sortable run identifier.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<BuildResult>,
}

impl BuildReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Whether at least one artifact was produced.
    pub fn any_success(&self) -> bool {
        self.succeeded() > 0
    }

    /// Look up the result for one (language, format) pair.
    pub fn get(&self, language: &str, format: Format) -> Option<&BuildResult> {
        self.results
            .iter()
            .find(|r| r.language == language && r.format == format)
    }
}
