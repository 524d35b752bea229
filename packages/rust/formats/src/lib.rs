//! Output format generation through external conversion tools.
//!
//! This crate provides:
//! - [`runner`]: the [`CommandRunner`] seam and the production [`ProcessRunner`]
//! - [`chain`]: ordered [`Attempt`]s and the first-success combinator
//! - [`generators`]: one strategy table per format plus the [`GeneratorRegistry`]

pub mod chain;
pub mod generators;
pub mod runner;

pub use chain::{Attempt, Tier, run_chain};
pub use generators::{
    DocxGenerator, EpubGenerator, FormatGenerator, GenerateContext, GeneratorRegistry,
    HtmlGenerator, MobiGenerator, PdfGenerator,
};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner, probe_version};

#[cfg(any(test, feature = "test-util"))]
pub use runner::FakeRunner;
