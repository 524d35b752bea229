//! Core pipeline orchestration for bookforge.
//!
//! This crate ties together fragment assembly, resource resolution and
//! format generation into the end-to-end `build` workflow.

pub mod assembler;
pub mod pipeline;

pub use assembler::{AssembleResult, ContentManifest, Section, SectionKind, Structure, assemble};
pub use pipeline::{BuildRequest, ProgressReporter, SilentProgress, build, write_report};
