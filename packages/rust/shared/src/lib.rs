//! Shared types, error model, and configuration for bookforge.
//!
//! This crate is the foundation depended on by all other bookforge crates.
//! It provides:
//! - [`BookForgeError`]: the unified error type
//! - Configuration ([`BookConfig`], config loading, legacy [`normalize`])
//! - Project [`layout`] (source and output paths)
//! - Run options ([`BuildOptions`]) and results ([`BuildResult`], [`BuildReport`])

pub mod config;
pub mod error;
pub mod layout;
pub mod normalize;
pub mod options;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BookConfig, CONFIG_FILE_NAMES, DEFAULT_LANGUAGE, DocxSettings, EpubSettings, Format,
    FormatSettings, FormatToggles, HtmlSettings, MobiSettings, PdfSettings, find_config_file,
    load_config, load_config_from, read_raw_config,
};
pub use error::{BookForgeError, Result};
pub use options::{BuildOptions, DEFAULT_TIMEOUT, ToolPaths};
pub use types::{BuildReport, BuildResult, BuildStatus, REPORT_FILE_NAME};
