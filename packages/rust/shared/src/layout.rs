//! On-disk project layout: where sources live and where outputs go.

use std::path::{Path, PathBuf};

use crate::config::Format;

/// Source tree root, one subdirectory per language.
pub const BOOK_DIR: &str = "book";

/// Sole write target of a build.
pub const BUILD_DIR: &str = "build";

/// `build/`
pub fn build_dir(project_root: &Path) -> PathBuf {
    project_root.join(BUILD_DIR)
}

/// `build/<lang>/`
pub fn language_build_dir(project_root: &Path, language: &str) -> PathBuf {
    build_dir(project_root).join(language)
}

/// `book/<lang>/`
pub fn language_source_dir(project_root: &Path, language: &str) -> PathBuf {
    project_root.join(BOOK_DIR).join(language)
}

/// `build/<lang>/<prefix>.md`, the assembled intermediate document.
pub fn assembled_document(project_root: &Path, language: &str, file_prefix: &str) -> PathBuf {
    language_build_dir(project_root, language).join(format!("{file_prefix}.md"))
}

/// `build/<lang>/<prefix>.<ext>`
pub fn artifact_path(project_root: &Path, language: &str, file_prefix: &str, format: Format) -> PathBuf {
    language_build_dir(project_root, language).join(format!("{file_prefix}.{}", format.extension()))
}
