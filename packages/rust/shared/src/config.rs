//! Book configuration for bookforge.
//!
//! The project config lives at `<project>/book.toml` (or `book.json` /
//! `config.json`). Both the current camelCase schema and the legacy
//! snake_case schema are accepted; see [`crate::normalize`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BookForgeError, Result};
use crate::normalize;

/// Config file names probed under the project root, in priority order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["book.toml", "book.json", "config.json"];

/// Language used when the config names none.
pub const DEFAULT_LANGUAGE: &str = "en";

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// An output publication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Print document.
    Pdf,
    /// E-reader package.
    Epub,
    /// Web page.
    Html,
    /// Word-processor document.
    Docx,
    /// E-ink device package.
    Mobi,
}

impl Format {
    /// Every format, in canonical build order.
    pub const ALL: [Format; 5] = [
        Format::Pdf,
        Format::Epub,
        Format::Html,
        Format::Docx,
        Format::Mobi,
    ];

    /// Config key for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Html => "html",
            Self::Docx => "docx",
            Self::Mobi => "mobi",
        }
    }

    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Format whose artifact must exist before this one can be generated.
    pub fn prerequisite(&self) -> Option<Format> {
        match self {
            Self::Mobi => Some(Self::Epub),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = BookForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "epub" => Ok(Self::Epub),
            "html" => Ok(Self::Html),
            "docx" => Ok(Self::Docx),
            "mobi" | "kindle" => Ok(Self::Mobi),
            other => Err(BookForgeError::validation(format!(
                "unknown format '{other}': expected one of pdf, epub, html, docx, mobi"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs (canonical schema)
// ---------------------------------------------------------------------------

/// Normalized book configuration. Read-only once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Stem used for every generated file (`build/<lang>/<filePrefix>.<ext>`).
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Language codes, order-preserving, never empty after normalization.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Per-format enable flags.
    #[serde(default)]
    pub formats: FormatToggles,

    /// Per-format settings, all five blocks always present.
    #[serde(default)]
    pub format_settings: FormatSettings,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            subtitle: None,
            author: default_author(),
            publisher: None,
            file_prefix: default_file_prefix(),
            languages: default_languages(),
            formats: FormatToggles::default(),
            format_settings: FormatSettings::default(),
        }
    }
}

impl BookConfig {
    /// Whether `format` is enabled in this config.
    pub fn is_enabled(&self, format: Format) -> bool {
        self.formats.get(format)
    }

    /// The language built when none is requested explicitly.
    pub fn default_language(&self) -> &str {
        self.languages
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Whether the fallback tier is allowed for `format`.
    pub fn fallback_enabled(&self, format: Format) -> bool {
        let s = &self.format_settings;
        match format {
            Format::Pdf => s.pdf.fallback,
            Format::Epub => s.epub.fallback,
            Format::Html => s.html.fallback,
            Format::Docx => s.docx.fallback,
            Format::Mobi => s.mobi.fallback,
        }
    }

    /// Serialize to pretty TOML (used by `config show` / `config migrate`).
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BookForgeError::config(e.to_string()))
    }
}

fn default_title() -> String {
    "Untitled Book".into()
}
fn default_author() -> String {
    "Unknown Author".into()
}
fn default_file_prefix() -> String {
    "book".into()
}
fn default_languages() -> Vec<String> {
    vec![DEFAULT_LANGUAGE.to_string()]
}
fn default_true() -> bool {
    true
}

/// `formats` map: format name → enabled. Unset keys default to enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatToggles {
    #[serde(default = "default_true")]
    pub pdf: bool,
    #[serde(default = "default_true")]
    pub epub: bool,
    #[serde(default = "default_true")]
    pub html: bool,
    #[serde(default = "default_true")]
    pub docx: bool,
    #[serde(default = "default_true")]
    pub mobi: bool,
}

impl Default for FormatToggles {
    fn default() -> Self {
        Self {
            pdf: true,
            epub: true,
            html: true,
            docx: true,
            mobi: true,
        }
    }
}

impl FormatToggles {
    pub fn get(&self, format: Format) -> bool {
        match format {
            Format::Pdf => self.pdf,
            Format::Epub => self.epub,
            Format::Html => self.html,
            Format::Docx => self.docx,
            Format::Mobi => self.mobi,
        }
    }

    pub fn set(&mut self, format: Format, enabled: bool) {
        match format {
            Format::Pdf => self.pdf = enabled,
            Format::Epub => self.epub = enabled,
            Format::Html => self.html = enabled,
            Format::Docx => self.docx = enabled,
            Format::Mobi => self.mobi = enabled,
        }
    }
}

/// `formatSettings` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatSettings {
    #[serde(default)]
    pub pdf: PdfSettings,
    #[serde(default)]
    pub epub: EpubSettings,
    #[serde(default)]
    pub html: HtmlSettings,
    #[serde(default)]
    pub docx: DocxSettings,
    #[serde(default)]
    pub mobi: MobiSettings,
}

/// Print-document settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfSettings {
    #[serde(default = "default_paper_size")]
    pub paper_size: String,
    #[serde(default = "default_margin")]
    pub margin_top: String,
    #[serde(default = "default_margin")]
    pub margin_bottom: String,
    #[serde(default = "default_margin")]
    pub margin_left: String,
    #[serde(default = "default_margin")]
    pub margin_right: String,
    #[serde(default = "default_font_size")]
    pub font_size: String,
    #[serde(default = "default_line_height")]
    pub line_height: String,
    /// Template file, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default = "default_pdf_engine")]
    pub pdf_engine: String,
    #[serde(default = "default_true")]
    pub toc: bool,
    #[serde(default = "default_deep_toc")]
    pub toc_depth: u8,
    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            paper_size: default_paper_size(),
            margin_top: default_margin(),
            margin_bottom: default_margin(),
            margin_left: default_margin(),
            margin_right: default_margin(),
            font_size: default_font_size(),
            line_height: default_line_height(),
            template: None,
            pdf_engine: default_pdf_engine(),
            toc: true,
            toc_depth: default_deep_toc(),
            fallback: true,
        }
    }
}

fn default_paper_size() -> String {
    "a4".into()
}
fn default_margin() -> String {
    "2.5cm".into()
}
fn default_font_size() -> String {
    "11pt".into()
}
fn default_line_height() -> String {
    "1.5".into()
}
fn default_pdf_engine() -> String {
    "xelatex".into()
}
fn default_deep_toc() -> u8 {
    3
}
fn default_shallow_toc() -> u8 {
    2
}

/// E-reader package settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
    #[serde(default = "default_true")]
    pub toc: bool,
    #[serde(default = "default_shallow_toc")]
    pub toc_depth: u8,
    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl Default for EpubSettings {
    fn default() -> Self {
        Self {
            cover_image: None,
            stylesheet: None,
            toc: true,
            toc_depth: default_shallow_toc(),
            fallback: true,
        }
    }
}

/// Web page settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
    #[serde(default = "default_true")]
    pub toc: bool,
    #[serde(default = "default_deep_toc")]
    pub toc_depth: u8,
    /// Wrap sections in `<section>` containers.
    #[serde(default = "default_true")]
    pub section_divs: bool,
    /// Embed images and stylesheets into the single output file.
    #[serde(default = "default_true")]
    pub self_contained: bool,
    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl Default for HtmlSettings {
    fn default() -> Self {
        Self {
            template: None,
            stylesheet: None,
            toc: true,
            toc_depth: default_deep_toc(),
            section_divs: true,
            self_contained: true,
            fallback: true,
        }
    }
}

/// Word-processor document settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_doc: Option<String>,
    #[serde(default = "default_true")]
    pub toc: bool,
    #[serde(default = "default_shallow_toc")]
    pub toc_depth: u8,
    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl Default for DocxSettings {
    fn default() -> Self {
        Self {
            reference_doc: None,
            toc: true,
            toc_depth: default_shallow_toc(),
            fallback: true,
        }
    }
}

/// Device package settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobiSettings {
    /// Compression level handed to kindlegen (`-c0`..`-c2`).
    #[serde(default = "default_compression")]
    pub compression: u8,
    #[serde(default = "default_true")]
    pub fallback: bool,
}

impl Default for MobiSettings {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            fallback: true,
        }
    }
}

fn default_compression() -> u8 {
    1
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Find the first existing config file under `project_root`.
pub fn find_config_file(project_root: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
}

/// Load and normalize the project config.
///
/// `explicit` wins over the probed file names. Never fails: a missing or
/// unparseable file yields [`BookConfig::default`].
pub fn load_config(project_root: &Path, explicit: Option<&Path>) -> BookConfig {
    let path = match explicit {
        Some(p) if p.is_absolute() => Some(p.to_path_buf()),
        Some(p) => Some(project_root.join(p)),
        None => find_config_file(project_root),
    };

    match path {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!(root = %project_root.display(), "config file not found, using defaults");
            BookConfig::default()
        }
    }
}

/// Load and normalize a specific config file, substituting defaults on failure.
pub fn load_config_from(path: &Path) -> BookConfig {
    match read_raw_config(path) {
        Ok(raw) => normalize::normalize(raw),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "config parse failed, using defaults");
            BookConfig::default()
        }
    }
}

/// Read a config file into an untyped JSON value (TOML is converted).
pub fn read_raw_config(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| BookForgeError::io(path, e))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        parse_toml(&content, path)
    } else {
        serde_json::from_str(&content).or_else(|json_err| {
            parse_toml(&content, path).map_err(|_| {
                BookForgeError::config(format!("failed to parse {}: {json_err}", path.display()))
            })
        })
    }
}

fn parse_toml(content: &str, path: &Path) -> Result<serde_json::Value> {
    let value: toml::Value = toml::from_str(content).map_err(|e| {
        BookForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    serde_json::to_value(value).map_err(|e| BookForgeError::config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bf-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_config_values() {
        let config = BookConfig::default();
        assert_eq!(config.title, "Untitled Book");
        assert_eq!(config.author, "Unknown Author");
        assert_eq!(config.languages, vec!["en".to_string()]);
        assert!(Format::ALL.iter().all(|f| config.is_enabled(*f)));
    }

    #[test]
    fn default_config_serializes_camel_case() {
        let toml_str = BookConfig::default().to_toml_string().expect("serialize");
        assert!(toml_str.contains("filePrefix"));
        assert!(toml_str.contains("paperSize"));
        assert!(toml_str.contains("[formatSettings.mobi]"));
    }

    #[test]
    fn config_roundtrip_through_toml() {
        let config = BookConfig::default();
        let toml_str = config.to_toml_string().expect("serialize");
        let parsed: BookConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed, config);
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("PDF".parse::<Format>().unwrap(), Format::Pdf);
        assert_eq!("kindle".parse::<Format>().unwrap(), Format::Mobi);
        assert!("odt".parse::<Format>().is_err());
    }

    #[test]
    fn mobi_requires_epub() {
        assert_eq!(Format::Mobi.prerequisite(), Some(Format::Epub));
        assert_eq!(Format::Pdf.prerequisite(), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = temp_dir();
        let config = load_config(&tmp, None);
        assert_eq!(config, BookConfig::default());
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("book.json"), "{ not json").unwrap();
        let config = load_config(&tmp, None);
        assert_eq!(config.title, "Untitled Book");
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn toml_file_is_loaded() {
        let tmp = temp_dir();
        std::fs::write(
            tmp.join("book.toml"),
            r#"
title = "Rust in Print"
author = "A. Writer"
languages = ["en", "es"]

[formats]
pdf = false
"#,
        )
        .unwrap();

        let config = load_config(&tmp, None);
        assert_eq!(config.title, "Rust in Print");
        assert_eq!(config.languages, vec!["en", "es"]);
        assert!(!config.is_enabled(Format::Pdf));
        assert!(config.is_enabled(Format::Epub));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_path_wins_over_probe() {
        let tmp = temp_dir();
        std::fs::write(tmp.join("book.json"), r#"{"title": "Probed"}"#).unwrap();
        std::fs::write(tmp.join("alt.json"), r#"{"title": "Explicit"}"#).unwrap();

        let config = load_config(&tmp, Some(Path::new("alt.json")));
        assert_eq!(config.title, "Explicit");
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
