//! Runtime build options, merged from CLI flags and environment.
//!
//! Passed explicitly down the call chain; nothing in the pipeline reads
//! global state.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::{BookConfig, Format};

/// Default per-invocation time budget for external tools.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Paths (or names on `PATH`) of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Base conversion engine.
    pub pandoc: String,
    /// Device package converter A.
    pub kindlegen: String,
    /// Device package converter B.
    pub ebook_convert: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pandoc: "pandoc".into(),
            kindlegen: "kindlegen".into(),
            ebook_convert: "ebook-convert".into(),
        }
    }
}

/// Options for a single `build` run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Languages requested explicitly (empty = decide from config).
    pub languages: Vec<String>,
    /// Build every configured language instead of only the first one.
    pub all_languages: bool,
    /// Formats skipped for this run regardless of config.
    pub skip: BTreeSet<Format>,
    /// Pass `--verbose` to the base engine.
    pub verbose: bool,
    /// Maximum concurrent format generations per language.
    pub jobs: usize,
    /// Time budget for each external invocation.
    pub timeout: Duration,
    pub tools: ToolPaths,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            all_languages: false,
            skip: BTreeSet::new(),
            verbose: false,
            jobs: 1,
            timeout: DEFAULT_TIMEOUT,
            tools: ToolPaths::default(),
        }
    }
}

impl BuildOptions {
    /// Languages to build for `config`, in order.
    pub fn target_languages(&self, config: &BookConfig) -> Vec<String> {
        if !self.languages.is_empty() {
            let mut langs: Vec<String> = Vec::with_capacity(self.languages.len());
            for lang in &self.languages {
                if !langs.contains(lang) {
                    langs.push(lang.clone());
                }
            }
            langs
        } else if self.all_languages {
            config.languages.clone()
        } else {
            vec![config.default_language().to_string()]
        }
    }

    /// Formats to generate for `config`, in canonical order.
    pub fn target_formats(&self, config: &BookConfig) -> Vec<Format> {
        Format::ALL
            .into_iter()
            .filter(|f| config.is_enabled(*f) && !self.skip.contains(f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_language_config() -> BookConfig {
        BookConfig {
            languages: vec!["en".into(), "es".into()],
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_first_language() {
        let opts = BuildOptions::default();
        assert_eq!(opts.target_languages(&two_language_config()), vec!["en"]);
    }

    #[test]
    fn all_languages_flag() {
        let opts = BuildOptions {
            all_languages: true,
            ..Default::default()
        };
        assert_eq!(opts.target_languages(&two_language_config()), vec!["en", "es"]);
    }

    #[test]
    fn explicit_languages_win_and_dedupe() {
        let opts = BuildOptions {
            languages: vec!["es".into(), "fr".into(), "es".into()],
            all_languages: true,
            ..Default::default()
        };
        assert_eq!(opts.target_languages(&two_language_config()), vec!["es", "fr"]);
    }

    #[test]
    fn skip_and_disabled_formats_filtered() {
        let mut config = BookConfig::default();
        config.formats.pdf = false;
        let opts = BuildOptions {
            skip: [Format::Mobi].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            opts.target_formats(&config),
            vec![Format::Epub, Format::Html, Format::Docx]
        );
    }
}
