//! Resource and template resolution across ordered search locations.
//!
//! Given a logical resource (cover image, template, stylesheet, reference
//! document) and a language, the [`ResourceResolver`] builds an ordered
//! candidate list and returns the first entry that exists as a regular file.
//! "Not found" is never an error: callers fall back to the engine's built-in
//! defaults.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use bookforge_shared::{BookConfig, Format};

/// Environment variable overriding the bundled data directory.
pub const DATA_DIR_ENV: &str = "BOOKFORGE_DATA_DIR";

/// Cover file names probed when none is configured.
const DEFAULT_COVER_NAMES: [&str; 2] = ["cover.png", "cover.jpg"];

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// The kind of resource being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Book cover image.
    Cover,
    /// Engine template for a format.
    Template(Format),
    /// Stylesheet for a format.
    Stylesheet(Format),
    /// Word-processor reference document.
    ReferenceDoc,
}

/// A single lookup: kind + language + optional explicitly configured path.
#[derive(Debug, Clone)]
pub struct ResourceQuery<'a> {
    pub kind: ResourceKind,
    pub language: &'a str,
    /// Path from the config, relative to the project root unless absolute.
    pub explicit: Option<&'a str>,
}

impl<'a> ResourceQuery<'a> {
    pub fn new(kind: ResourceKind, language: &'a str) -> Self {
        Self {
            kind,
            language,
            explicit: None,
        }
    }

    pub fn explicit(mut self, path: Option<&'a str>) -> Self {
        self.explicit = path.filter(|p| !p.trim().is_empty());
        self
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves resources for one project.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    project_root: PathBuf,
    bundled_root: Option<PathBuf>,
}

impl ResourceResolver {
    /// Create a resolver for `project_root` without bundled defaults.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            bundled_root: None,
        }
    }

    /// Use `root` as the last-resort location for bundled defaults.
    pub fn with_bundled_root(mut self, root: Option<PathBuf>) -> Self {
        self.bundled_root = root;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Ordered candidate paths for `query`, whether or not they exist.
    pub fn candidates(&self, query: &ResourceQuery<'_>) -> Vec<PathBuf> {
        let root = &self.project_root;
        let lang = query.language;
        let explicit = query.explicit.map(|p| self.absolute(p));
        let explicit_name = query
            .explicit
            .and_then(|p| Path::new(p).file_name())
            .map(|n| n.to_string_lossy().into_owned());

        let mut out: Vec<PathBuf> = explicit.into_iter().collect();

        match query.kind {
            ResourceKind::Cover => {
                let names: Vec<String> = match &explicit_name {
                    Some(name) => vec![name.clone()],
                    None => DEFAULT_COVER_NAMES.iter().map(|n| (*n).to_string()).collect(),
                };

                let mut dirs = vec![
                    root.join("book").join("images"),
                    root.join("book").join(lang).join("images"),
                    root.join("build").join("images"),
                    root.join("build").join(lang).join("images"),
                ];
                dirs.extend(self.bundled("images"));

                for dir in dirs {
                    out.extend(names.iter().map(|n| dir.join(n)));
                }
            }
            ResourceKind::Template(format) => {
                let dir = root.join("templates").join(format.as_str());
                if let Some(name) = &explicit_name {
                    out.push(dir.join(name));
                }
                if let Some(ext) = template_extension(format) {
                    let default_name = format!("default.{ext}");
                    out.push(dir.join(&default_name));
                    out.extend(
                        self.bundled("templates")
                            .map(|b| b.join(format.as_str()).join(&default_name)),
                    );
                }
            }
            ResourceKind::Stylesheet(format) => {
                let dir = root.join("templates").join(format.as_str());
                if let Some(name) = &explicit_name {
                    out.push(dir.join(name));
                }
                out.push(dir.join("style.css"));
                out.push(root.join("resources").join("css").join(format!("{format}.css")));
                out.push(root.join("resources").join("css").join("style.css"));
                out.extend(self.bundled("css").map(|b| b.join(format!("{format}.css"))));
            }
            ResourceKind::ReferenceDoc => {
                let dir = root.join("templates").join("docx");
                if let Some(name) = &explicit_name {
                    out.push(dir.join(name));
                }
                out.push(dir.join("reference.docx"));
                out.push(root.join("resources").join("reference.docx"));
                out.extend(
                    self.bundled("templates")
                        .map(|b| b.join("docx").join("reference.docx")),
                );
            }
        }

        dedupe(out)
    }

    /// First existing regular file for `query`, or `None`.
    pub fn resolve(&self, query: &ResourceQuery<'_>) -> Option<PathBuf> {
        if let Some(explicit) = query.explicit {
            let path = self.absolute(explicit);
            if !path.is_file() {
                warn!(
                    kind = ?query.kind,
                    path = %path.display(),
                    "configured resource not found, searching default locations"
                );
            }
        }

        let found = self.candidates(query).into_iter().find(|p| p.is_file());
        match &found {
            Some(path) => debug!(kind = ?query.kind, lang = query.language, path = %path.display(), "resource resolved"),
            None => debug!(kind = ?query.kind, lang = query.language, "resource not found"),
        }
        found
    }

    /// Resolve the cover image configured for the e-reader format.
    pub fn cover_image(&self, config: &BookConfig, language: &str) -> Option<PathBuf> {
        let explicit = config.format_settings.epub.cover_image.as_deref();
        self.resolve(&ResourceQuery::new(ResourceKind::Cover, language).explicit(explicit))
    }

    /// Resolve the engine template for `format`.
    pub fn template(&self, config: &BookConfig, format: Format, language: &str) -> Option<PathBuf> {
        let explicit = match format {
            Format::Pdf => config.format_settings.pdf.template.as_deref(),
            Format::Html => config.format_settings.html.template.as_deref(),
            _ => None,
        };
        self.resolve(&ResourceQuery::new(ResourceKind::Template(format), language).explicit(explicit))
    }

    /// Resolve the stylesheet for `format`.
    pub fn stylesheet(&self, config: &BookConfig, format: Format, language: &str) -> Option<PathBuf> {
        let explicit = match format {
            Format::Epub => config.format_settings.epub.stylesheet.as_deref(),
            Format::Html => config.format_settings.html.stylesheet.as_deref(),
            _ => None,
        };
        self.resolve(
            &ResourceQuery::new(ResourceKind::Stylesheet(format), language).explicit(explicit),
        )
    }

    /// Resolve the word-processor reference document.
    pub fn reference_doc(&self, config: &BookConfig, language: &str) -> Option<PathBuf> {
        let explicit = config.format_settings.docx.reference_doc.as_deref();
        self.resolve(&ResourceQuery::new(ResourceKind::ReferenceDoc, language).explicit(explicit))
    }

    /// Directories the engine searches for inline references, highest priority first.
    ///
    /// Only existing directories are listed; the project root is always last.
    pub fn search_path(&self, language: &str) -> Vec<PathBuf> {
        let root = &self.project_root;
        let dirs = vec![
            root.join("build").join(language).join("images"),
            root.join("build").join("images"),
            root.join("book").join(language).join("images"),
            root.join("book").join("images"),
            root.join("book").join(language),
            root.join("book"),
            root.join("resources"),
        ];

        let mut out: Vec<PathBuf> = dirs.into_iter().filter(|d| d.is_dir()).collect();
        out.push(root.clone());
        dedupe(out)
    }

    fn absolute(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.project_root.join(p)
        }
    }

    fn bundled(&self, sub: &str) -> Option<PathBuf> {
        self.bundled_root.as_ref().map(|b| b.join(sub))
    }
}

/// Default location of bundled templates and assets.
///
/// `BOOKFORGE_DATA_DIR` wins; otherwise `<platform data dir>/bookforge`.
pub fn default_bundled_root() -> Option<PathBuf> {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|d| d.join("bookforge")))
}

/// Template file extension the engine expects for `format`.
pub fn template_extension(format: Format) -> Option<&'static str> {
    match format {
        Format::Pdf => Some("latex"),
        Format::Html => Some("html"),
        Format::Epub | Format::Docx | Format::Mobi => None,
    }
}

fn dedupe(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for p in paths {
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out
}
