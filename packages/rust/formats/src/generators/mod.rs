//! Per-format strategy tables.
//!
//! Each generator turns the normalized config into an ordered list of
//! [`Attempt`]s. Running them is the job of [`run_chain`]; the
//! [`GeneratorRegistry`] ties the two together and handles prerequisites.

mod docx;
mod epub;
mod html;
mod mobi;
mod pdf;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use bookforge_resources::ResourceResolver;
use bookforge_shared::{BookConfig, BuildResult, Format, ToolPaths, layout};

use crate::chain::{Attempt, Tier, run_chain};
use crate::runner::{CommandRunner, Invocation};

pub use docx::DocxGenerator;
pub use epub::EpubGenerator;
pub use html::HtmlGenerator;
pub use mobi::MobiGenerator;
pub use pdf::PdfGenerator;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a generator needs for one language.
#[derive(Debug, Clone)]
pub struct GenerateContext {
    pub config: Arc<BookConfig>,
    pub language: String,
    pub resolver: Arc<ResourceResolver>,
    pub tools: Arc<ToolPaths>,
    /// Ask the base engine for verbose diagnostics.
    pub verbose: bool,
}

impl GenerateContext {
    pub fn new(
        config: Arc<BookConfig>,
        language: impl Into<String>,
        resolver: Arc<ResourceResolver>,
        tools: Arc<ToolPaths>,
    ) -> Self {
        Self {
            config,
            language: language.into(),
            resolver,
            tools,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn project_root(&self) -> &Path {
        self.resolver.project_root()
    }

    /// The assembled markdown document for this language.
    pub fn document(&self) -> PathBuf {
        layout::assembled_document(self.project_root(), &self.language, &self.config.file_prefix)
    }

    /// Canonical artifact path for `format`.
    pub fn output_path(&self, format: Format) -> PathBuf {
        layout::artifact_path(self.project_root(), &self.language, &self.config.file_prefix, format)
    }

    /// A file next to the artifacts of this language.
    pub fn sibling(&self, file_name: &str) -> PathBuf {
        layout::language_build_dir(self.project_root(), &self.language).join(file_name)
    }

    /// `path` as seen from the project root, the working directory of every invocation.
    pub fn rel(&self, path: &Path) -> String {
        path.strip_prefix(self.project_root())
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Platform-joined resource search path.
    pub fn resource_path(&self) -> String {
        let dirs: Vec<String> = self
            .resolver
            .search_path(&self.language)
            .iter()
            .map(|d| match self.rel(d) {
                rel if rel.is_empty() => ".".to_string(),
                rel => rel,
            })
            .collect();

        std::env::join_paths(&dirs)
            .map(|joined| joined.to_string_lossy().into_owned())
            .unwrap_or_else(|_| ".".to_string())
    }

    /// A base-engine invocation converting the assembled document to `output`.
    pub fn pandoc(&self, output: &Path) -> Invocation {
        let invocation = Invocation::new(&self.tools.pandoc, self.project_root())
            .arg(self.rel(&self.document()))
            .args(["-o".to_string(), self.rel(output)])
            .output(output);
        if self.verbose {
            invocation.arg("--verbose")
        } else {
            invocation
        }
    }

    /// Metadata flags. `full` adds subtitle and publisher.
    pub fn metadata_args(&self, full: bool) -> Vec<String> {
        let config = &self.config;
        let mut pairs = vec![("title", config.title.as_str())];
        if full {
            if let Some(subtitle) = &config.subtitle {
                pairs.push(("subtitle", subtitle.as_str()));
            }
        }
        pairs.push(("author", config.author.as_str()));
        if full {
            if let Some(publisher) = &config.publisher {
                pairs.push(("publisher", publisher.as_str()));
            }
        }
        pairs.push(("lang", self.language.as_str()));

        pairs
            .into_iter()
            .flat_map(|(k, v)| ["--metadata".to_string(), format!("{k}={v}")])
            .collect()
    }

    pub fn resource_path_args(&self) -> Vec<String> {
        vec![format!("--resource-path={}", self.resource_path())]
    }
}

fn toc_args(toc: bool, depth: u8) -> Vec<String> {
    if toc {
        vec!["--toc".to_string(), format!("--toc-depth={depth}")]
    } else {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Strategy table for one output format.
pub trait FormatGenerator: Send + Sync {
    fn format(&self) -> Format;

    /// Ordered attempts, primary first.
    fn attempts(&self, ctx: &GenerateContext) -> Vec<Attempt>;

    /// Human-readable generator name for tracing.
    fn name(&self) -> &str {
        self.format().as_str()
    }
}

/// Primary attempt from `args`, then the minimal template-free retry.
fn standard_chain(ctx: &GenerateContext, format: Format, args: Vec<String>) -> Vec<Attempt> {
    let output = ctx.output_path(format);

    let primary = ctx
        .pandoc(&output)
        .args(ctx.metadata_args(true))
        .args(ctx.resource_path_args())
        .args(args);

    let mut fallback = ctx
        .pandoc(&output)
        .args(ctx.metadata_args(false))
        .arg("--toc")
        .args(ctx.resource_path_args());
    if format == Format::Html {
        fallback = fallback.arg("--standalone");
    }

    vec![
        Attempt::new(format!("{format} primary"), Tier::Primary, primary),
        Attempt::new(format!("{format} minimal"), Tier::Fallback, fallback),
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds one generator per format.
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn FormatGenerator>>,
}

impl GeneratorRegistry {
    /// Create a registry with all built-in generators.
    pub fn new() -> Self {
        Self {
            generators: vec![
                Box::new(PdfGenerator),
                Box::new(EpubGenerator),
                Box::new(HtmlGenerator),
                Box::new(DocxGenerator),
                Box::new(MobiGenerator),
            ],
        }
    }

    pub fn get(&self, format: Format) -> Option<&dyn FormatGenerator> {
        self.generators
            .iter()
            .find(|g| g.format() == format)
            .map(|g| g.as_ref())
    }

    /// The attempts that will actually run for `format`.
    ///
    /// Only the primary tier is kept when the format's `fallback` setting is off.
    pub fn chain(&self, ctx: &GenerateContext, format: Format) -> Vec<Attempt> {
        let Some(generator) = self.get(format) else {
            return Vec::new();
        };
        let mut attempts = generator.attempts(ctx);
        if !ctx.config.fallback_enabled(format) {
            attempts.retain(|a| a.tier == Tier::Primary);
        }
        debug!(generator = generator.name(), attempts = attempts.len(), "strategy table");
        attempts
    }

    /// Generate `format` for the context's language.
    ///
    /// A missing prerequisite artifact is generated first. Never fails: the
    /// outcome is always reported as a [`BuildResult`].
    #[instrument(skip_all, fields(lang = %ctx.language, %format))]
    pub async fn generate<R: CommandRunner>(
        &self,
        runner: &R,
        ctx: &GenerateContext,
        format: Format,
    ) -> BuildResult {
        let mut notes = Vec::new();

        if let Some(prerequisite) = format.prerequisite() {
            if !ctx.output_path(prerequisite).is_file() {
                info!(%prerequisite, "generating missing prerequisite");
                let attempts = self.chain(ctx, prerequisite);
                let result = run_chain(runner, &ctx.language, prerequisite, &attempts, Vec::new()).await;
                if !result.is_success() {
                    notes.push(format!(
                        "prerequisite {prerequisite} could not be produced:\n{}",
                        result.diagnostics
                    ));
                }
            }
        }

        let attempts = self.chain(ctx, format);
        run_chain(runner, &ctx.language, format, &attempts, notes).await
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::runner::FakeRunner;

    #[test]
    fn metadata_and_resource_path() {
        let project = TempProject::new();
        project.touch("book/images/cover.png");
        let mut config = BookConfig::default();
        config.subtitle = Some("Second Edition".into());

        let ctx = project.context(config);
        let attempts = GeneratorRegistry::new().chain(&ctx, Format::Docx);
        let primary = &attempts[0].invocation;

        assert_eq!(primary.args[0], "build/en/book.md");
        assert!(has_pair(&primary.args, "-o", "build/en/book.docx"));
        assert!(has_pair(&primary.args, "--metadata", "subtitle=Second Edition"));
        assert!(has_pair(&primary.args, "--metadata", "lang=en"));
        assert_eq!(primary.cwd, project.root);

        let expected = std::env::join_paths(["book/images", "book", "."]).unwrap();
        let flag = format!("--resource-path={}", expected.to_string_lossy());
        assert!(primary.args.contains(&flag), "{:?}", primary.args);

        let fallback = &attempts[1].invocation.args;
        assert!(!fallback.iter().any(|a| a.starts_with("subtitle=")));
        assert!(fallback.contains(&"--toc".to_string()));
        assert!(fallback.contains(&flag));
    }

    #[test]
    fn fallback_disabled_keeps_primary_only() {
        let project = TempProject::new();
        let mut config = BookConfig::default();
        config.format_settings.pdf.fallback = false;

        let ctx = project.context(config);
        let attempts = GeneratorRegistry::new().chain(&ctx, Format::Pdf);
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].tier, Tier::Primary);
    }

    #[tokio::test]
    async fn mobi_generates_missing_epub_first() {
        let project = TempProject::new();
        let ctx = project.context(BookConfig::default());
        let runner = FakeRunner::new();

        let result = GeneratorRegistry::new().generate(&runner, &ctx, Format::Mobi).await;
        assert!(result.is_success());
        assert!(!result.fallback);

        let calls = runner.invocations();
        assert_eq!(calls[0].program, "pandoc");
        assert_eq!(calls[0].output.as_deref(), Some(project.root.join("build/en/book.epub").as_path()));
        assert_eq!(calls[1].program, "kindlegen");
    }

    #[tokio::test]
    async fn mobi_substitute_when_both_converters_fail() {
        let project = TempProject::new();
        project.touch("build/en/book.epub");
        let ctx = project.context(BookConfig::default());
        let runner = FakeRunner::new()
            .fail_program("kindlegen")
            .fail_program("ebook-convert");

        let result = GeneratorRegistry::new().generate(&runner, &ctx, Format::Mobi).await;
        assert!(result.is_success());
        assert!(result.fallback);
        assert!(result.degraded);
        assert_eq!(result.output, project.root.join("build/en/book-kindle.epub"));
        assert!(!project.root.join("build/en/book.mobi").exists());
        assert!(result.diagnostics.contains("no real mobi package"));

        let programs: Vec<String> = runner.invocations().into_iter().map(|i| i.program).collect();
        assert_eq!(programs, vec!["kindlegen", "ebook-convert", "pandoc"]);
    }

    #[tokio::test]
    async fn every_tier_failing_reports_failure() {
        let project = TempProject::new();
        let ctx = project.context(BookConfig::default());
        let runner = FakeRunner::new().fail_program("pandoc");

        let result = GeneratorRegistry::new().generate(&runner, &ctx, Format::Html).await;
        assert!(!result.is_success());
        assert!(result.fallback);
        assert_eq!(result.output, project.root.join("build/en/book.html"));
        assert_eq!(runner.invocations().len(), 2);
    }
}
