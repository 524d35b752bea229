//! End-to-end `build` pipeline: config → per language: assemble → generate → report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bookforge_formats::{CommandRunner, GenerateContext, GeneratorRegistry};
use bookforge_resources::ResourceResolver;
use bookforge_shared::{
    BookConfig, BookForgeError, BuildOptions, BuildReport, BuildResult, BuildStatus, Format,
    REPORT_FILE_NAME, Result, layout,
};

use crate::assembler;

/// Inputs of one build run.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub project_root: PathBuf,
    /// Normalized configuration.
    pub config: BookConfig,
    pub options: BuildOptions,
    /// Location of bundled templates and assets, if any.
    pub bundled_root: Option<PathBuf>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a format generation is queued.
    fn task_started(&self, language: &str, format: Format);
    /// Called when a format generation has a result.
    fn task_finished(&self, result: &BuildResult);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn task_started(&self, _language: &str, _format: Format) {}
    fn task_finished(&self, _result: &BuildResult) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Run the full `build` pipeline.
///
/// 1. Resolve target languages and formats
/// 2. Per language: assemble the document and prepare images
/// 3. Per language: generate independent formats, then dependent ones
/// 4. Write `build/build-report.json`
///
/// Only a missing project root or an uncreatable build directory is an
/// error; every other failure ends up as a failed [`BuildResult`].
#[instrument(skip_all, fields(project = %request.project_root.display()))]
pub async fn build<R: CommandRunner + 'static>(
    request: BuildRequest,
    runner: Arc<R>,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let started_at = Utc::now();
    let run_id = Uuid::now_v7();

    let project_root = canonical_root(&request.project_root)?;
    let build_dir = layout::build_dir(&project_root);
    std::fs::create_dir_all(&build_dir).map_err(|e| BookForgeError::io(&build_dir, e))?;

    let options = request.options;
    let config = Arc::new(request.config);
    let resolver = Arc::new(
        ResourceResolver::new(&project_root).with_bundled_root(request.bundled_root),
    );
    let tools = Arc::new(options.tools.clone());
    let registry = Arc::new(GeneratorRegistry::new());

    let languages = options.target_languages(&config);
    let formats = options.target_formats(&config);
    info!(%run_id, ?languages, ?formats, jobs = options.jobs, "starting build");

    let mut results = Vec::with_capacity(languages.len() * formats.len());

    for language in &languages {
        progress.phase(&format!("Assembling {language}"));
        if let Err(e) = assembler::assemble(&config, language, &resolver) {
            warn!(lang = %language, error = %e, "assembly failed");
            for &format in &formats {
                let result = failed_result(
                    &project_root,
                    &config,
                    language,
                    format,
                    format!("assembly failed: {e}"),
                );
                progress.task_finished(&result);
                results.push(result);
            }
            continue;
        }

        if formats.is_empty() {
            continue;
        }

        progress.phase(&format!("Generating {language}"));
        let ctx = GenerateContext::new(
            Arc::clone(&config),
            language.clone(),
            Arc::clone(&resolver),
            Arc::clone(&tools),
        )
        .with_verbose(options.verbose);

        let (independent, dependent): (Vec<Format>, Vec<Format>) =
            formats.iter().partition(|f| f.prerequisite().is_none());

        for batch in [independent, dependent] {
            let batch_results =
                generate_batch(&runner, &registry, &ctx, &batch, options.jobs, progress).await;
            results.extend(batch_results);
        }
    }

    results.sort_by_key(|r| {
        let lang_index = languages.iter().position(|l| *l == r.language).unwrap_or(usize::MAX);
        (lang_index, r.format)
    });

    let report = BuildReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        results,
    };

    match write_report(&project_root, &report) {
        Ok(path) => info!(path = %path.display(), "report written"),
        Err(e) => warn!(error = %e, "could not write build report"),
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "build complete"
    );
    progress.done(&report);

    Ok(report)
}

/// Generate `formats` for one language on a bounded worker pool.
async fn generate_batch<R: CommandRunner + 'static>(
    runner: &Arc<R>,
    registry: &Arc<GeneratorRegistry>,
    ctx: &GenerateContext,
    formats: &[Format],
    jobs: usize,
    progress: &dyn ProgressReporter,
) -> Vec<BuildResult> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut set = JoinSet::new();

    for &format in formats {
        let runner = Arc::clone(runner);
        let registry = Arc::clone(registry);
        let semaphore = Arc::clone(&semaphore);
        let ctx = ctx.clone();

        progress.task_started(&ctx.language, format);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            registry.generate(runner.as_ref(), &ctx, format).await
        });
    }

    let mut results = Vec::with_capacity(formats.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => {
                progress.task_finished(&result);
                results.push(result);
            }
            Err(e) => warn!(lang = %ctx.language, error = %e, "generator task aborted"),
        }
    }

    // A panicked task leaves no result; report its format as failed.
    for &format in formats {
        if !results.iter().any(|r| r.format == format) {
            let result = failed_result(
                ctx.project_root(),
                &ctx.config,
                &ctx.language,
                format,
                "generator task aborted".to_string(),
            );
            progress.task_finished(&result);
            results.push(result);
        }
    }
    results
}

fn failed_result(
    project_root: &Path,
    config: &BookConfig,
    language: &str,
    format: Format,
    diagnostics: String,
) -> BuildResult {
    BuildResult {
        language: language.to_string(),
        format,
        status: BuildStatus::Failed,
        output: layout::artifact_path(project_root, language, &config.file_prefix, format),
        invocation: String::new(),
        fallback: false,
        degraded: false,
        diagnostics,
        elapsed: Duration::ZERO,
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(BookForgeError::validation(format!(
            "project root {} does not exist or is not a directory",
            root.display()
        )));
    }
    root.canonicalize().map_err(|e| BookForgeError::io(root, e))
}

/// Write the report as pretty JSON to `build/build-report.json`.
pub fn write_report(project_root: &Path, report: &BuildReport) -> Result<PathBuf> {
    let path = layout::build_dir(project_root).join(REPORT_FILE_NAME);
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| BookForgeError::validation(format!("JSON serialization failed: {e}")))?;
    std::fs::write(&path, json).map_err(|e| BookForgeError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use bookforge_formats::FakeRunner;

    use super::*;

    struct TempProject {
        root: PathBuf,
    }

    impl TempProject {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("bf-pipeline-test-{}", uuid::Uuid::now_v7()));
            std::fs::create_dir_all(&root).unwrap();
            let p = Self { root };
            for lang in ["en", "es"] {
                p.write(&format!("book/{lang}/chapter-01/00-introduction.md"), "# One\n");
                p.write(&format!("book/{lang}/chapter-02/00-introduction.md"), "# Two\n");
            }
            p
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn request(&self, config: BookConfig, options: BuildOptions) -> BuildRequest {
            BuildRequest {
                project_root: self.root.clone(),
                config,
                options,
                bundled_root: None,
            }
        }
    }

    impl Drop for TempProject {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn bilingual() -> BookConfig {
        BookConfig {
            languages: vec!["en".into(), "es".into()],
            ..Default::default()
        }
    }

    fn output_ext(invocation: &bookforge_formats::Invocation) -> String {
        invocation
            .output
            .as_ref()
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn builds_every_enabled_format() {
        let p = TempProject::new();
        let runner = Arc::new(FakeRunner::new());

        let report = build(p.request(bilingual(), BuildOptions::default()), runner, &SilentProgress)
            .await
            .unwrap();

        let formats: Vec<Format> = report.results.iter().map(|r| r.format).collect();
        assert_eq!(formats, Format::ALL.to_vec());
        assert!(report.results.iter().all(|r| r.language == "en" && r.is_success()));
        assert!(p.root.join("build/en/book.md").is_file());
        assert!(!p.root.join("build/es").exists());

        let json = std::fs::read_to_string(p.root.join("build/build-report.json")).unwrap();
        let parsed: BuildReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.results.len(), 5);
    }

    #[tokio::test]
    async fn disabled_format_is_never_invoked() {
        let p = TempProject::new();
        let mut config = bilingual();
        config.formats.pdf = false;
        let options = BuildOptions {
            all_languages: true,
            jobs: 3,
            ..Default::default()
        };
        let runner = Arc::new(FakeRunner::new());

        let report = build(p.request(config, options), Arc::clone(&runner), &SilentProgress)
            .await
            .unwrap();

        assert!(runner.invocations().iter().all(|inv| output_ext(inv) != "pdf"));
        assert_eq!(report.results.len(), 8);
        assert!(report.get("en", Format::Pdf).is_none());
        assert!(report.get("es", Format::Pdf).is_none());
        let langs: Vec<&str> = report.results.iter().map(|r| r.language.as_str()).collect();
        assert_eq!(langs, vec!["en", "en", "en", "en", "es", "es", "es", "es"]);
    }

    #[tokio::test]
    async fn device_package_falls_back_to_substitute() {
        let p = TempProject::new();
        let runner = Arc::new(
            FakeRunner::new()
                .fail_program("kindlegen")
                .fail_program("ebook-convert"),
        );
        let options = BuildOptions {
            languages: vec!["es".into()],
            ..Default::default()
        };

        let report = build(p.request(bilingual(), options), runner, &SilentProgress)
            .await
            .unwrap();

        assert!(report.get("es", Format::Epub).unwrap().is_success());
        let mobi = report.get("es", Format::Mobi).unwrap();
        assert!(mobi.is_success());
        assert!(mobi.fallback);
        assert!(mobi.degraded);
        assert!(mobi.output.ends_with("build/es/book-kindle.epub"));
    }

    #[tokio::test]
    async fn one_failing_format_does_not_stop_the_others() {
        let p = TempProject::new();
        let runner = Arc::new(FakeRunner::new().fail_when(|inv| output_ext(inv) == "pdf"));

        let report = build(p.request(bilingual(), BuildOptions::default()), runner, &SilentProgress)
            .await
            .unwrap();

        let pdf = report.get("en", Format::Pdf).unwrap();
        assert_eq!(pdf.status, BuildStatus::Failed);
        assert!(pdf.fallback);
        assert_eq!(report.succeeded(), 4);
        assert!(report.any_success());
    }

    #[tokio::test]
    async fn skipped_formats_are_not_reported() {
        let p = TempProject::new();
        let options = BuildOptions {
            skip: [Format::Mobi, Format::Docx].into_iter().collect(),
            ..Default::default()
        };

        let report = build(p.request(bilingual(), options), Arc::new(FakeRunner::new()), &SilentProgress)
            .await
            .unwrap();

        let formats: Vec<Format> = report.results.iter().map(|r| r.format).collect();
        assert_eq!(formats, vec![Format::Pdf, Format::Epub, Format::Html]);
    }

    #[tokio::test]
    async fn non_utf8_fragment_still_builds_every_format() {
        let p = TempProject::new();
        std::fs::write(p.root.join("book/es/chapter-01/latin1.md"), b"caf\xe9 au lait\n").unwrap();
        let options = BuildOptions {
            all_languages: true,
            ..Default::default()
        };

        let report = build(p.request(bilingual(), options), Arc::new(FakeRunner::new()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 10);
        let document = std::fs::read_to_string(p.root.join("build/es/book.md")).unwrap();
        assert!(document.contains("caf\u{fffd} au lait"));
    }

    #[tokio::test]
    async fn assembly_failure_marks_language_failed() {
        let p = TempProject::new();
        // A file where the language build directory belongs.
        p.write("build/es", "not a directory");
        let options = BuildOptions {
            all_languages: true,
            ..Default::default()
        };

        let report = build(p.request(bilingual(), options), Arc::new(FakeRunner::new()), &SilentProgress)
            .await
            .unwrap();

        assert!(report.results.iter().filter(|r| r.language == "en").all(|r| r.is_success()));
        let es: Vec<&BuildResult> = report.results.iter().filter(|r| r.language == "es").collect();
        assert_eq!(es.len(), 5);
        assert!(es.iter().all(|r| !r.is_success() && r.diagnostics.starts_with("assembly failed")));
    }

    #[tokio::test]
    async fn missing_project_root_is_an_error() {
        let request = BuildRequest {
            project_root: std::env::temp_dir().join(format!("bf-missing-{}", uuid::Uuid::now_v7())),
            config: BookConfig::default(),
            options: BuildOptions::default(),
            bundled_root: None,
        };
        let err = build(request, Arc::new(FakeRunner::new()), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, BookForgeError::Validation { .. }));
    }
}
