//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use bookforge_core::pipeline::{BuildRequest, ProgressReporter};
use bookforge_formats::{ProcessRunner, probe_version};
use bookforge_resources::{ResourceResolver, default_bundled_root};
use bookforge_shared::normalize::{is_legacy, normalize};
use bookforge_shared::{
    BookConfig, BuildOptions, BuildReport, BuildResult, CONFIG_FILE_NAMES, Format, ToolPaths,
    find_config_file, layout, load_config, read_raw_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bookforge: build books in several formats from markdown fragments.
#[derive(Parser)]
#[command(
    name = "bookforge",
    version,
    about = "Build PDF, EPUB, HTML, DOCX and MOBI books from per-language markdown fragments.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project root directory.
    #[arg(short, long, default_value = ".", global = true)]
    pub project: PathBuf,

    /// Configuration file (defaults to book.toml, book.json or config.json in the project).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Assemble and convert the book into every enabled format.
    Build(BuildArgs),

    /// Only assemble the intermediate markdown document.
    Assemble {
        /// Language to assemble (repeatable). Defaults to the first configured language.
        #[arg(short, long = "lang")]
        languages: Vec<String>,

        /// Assemble every configured language.
        #[arg(long)]
        all_languages: bool,
    },

    /// Report which external tools are available.
    Check {
        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Remove the build directory.
    Clean,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Language to build (repeatable). Defaults to the first configured language.
    #[arg(short, long = "lang")]
    pub languages: Vec<String>,

    /// Build every configured language.
    #[arg(long)]
    pub all_languages: bool,

    /// Formats to skip (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<Format>,

    /// Concurrent format generations per language.
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Time budget for each external tool invocation, in seconds.
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,

    #[command(flatten)]
    pub tools: ToolArgs,
}

/// External tool locations.
#[derive(Args)]
pub(crate) struct ToolArgs {
    /// Base conversion engine.
    #[arg(long, env = "BOOKFORGE_PANDOC", default_value = "pandoc")]
    pub pandoc: String,

    /// Device package converter.
    #[arg(long, env = "BOOKFORGE_KINDLEGEN", default_value = "kindlegen")]
    pub kindlegen: String,

    /// Alternative device package converter.
    #[arg(long, env = "BOOKFORGE_EBOOK_CONVERT", default_value = "ebook-convert")]
    pub ebook_convert: String,
}

impl From<ToolArgs> for ToolPaths {
    fn from(args: ToolArgs) -> Self {
        Self {
            pandoc: args.pandoc,
            kindlegen: args.kindlegen,
            ebook_convert: args.ebook_convert,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show the normalized configuration.
    Show,
    /// Print the normalized form of a legacy configuration.
    Migrate {
        /// Write the result to book.toml instead of printing it.
        #[arg(long)]
        write: bool,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bookforge=info",
        1 => "bookforge=debug",
        _ => "bookforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let project = cli.project;
    let config_path = cli.config;
    let verbose = cli.verbose > 0;

    match cli.command {
        Command::Build(args) => cmd_build(&project, config_path.as_deref(), args, verbose).await,
        Command::Assemble {
            languages,
            all_languages,
        } => cmd_assemble(&project, config_path.as_deref(), languages, all_languages),
        Command::Check { tools } => cmd_check(tools.into()).await,
        Command::Clean => cmd_clean(&project),
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&project, config_path.as_deref()),
            ConfigAction::Migrate { write } => {
                cmd_config_migrate(&project, config_path.as_deref(), write)
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    project: &Path,
    config_path: Option<&Path>,
    args: BuildArgs,
    verbose: bool,
) -> Result<()> {
    let config = load_config(project, config_path);

    let options = BuildOptions {
        languages: args.languages,
        all_languages: args.all_languages,
        skip: args.skip.into_iter().collect(),
        verbose,
        jobs: args.jobs.max(1),
        timeout: Duration::from_secs(args.timeout),
        tools: args.tools.into(),
    };

    info!(
        project = %project.display(),
        title = %config.title,
        "building book"
    );

    let request = BuildRequest {
        project_root: project.to_path_buf(),
        config,
        options: options.clone(),
        bundled_root: default_bundled_root(),
    };
    let runner = Arc::new(ProcessRunner::new(options.timeout));
    let reporter = CliProgress::new();

    let report = bookforge_core::pipeline::build(request, runner, &reporter).await?;

    print_report(&report);

    if !report.any_success() {
        return Err(eyre!("no artifacts were produced"));
    }
    Ok(())
}

fn cmd_assemble(
    project: &Path,
    config_path: Option<&Path>,
    languages: Vec<String>,
    all_languages: bool,
) -> Result<()> {
    if !project.is_dir() {
        return Err(eyre!("project root {} does not exist", project.display()));
    }
    let config = load_config(project, config_path);
    let options = BuildOptions {
        languages,
        all_languages,
        ..Default::default()
    };
    let resolver = ResourceResolver::new(project).with_bundled_root(default_bundled_root());

    println!();
    for language in options.target_languages(&config) {
        let result = bookforge_core::assemble(&config, &language, &resolver)
            .wrap_err_with(|| format!("assembling {language}"))?;
        println!("  Language:  {language}");
        println!("  Structure: {}", result.manifest.structure);
        println!("  Sections:  {}", result.manifest.sections.len());
        println!("  Images:    {}", result.images_copied);
        println!("  Digest:    {}", result.manifest.digest());
        println!("  Path:      {}", result.document.display());
        println!();
    }
    Ok(())
}

async fn cmd_check(tools: ToolPaths) -> Result<()> {
    let runner = ProcessRunner::new(Duration::from_secs(15));
    let mut pandoc_found = false;

    println!();
    for (role, program) in [
        ("engine", &tools.pandoc),
        ("device converter", &tools.kindlegen),
        ("device converter", &tools.ebook_convert),
    ] {
        match probe_version(&runner, program).await {
            Some(version) => {
                pandoc_found |= role == "engine";
                println!("  ok       {program:<16} {version}");
            }
            None => println!("  missing  {program:<16} ({role})"),
        }
    }
    println!();

    if !pandoc_found {
        return Err(eyre!("`{}` is required for every format", tools.pandoc));
    }
    Ok(())
}

fn cmd_clean(project: &Path) -> Result<()> {
    let build_dir = layout::build_dir(project);
    if !build_dir.exists() {
        println!("Nothing to clean.");
        return Ok(());
    }
    std::fs::remove_dir_all(&build_dir)
        .wrap_err_with(|| format!("removing {}", build_dir.display()))?;
    println!("Removed {}", build_dir.display());
    Ok(())
}

fn cmd_config_show(project: &Path, config_path: Option<&Path>) -> Result<()> {
    let config: BookConfig = load_config(project, config_path);
    let toml_str = config.to_toml_string()?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_migrate(project: &Path, config_path: Option<&Path>, write: bool) -> Result<()> {
    let source = match config_path {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => project.join(path),
        None => find_config_file(project).ok_or_else(|| {
            eyre!(
                "no configuration file found in {} (looked for {})",
                project.display(),
                CONFIG_FILE_NAMES.join(", ")
            )
        })?,
    };

    let raw = read_raw_config(&source)?;
    if !is_legacy(&raw) {
        info!(path = %source.display(), "configuration already uses the current schema");
    }
    let toml_str = normalize(raw).to_toml_string()?;

    if write {
        let target = project.join("book.toml");
        std::fs::write(&target, &toml_str)
            .wrap_err_with(|| format!("writing {}", target.display()))?;
        if source.file_name() != target.file_name() {
            warn!(
                legacy = %source.display(),
                "book.toml now takes precedence; the legacy file can be removed"
            );
        }
        println!("Wrote {}", target.display());
    } else {
        println!("{toml_str}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Report output
// ---------------------------------------------------------------------------

fn print_report(report: &BuildReport) {
    println!();
    for result in &report.results {
        println!("  {}", describe(result));
    }
    println!();
    println!(
        "  {} succeeded, {} failed ({:.1}s)",
        report.succeeded(),
        report.failed(),
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
    println!();
}

fn describe(result: &BuildResult) -> String {
    let status = if result.is_success() { "ok  " } else { "FAIL" };
    let note = match (result.is_success(), result.degraded, result.fallback) {
        (true, true, _) => " (substitute)",
        (true, false, true) => " (fallback)",
        _ => "",
    };
    let mut line = format!(
        "{status} {:<3} {:<5} {}{note}",
        result.language,
        result.format.as_str(),
        result.output.display()
    );
    if !result.is_success() {
        if let Some(reason) = result.diagnostics.lines().last() {
            line.push_str(&format!("\n         {reason}"));
        }
    }
    line
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_started(&self, language: &str, format: Format) {
        self.spinner.set_message(format!("Generating {format} [{language}]"));
    }

    fn task_finished(&self, result: &BuildResult) {
        let outcome = if result.is_success() { "done" } else { "failed" };
        self.spinner.set_message(format!(
            "{} [{}] {outcome} in {:.1}s",
            result.format,
            result.language,
            result.elapsed.as_secs_f64()
        ));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
