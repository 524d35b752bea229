//! Content assembler.
//!
//! Collects the markdown fragments of one language into an ordered
//! [`ContentManifest`], then writes the metadata header and the ordered body
//! to `build/<lang>/<filePrefix>.md`.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use bookforge_markdown::{
    DocumentMetadata, is_chapter_dir_name, is_markdown, natural_cmp, prepare_fragment,
    render_header, sort_fragments, with_page_break,
};
use bookforge_resources::ResourceResolver;
use bookforge_shared::{BookConfig, BookForgeError, Result, layout};

/// Marker file listing fragments in their literal order.
pub const ORDER_FILE: &str = "order.txt";

/// Directory holding appendix fragments.
pub const APPENDICES_DIR: &str = "appendices";

/// Directory holding images next to the fragments.
pub const IMAGES_DIR: &str = "images";

/// Heading of the synthetic section opening the appendices.
pub const APPENDICES_HEADING: &str = "# Appendices\n";

/// Accepted glossary file names, in lookup order.
pub const GLOSSARY_FILES: [&str; 2] = ["glossary.md", "glossary.markdown"];

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Strategy that decided the fragment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    MarkerFile,
    ChapterDirectories,
    Flat,
    Placeholder,
}

impl Structure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkerFile => "marker-file",
            Self::ChapterDirectories => "chapter-directories",
            Self::Flat => "flat",
            Self::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    FrontMatter,
    Chapter,
    Appendix,
    Glossary,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontMatter => "front-matter",
            Self::Chapter => "chapter",
            Self::Appendix => "appendix",
            Self::Glossary => "glossary",
        }
    }
}

/// One fragment of the assembled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Path relative to the language directory, or a synthetic id.
    pub id: String,
    pub kind: SectionKind,
    /// Fragment text with front matter removed.
    pub body: String,
}

/// Ordered sections of one language plus the strategy that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentManifest {
    pub language: String,
    pub structure: Structure,
    pub sections: Vec<Section>,
}

impl ContentManifest {
    /// SHA-256 over the ordered section ids, kinds and bodies.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for section in &self.sections {
            hasher.update(section.id.as_bytes());
            hasher.update([0]);
            hasher.update(section.kind.as_str().as_bytes());
            hasher.update([0]);
            hasher.update(section.body.as_bytes());
            hasher.update([0]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Concatenated section bodies.
    pub fn body(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.body.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Output of assembling one language.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    /// Path of the written intermediate document.
    pub document: PathBuf,
    pub manifest: ContentManifest,
    /// Number of image files copied into `build/<lang>/images`.
    pub images_copied: usize,
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Assemble one language and write its intermediate document.
///
/// Images are prepared before the document is written, so generators that
/// start afterwards see every referenced asset in place.
#[instrument(skip_all, fields(lang = %language))]
pub fn assemble(
    config: &BookConfig,
    language: &str,
    resolver: &ResourceResolver,
) -> Result<AssembleResult> {
    let root = resolver.project_root();
    let build_dir = layout::language_build_dir(root, language);
    std::fs::create_dir_all(&build_dir).map_err(|e| BookForgeError::io(&build_dir, e))?;

    let images_copied = prepare_images(root, language)?;

    let source_dir = layout::language_source_dir(root, language);
    let manifest = collect_manifest(&source_dir, language, &config.title)?;

    let cover = resolver.cover_image(config, language).map(|p| {
        p.strip_prefix(root)
            .unwrap_or(&p)
            .to_string_lossy()
            .into_owned()
    });
    let meta = DocumentMetadata {
        title: config.title.clone(),
        subtitle: config.subtitle.clone(),
        author: config.author.clone(),
        publisher: config.publisher.clone(),
        lang: language.to_string(),
        toc: true,
        cover_image: cover,
    };

    let document = layout::assembled_document(root, language, &config.file_prefix);
    write_atomic(&document, &render_document(&meta, &manifest))?;

    info!(
        structure = %manifest.structure,
        sections = manifest.sections.len(),
        images = images_copied,
        path = %document.display(),
        "document assembled"
    );

    Ok(AssembleResult {
        document,
        manifest,
        images_copied,
    })
}

/// Header followed by the ordered body.
pub fn render_document(meta: &DocumentMetadata, manifest: &ContentManifest) -> String {
    let mut doc = render_header(meta);
    doc.push_str(&manifest.body());
    doc
}

/// Collect the ordered sections of `source_dir`.
///
/// Precedence: marker file, chapter directories, flat listing, placeholder.
/// Appendices and the glossary are appended after the main sequence.
pub fn collect_manifest(source_dir: &Path, language: &str, title: &str) -> Result<ContentManifest> {
    let (structure, mut sections) = if !source_dir.is_dir() {
        warn!(path = %source_dir.display(), "language directory missing");
        (Structure::Placeholder, Vec::new())
    } else if source_dir.join(ORDER_FILE).is_file() {
        (Structure::MarkerFile, marker_sections(source_dir)?)
    } else {
        let chapters = chapter_dirs(source_dir)?;
        if chapters.is_empty() {
            (Structure::Flat, flat_sections(source_dir)?)
        } else {
            (Structure::ChapterDirectories, chapter_sections(source_dir, &chapters)?)
        }
    };

    let structure = if sections.is_empty() {
        warn!(lang = language, "no content fragments found, using placeholder");
        sections.push(Section {
            id: "placeholder".to_string(),
            kind: SectionKind::Chapter,
            body: format!("# {title}\n"),
        });
        Structure::Placeholder
    } else {
        structure
    };

    if source_dir.is_dir() {
        sections.extend(appendix_sections(source_dir)?);
        sections.extend(glossary_section(source_dir)?);
    }

    debug!(lang = language, %structure, sections = sections.len(), "manifest collected");

    Ok(ContentManifest {
        language: language.to_string(),
        structure,
        sections,
    })
}

fn marker_sections(source_dir: &Path) -> Result<Vec<Section>> {
    let marker = source_dir.join(ORDER_FILE);
    let listing = read_text(&marker)?;

    let mut sections = Vec::new();
    for entry in listing.lines().map(str::trim) {
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        let path = source_dir.join(entry);
        if !path.is_file() {
            warn!(entry, "listed fragment not found, skipping");
            continue;
        }
        if is_reserved(source_dir, &path) {
            debug!(entry, "appendix or glossary listed in marker file, appended later");
            continue;
        }
        sections.extend(read_section(source_dir, &path, SectionKind::Chapter)?);
    }
    Ok(sections)
}

fn chapter_sections(source_dir: &Path, chapters: &[PathBuf]) -> Result<Vec<Section>> {
    let mut sections = Vec::new();

    for path in top_level_fragments(source_dir)? {
        sections.extend(read_section(source_dir, &path, SectionKind::FrontMatter)?);
    }

    for dir in chapters {
        let mut fragments = markdown_files(dir)?;
        sort_fragments(&mut fragments);
        for path in fragments {
            sections.extend(read_section(source_dir, &path, SectionKind::Chapter)?);
        }
    }
    Ok(sections)
}

fn flat_sections(source_dir: &Path) -> Result<Vec<Section>> {
    let mut sections = Vec::new();
    for path in top_level_fragments(source_dir)? {
        sections.extend(read_section(source_dir, &path, SectionKind::Chapter)?);
    }
    Ok(sections)
}

fn appendix_sections(source_dir: &Path) -> Result<Vec<Section>> {
    let dir = source_dir.join(APPENDICES_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut fragments = markdown_files(&dir)?;
    sort_fragments(&mut fragments);

    let mut sections = Vec::new();
    for path in fragments {
        if let Some(mut section) = read_section(source_dir, &path, SectionKind::Appendix)? {
            section.body = with_page_break(&section.body);
            sections.push(section);
        }
    }
    if !sections.is_empty() {
        sections.insert(
            0,
            Section {
                id: APPENDICES_DIR.to_string(),
                kind: SectionKind::Appendix,
                body: APPENDICES_HEADING.to_string(),
            },
        );
    }
    Ok(sections)
}

fn glossary_section(source_dir: &Path) -> Result<Option<Section>> {
    let Some(path) = glossary_path(source_dir) else {
        return Ok(None);
    };
    Ok(read_section(source_dir, &path, SectionKind::Glossary)?.map(|mut s| {
        s.body = with_page_break(&s.body);
        s
    }))
}

fn glossary_path(source_dir: &Path) -> Option<PathBuf> {
    GLOSSARY_FILES
        .iter()
        .map(|name| source_dir.join(name))
        .find(|p| p.is_file())
}

/// Whether `path` belongs to the appended sections rather than the main sequence.
fn is_reserved(source_dir: &Path, path: &Path) -> bool {
    path.starts_with(source_dir.join(APPENDICES_DIR))
        || path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| GLOSSARY_FILES.iter().any(|g| g.eq_ignore_ascii_case(n)))
}

/// Markdown files directly in `source_dir`, glossary excluded, numeric-aware order.
fn top_level_fragments(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = markdown_files(source_dir)?
        .into_iter()
        .filter(|p| !is_reserved(source_dir, p))
        .collect();
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(files)
}

/// Subdirectories following the chapter naming convention, numeric-aware order.
fn chapter_dirs(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = read_dir(source_dir)?
        .into_iter()
        .filter(|p| p.is_dir() && is_chapter_dir_name(&file_name(p)))
        .collect();
    dirs.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(dirs)
}

fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(read_dir(dir)?
        .into_iter()
        .filter(|p| p.is_file() && is_markdown(p))
        .collect())
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| BookForgeError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BookForgeError::io(dir, e))?;
        paths.push(entry.path());
    }
    Ok(paths)
}

/// Read a text file, replacing invalid UTF-8 sequences.
fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| BookForgeError::io(path, e))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(path = %path.display(), "file is not valid UTF-8, invalid bytes replaced");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Read and clean one fragment. Blank fragments yield `None`.
fn read_section(source_dir: &Path, path: &Path, kind: SectionKind) -> Result<Option<Section>> {
    let raw = read_text(path)?;
    let body = prepare_fragment(&raw);
    let id = relative_id(source_dir, path);

    if body.trim().is_empty() {
        debug!(fragment = %id, "empty fragment skipped");
        return Ok(None);
    }

    debug!(fragment = %id, kind = kind.as_str(), bytes = body.len(), "fragment added");
    Ok(Some(Section { id, kind, body }))
}

fn relative_id(source_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(source_dir).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Copy `book/images` and then `book/<lang>/images` into `build/<lang>/images`.
///
/// Language-specific files overwrite shared ones with the same name.
pub fn prepare_images(project_root: &Path, language: &str) -> Result<usize> {
    let target = layout::language_build_dir(project_root, language).join(IMAGES_DIR);
    let sources = [
        project_root.join(layout::BOOK_DIR).join(IMAGES_DIR),
        layout::language_source_dir(project_root, language).join(IMAGES_DIR),
    ];

    let mut copied = 0;
    for source in sources.iter().filter(|s| s.is_dir()) {
        copied += copy_tree(source, &target)?;
    }
    if copied > 0 {
        debug!(count = copied, target = %target.display(), "images prepared");
    }
    Ok(copied)
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    std::fs::create_dir_all(to).map_err(|e| BookForgeError::io(to, e))?;

    let mut copied = 0;
    for path in read_dir(from)? {
        let dest = to.join(file_name(&path));
        if path.is_dir() {
            copied += copy_tree(&path, &dest)?;
        } else if path.is_file() {
            std::fs::copy(&path, &dest).map_err(|e| BookForgeError::io(&dest, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp = path.with_file_name(format!(".{}.tmp", file_name(path)));
    std::fs::write(&temp, content).map_err(|e| BookForgeError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| BookForgeError::io(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bookforge_markdown::parse_header;

    use super::*;

    struct TempProject {
        root: PathBuf,
    }

    impl TempProject {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("bf-assembler-test-{}", uuid::Uuid::now_v7()));
            std::fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn manifest(&self, lang: &str) -> ContentManifest {
            collect_manifest(&self.root.join("book").join(lang), lang, "Test Book").unwrap()
        }
    }

    impl Drop for TempProject {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    fn ids(manifest: &ContentManifest) -> Vec<&str> {
        manifest.sections.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn chapter_directories_in_order() {
        let p = TempProject::new();
        p.write("book/en/chapter-02/00-introduction.md", "# Two\n");
        p.write("book/en/chapter-01/01-section.md", "## Section\n");
        p.write("book/en/chapter-01/00-introduction.md", "# One\n");

        let manifest = p.manifest("en");
        assert_eq!(manifest.structure, Structure::ChapterDirectories);
        assert_eq!(
            ids(&manifest),
            vec![
                "chapter-01/00-introduction.md",
                "chapter-01/01-section.md",
                "chapter-02/00-introduction.md",
            ]
        );
    }

    #[test]
    fn chapter_numbers_compare_by_value() {
        let p = TempProject::new();
        p.write("book/en/chapter-10/a.md", "ten\n");
        p.write("book/en/chapter-2/a.md", "two\n");
        p.write("book/en/preface.md", "preface\n");

        let manifest = p.manifest("en");
        assert_eq!(ids(&manifest), vec!["preface.md", "chapter-2/a.md", "chapter-10/a.md"]);
        assert_eq!(manifest.sections[0].kind, SectionKind::FrontMatter);
    }

    #[test]
    fn marker_file_wins() {
        let p = TempProject::new();
        p.write("book/en/chapter-01/a.md", "a\n");
        p.write("book/en/b.md", "b\n");
        p.write("book/en/order.txt", "# custom order\nb.md\n\nmissing.md\nchapter-01/a.md\n");

        let manifest = p.manifest("en");
        assert_eq!(manifest.structure, Structure::MarkerFile);
        assert_eq!(ids(&manifest), vec!["b.md", "chapter-01/a.md"]);
    }

    #[test]
    fn flat_listing_with_appendices_and_glossary() {
        let p = TempProject::new();
        p.write("book/en/10-end.md", "end\n");
        p.write("book/en/2-middle.md", "---\ntitle: x\n---\nmiddle\n");
        p.write("book/en/glossary.md", "# Glossary\n");
        p.write("book/en/appendices/b.md", "# B\n");
        p.write("book/en/appendices/a.md", "# A\n\n\\newpage\n");

        let manifest = p.manifest("en");
        assert_eq!(manifest.structure, Structure::Flat);
        assert_eq!(
            ids(&manifest),
            vec![
                "2-middle.md",
                "10-end.md",
                "appendices",
                "appendices/a.md",
                "appendices/b.md",
                "glossary.md"
            ]
        );
        assert_eq!(manifest.sections[0].body, "middle\n");
        assert_eq!(manifest.sections[2].body, APPENDICES_HEADING);
        assert_eq!(manifest.sections[3].body, "# A\n\n\\newpage\n");
        assert_eq!(manifest.sections[4].body, "# B\n\n\\newpage\n");
        assert_eq!(manifest.sections[5].kind, SectionKind::Glossary);
        assert!(manifest.sections[5].body.ends_with("\\newpage\n"));
    }

    #[test]
    fn appendices_heading_precedes_first_appendix() {
        let p = TempProject::new();
        p.write("book/en/01-a.md", "# A\n");
        p.write("book/en/appendices/x.md", "Some appendix text\n");

        let body = p.manifest("en").body();
        let heading = body.find("# Appendices").unwrap();
        let appendix = body.find("Some appendix text").unwrap();
        assert!(heading < appendix);
        assert!(body.find("# A\n").unwrap() < heading);
    }

    #[test]
    fn no_appendices_heading_without_fragments() {
        let p = TempProject::new();
        p.write("book/en/01-a.md", "# A\n");
        p.write("book/en/appendices/empty.md", "\n\n");

        let manifest = p.manifest("en");
        assert_eq!(ids(&manifest), vec!["01-a.md"]);
    }

    #[test]
    fn non_utf8_fragment_is_decoded_lossily() {
        let p = TempProject::new();
        p.write("book/en/01-intro.md", "# Intro\n");
        let latin1 = p.root.join("book/en/02-latin1.md");
        std::fs::write(&latin1, b"caf\xe9 au lait\n").unwrap();

        let manifest = p.manifest("en");
        assert_eq!(ids(&manifest), vec!["01-intro.md", "02-latin1.md"]);
        assert_eq!(manifest.sections[1].body, "caf\u{fffd} au lait\n");
    }

    #[test]
    fn placeholder_when_no_fragments() {
        let p = TempProject::new();
        let manifest = p.manifest("fr");
        assert_eq!(manifest.structure, Structure::Placeholder);
        assert_eq!(manifest.sections.len(), 1);
        assert_eq!(manifest.sections[0].body, "# Test Book\n");

        p.write("book/de/glossary.md", "# Glossar\n");
        let manifest = p.manifest("de");
        assert_eq!(manifest.structure, Structure::Placeholder);
        assert_eq!(ids(&manifest), vec!["placeholder", "glossary.md"]);
    }

    #[test]
    fn assembling_twice_is_identical() {
        let p = TempProject::new();
        p.write("book/en/chapter-01/intro.md", "# One\n");
        p.write("book/en/chapter-01/details.md", "Details\n");

        let first = p.manifest("en");
        let second = p.manifest("en");
        assert_eq!(first.sections, second.sections);
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().len(), 64);
    }

    #[test]
    fn assemble_writes_document_with_header() {
        let p = TempProject::new();
        p.write("book/es/01-uno.md", "# Uno\n");
        p.write("book/images/cover.png", "png");
        p.write("book/images/diagram.png", "shared");
        p.write("book/es/images/diagram.png", "localized");

        let config = BookConfig {
            title: "Libro".into(),
            author: "Ana".into(),
            languages: vec!["es".into()],
            ..Default::default()
        };
        let resolver = ResourceResolver::new(&p.root);
        let result = assemble(&config, "es", &resolver).unwrap();

        assert_eq!(result.document, p.root.join("build/es/book.md"));
        assert_eq!(result.images_copied, 3);
        let localized = std::fs::read_to_string(p.root.join("build/es/images/diagram.png")).unwrap();
        assert_eq!(localized, "localized");

        let text = std::fs::read_to_string(&result.document).unwrap();
        let meta = parse_header(&text).unwrap();
        assert_eq!(meta.title, "Libro");
        assert_eq!(meta.author, "Ana");
        assert_eq!(meta.lang, "es");
        assert_eq!(meta.cover_image.as_deref(), Some("book/images/cover.png"));
        assert!(text.ends_with("# Uno\n"));
    }
}
