//! Fragment naming rules and numeric-aware ordering.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// File extensions treated as markdown fragments.
pub const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// Compare two names so that embedded numbers sort by value.
///
/// `chapter-2` < `chapter-10`, `01-a` < `1-b`. Ties on value fall back to a
/// plain byte comparison so the order is total and deterministic.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_chunks(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_chunks(x: &str, y: &str) -> Ordering {
    let x_num = x.starts_with(|c: char| c.is_ascii_digit());
    let y_num = y.starts_with(|c: char| c.is_ascii_digit());

    match (x_num, y_num) {
        (true, true) => {
            let x = x.trim_start_matches('0');
            let y = y.trim_start_matches('0');
            x.len().cmp(&y.len()).then_with(|| x.cmp(y))
        }
        // Numbers sort before words at the same position.
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(y.chars().flat_map(char::to_lowercase)),
    }
}

/// Splits a name into alternating runs of ASCII digits and non-digits.
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

/// Whether a directory name follows the chapter convention
/// (`chapter-<n>`, `chapter_<n>`, `chapter<n>`, `<n>-<name>`, `<n>_<name>`, `<n>`).
pub fn is_chapter_dir_name(name: &str) -> bool {
    static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:chapter[-_]?\d+(?:[-_].*)?|\d+(?:[-_].+)?)$").expect("valid regex")
    });

    CHAPTER_RE.is_match(name)
}

/// Whether a fragment file is a chapter introduction
/// (`intro.md`, `introduction.md`, `00-introduction.md`, ...).
pub fn is_introduction(path: &Path) -> bool {
    static INTRO_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:\d+[-_])?intro(?:duction)?$").expect("valid regex")
    });

    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| INTRO_RE.is_match(stem))
}

/// Whether `path` has a markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|m| m.eq_ignore_ascii_case(ext))
        })
}

/// Sort fragment paths numeric-aware by file name, introductions first.
pub fn sort_fragments(paths: &mut [std::path::PathBuf]) {
    paths.sort_by(|a, b| {
        is_introduction(b)
            .cmp(&is_introduction(a))
            .then_with(|| natural_cmp(&file_name(a), &file_name(b)))
    });
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
