//! Fragment preparation pipeline.
//!
//! Each pass is a function `&str -> String` applied in sequence before a
//! fragment is concatenated into the assembled document.

use std::sync::LazyLock;

use regex::Regex;

/// Page-break marker understood by the engine's print writers.
pub const PAGE_BREAK: &str = "\\newpage";

/// Run the full preparation pipeline on one raw fragment.
pub(crate) fn run_pipeline(raw: &str) -> String {
    let mut result = strip_bom(raw).to_string();

    result = normalize_line_endings(&result);
    result = strip_front_matter(&result);
    result = clean_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Byte order mark
// ---------------------------------------------------------------------------

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

// ---------------------------------------------------------------------------
// Pass 2: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Front matter
// ---------------------------------------------------------------------------

/// Remove a leading metadata block delimited by `---` lines.
///
/// The block must open on the first non-blank line and be closed by a
/// `---` (or `...`) line. An unclosed opener is a horizontal rule and is
/// left alone.
pub fn strip_front_matter(text: &str) -> String {
    let body = text.trim_start_matches('\n');
    let mut lines = body.split_inclusive('\n');

    let mut consumed = match lines.next() {
        Some(first) if first.trim_end() == "---" => first.len(),
        _ => return text.to_string(),
    };

    for line in lines {
        consumed += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let rest = body.get(consumed..).unwrap_or("");
            return rest.trim_start_matches('\n').to_string();
        }
    }

    text.to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(text, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Trailing newline
// ---------------------------------------------------------------------------

/// Ensure the fragment ends with exactly one newline.
fn ensure_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Page breaks
// ---------------------------------------------------------------------------

/// Whether the fragment already ends with a page-break marker.
pub fn ends_with_page_break(text: &str) -> bool {
    static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?:\\newpage|\\pagebreak|<div style="page-break-after: always;"></div>)\s*$"#)
            .expect("valid regex")
    });

    BREAK_RE.is_match(text)
}

/// Append a page-break marker unless one is already there.
pub fn with_page_break(text: &str) -> String {
    if ends_with_page_break(text) {
        return ensure_trailing_newline(text);
    }
    let trimmed = text.trim_end_matches('\n');
    format!("{trimmed}\n\n{PAGE_BREAK}\n")
}
