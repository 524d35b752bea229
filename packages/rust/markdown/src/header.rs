//! Metadata header written at the top of the assembled document.
//!
//! The header is a YAML block the engine reads as document metadata. It is
//! written and read back by hand; only flat `key: value` pairs are used.

/// Document-level metadata carried by the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub publisher: Option<String>,
    pub lang: String,
    pub toc: bool,
    /// Cover image path as the engine should see it.
    pub cover_image: Option<String>,
}

/// Render the header block, including the closing delimiter and a blank line.
pub fn render_header(meta: &DocumentMetadata) -> String {
    let mut fm = String::from("---\n");
    push_field(&mut fm, "title", &meta.title);
    if let Some(subtitle) = &meta.subtitle {
        push_field(&mut fm, "subtitle", subtitle);
    }
    push_field(&mut fm, "author", &meta.author);
    if let Some(publisher) = &meta.publisher {
        push_field(&mut fm, "publisher", publisher);
    }
    push_field(&mut fm, "lang", &meta.lang);
    fm.push_str(&format!("toc: {}\n", meta.toc));
    if let Some(cover) = &meta.cover_image {
        push_field(&mut fm, "cover-image", cover);
    }
    fm.push_str("---\n\n");
    fm
}

fn push_field(fm: &mut String, key: &str, value: &str) {
    fm.push_str(&format!("{key}: \"{}\"\n", escape_yaml_string(value)));
}

/// Parse the header back out of an assembled document.
///
/// Returns `None` when the document does not start with a header block.
pub fn parse_header(document: &str) -> Option<DocumentMetadata> {
    let mut lines = document.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }

    let mut meta = DocumentMetadata::default();
    let mut closed = false;

    for line in lines {
        let line = line.trim_end();
        if line == "---" || line == "..." {
            closed = true;
            break;
        }
        let Some((key, raw)) = line.split_once(':') else {
            continue;
        };
        let value = unquote(raw.trim());
        match key.trim() {
            "title" => meta.title = value,
            "subtitle" => meta.subtitle = Some(value),
            "author" => meta.author = value,
            "publisher" => meta.publisher = Some(value),
            "lang" => meta.lang = value,
            "toc" => meta.toc = value == "true",
            "cover-image" => meta.cover_image = Some(value),
            _ => {}
        }
    }

    closed.then_some(meta)
}

/// Escape special characters in a double-quoted YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some(escaped) => out.push(escaped),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
