//! Markdown fragment handling for bookforge.
//!
//! This crate never interprets markdown semantically. It prepares raw
//! fragment text for concatenation (front matter removal, line ending and
//! blank-line cleanup), knows the naming rules that drive fragment ordering,
//! and renders/parses the metadata header of the assembled document.

mod cleanup;
pub mod header;
pub mod order;

use tracing::trace;

pub use cleanup::{PAGE_BREAK, ends_with_page_break, strip_front_matter, with_page_break};
pub use header::{DocumentMetadata, parse_header, render_header};
pub use order::{
    MARKDOWN_EXTENSIONS, is_chapter_dir_name, is_introduction, is_markdown, natural_cmp,
    sort_fragments,
};

/// Prepare one raw fragment for concatenation.
///
/// Strips a leading `---` metadata block; front matter belongs only to the
/// document header, never to individual fragments.
pub fn prepare_fragment(raw: &str) -> String {
    let prepared = cleanup::run_pipeline(raw);
    trace!(raw_len = raw.len(), prepared_len = prepared.len(), "fragment prepared");
    prepared
}
