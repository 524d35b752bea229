use bookforge_shared::Format;

use super::{FormatGenerator, GenerateContext};
use crate::chain::{Attempt, Tier};
use crate::runner::Invocation;

/// E-ink device package converted from the e-reader package.
///
/// Tiers: `kindlegen`, then `ebook-convert`, then an EPUB2 substitute from the
/// base engine written under its own `-kindle.epub` name.
pub struct MobiGenerator;

impl FormatGenerator for MobiGenerator {
    fn format(&self) -> Format {
        Format::Mobi
    }

    fn attempts(&self, ctx: &GenerateContext) -> Vec<Attempt> {
        let epub = ctx.output_path(Format::Epub);
        let mobi = ctx.output_path(Format::Mobi);
        let compression = ctx.config.format_settings.mobi.compression.min(2);

        // kindlegen writes next to its input and takes a bare file name.
        let mobi_name = format!("{}.{}", ctx.config.file_prefix, Format::Mobi.extension());
        let kindlegen = Invocation::new(&ctx.tools.kindlegen, ctx.project_root())
            .arg(ctx.rel(&epub))
            .arg(format!("-c{compression}"))
            .args(["-o".to_string(), mobi_name])
            .output(&mobi)
            .accept_codes(&[0, 1]);

        let ebook_convert = Invocation::new(&ctx.tools.ebook_convert, ctx.project_root())
            .arg(ctx.rel(&epub))
            .arg(ctx.rel(&mobi))
            .output(&mobi);

        let substitute_path = ctx.sibling(&format!("{}-kindle.epub", ctx.config.file_prefix));
        let substitute = ctx
            .pandoc(&substitute_path)
            .args(["-t", "epub2"])
            .args(ctx.metadata_args(true))
            .args(ctx.resource_path_args());

        vec![
            Attempt::new("kindlegen", Tier::Primary, kindlegen).requires(&epub),
            Attempt::new("ebook-convert", Tier::Fallback, ebook_convert).requires(&epub),
            Attempt::new("epub2 substitute", Tier::Substitute, substitute),
        ]
    }
}
