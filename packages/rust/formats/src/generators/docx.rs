use bookforge_shared::Format;

use super::{FormatGenerator, GenerateContext, standard_chain, toc_args};
use crate::chain::Attempt;

/// Word-processor document.
pub struct DocxGenerator;

impl FormatGenerator for DocxGenerator {
    fn format(&self) -> Format {
        Format::Docx
    }

    fn attempts(&self, ctx: &GenerateContext) -> Vec<Attempt> {
        let s = &ctx.config.format_settings.docx;
        let mut args = Vec::new();

        if let Some(reference) = ctx.resolver.reference_doc(&ctx.config, &ctx.language) {
            args.push(format!("--reference-doc={}", ctx.rel(&reference)));
        }
        args.extend(toc_args(s.toc, s.toc_depth));

        standard_chain(ctx, Format::Docx, args)
    }
}
