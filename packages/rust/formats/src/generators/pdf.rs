use bookforge_shared::Format;

use super::{FormatGenerator, GenerateContext, standard_chain, toc_args};
use crate::chain::Attempt;

/// Print document through a LaTeX engine.
pub struct PdfGenerator;

impl FormatGenerator for PdfGenerator {
    fn format(&self) -> Format {
        Format::Pdf
    }

    fn attempts(&self, ctx: &GenerateContext) -> Vec<Attempt> {
        let s = &ctx.config.format_settings.pdf;

        let mut args = vec![
            format!("--pdf-engine={}", s.pdf_engine),
            "-V".to_string(),
            format!("papersize={}", s.paper_size),
            "-V".to_string(),
            format!(
                "geometry:top={},bottom={},left={},right={}",
                s.margin_top, s.margin_bottom, s.margin_left, s.margin_right
            ),
            "-V".to_string(),
            format!("fontsize={}", s.font_size),
            "-V".to_string(),
            format!("linestretch={}", s.line_height),
        ];
        if let Some(template) = ctx.resolver.template(&ctx.config, Format::Pdf, &ctx.language) {
            args.push(format!("--template={}", ctx.rel(&template)));
        }
        args.extend(toc_args(s.toc, s.toc_depth));

        standard_chain(ctx, Format::Pdf, args)
    }
}
