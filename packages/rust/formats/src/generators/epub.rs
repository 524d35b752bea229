use bookforge_shared::Format;

use super::{FormatGenerator, GenerateContext, standard_chain, toc_args};
use crate::chain::Attempt;

/// E-reader package.
pub struct EpubGenerator;

impl FormatGenerator for EpubGenerator {
    fn format(&self) -> Format {
        Format::Epub
    }

    fn attempts(&self, ctx: &GenerateContext) -> Vec<Attempt> {
        let s = &ctx.config.format_settings.epub;
        let mut args = Vec::new();

        if let Some(cover) = ctx.resolver.cover_image(&ctx.config, &ctx.language) {
            args.push(format!("--epub-cover-image={}", ctx.rel(&cover)));
        }
        if let Some(css) = ctx.resolver.stylesheet(&ctx.config, Format::Epub, &ctx.language) {
            args.push(format!("--css={}", ctx.rel(&css)));
        }
        args.extend(toc_args(s.toc, s.toc_depth));

        standard_chain(ctx, Format::Epub, args)
    }
}

#[cfg(test)]
mod tests {
    use bookforge_shared::BookConfig;

    use super::*;
    use crate::generators::test_support::*;

    #[test]
    fn cover_and_stylesheet_resolved() {
        let project = TempProject::new();
        project.touch("book/en/images/cover.jpg");
        project.touch("templates/epub/style.css");

        let attempts = EpubGenerator.attempts(&project.context(BookConfig::default()));
        let args = &attempts[0].invocation.args;

        assert!(args.contains(&"--epub-cover-image=book/en/images/cover.jpg".to_string()));
        assert!(args.contains(&"--css=templates/epub/style.css".to_string()));
        assert!(args.contains(&"--toc-depth=2".to_string()));
    }

    #[test]
    fn no_customization_found() {
        let project = TempProject::new();
        let attempts = EpubGenerator.attempts(&project.context(BookConfig::default()));
        let args = &attempts[0].invocation.args;

        assert!(!args.iter().any(|a| a.starts_with("--epub-cover-image")));
        assert!(!args.iter().any(|a| a.starts_with("--css")));
    }
}
