use bookforge_shared::Format;

use super::{FormatGenerator, GenerateContext, standard_chain, toc_args};
use crate::chain::Attempt;

/// Standalone web page.
pub struct HtmlGenerator;

impl FormatGenerator for HtmlGenerator {
    fn format(&self) -> Format {
        Format::Html
    }

    fn attempts(&self, ctx: &GenerateContext) -> Vec<Attempt> {
        let s = &ctx.config.format_settings.html;
        let mut args = vec!["--standalone".to_string()];

        if let Some(template) = ctx.resolver.template(&ctx.config, Format::Html, &ctx.language) {
            args.push(format!("--template={}", ctx.rel(&template)));
        }
        if let Some(css) = ctx.resolver.stylesheet(&ctx.config, Format::Html, &ctx.language) {
            args.push(format!("--css={}", ctx.rel(&css)));
        }
        args.extend(toc_args(s.toc, s.toc_depth));
        if s.section_divs {
            args.push("--section-divs".to_string());
        }
        if s.self_contained {
            args.push("--embed-resources".to_string());
        }

        standard_chain(ctx, Format::Html, args)
    }
}

#[cfg(test)]
mod tests {
    use bookforge_shared::BookConfig;

    use super::*;
    use crate::generators::test_support::*;

    #[test]
    fn primary_flags() {
        let project = TempProject::new();
        project.touch("resources/css/style.css");

        let attempts = HtmlGenerator.attempts(&project.context(BookConfig::default()));
        let args = &attempts[0].invocation.args;

        for flag in ["--standalone", "--section-divs", "--embed-resources", "--toc", "--toc-depth=3"] {
            assert!(args.contains(&flag.to_string()), "missing {flag}");
        }
        assert!(args.contains(&"--css=resources/css/style.css".to_string()));

        assert!(attempts[1].invocation.args.contains(&"--standalone".to_string()));
        assert!(!attempts[1].invocation.args.contains(&"--embed-resources".to_string()));
    }

    #[test]
    fn optional_flags_follow_settings() {
        let project = TempProject::new();
        let mut config = BookConfig::default();
        config.format_settings.html.section_divs = false;
        config.format_settings.html.self_contained = false;

        let attempts = HtmlGenerator.attempts(&project.context(config));
        let args = &attempts[0].invocation.args;
        assert!(!args.contains(&"--section-divs".to_string()));
        assert!(!args.contains(&"--embed-resources".to_string()));
    }
}
