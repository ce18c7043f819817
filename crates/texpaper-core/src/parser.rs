//! Top-level orchestration.
//!
//! A [`Parser`] holds only read-only configuration. Everything that changes
//! during a parse (the math store, footnote and citation counters, the
//! diagnostic list) lives in a [`Context`] that is built on entry to
//! [`Parser::parse`] and dropped on return, so two parses never share state.

use tracing::{debug, warn};

use crate::blocks::{abstract_html, render_blocks};
use crate::commands::CommandTable;
use crate::config::Options;
use crate::error::{FatalError, ParseErrors};
use crate::frontmatter::{split_document, FrontMatter};
use crate::lexer::strip_comments;
use crate::math::MathStore;
use crate::normalize::normalize;
use crate::scanner::find_command;

/// Counts gathered during one parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Sections rendered (text before the first `\section` counts as one).
    pub sections: usize,
    pub display_math: usize,
    pub inline_math: usize,
    pub footnotes: usize,
    /// Citation keys, counted once per occurrence.
    pub citations: usize,
}

/// Result of a parse: the HTML plus any diagnostics recorded on the way.
#[derive(Debug)]
pub struct ParseResult {
    /// The rendered document. Always complete, even when errors were
    /// recorded; the constructs that failed are degraded in place.
    pub html: String,
    /// Diagnostics recorded by individual stages.
    pub errors: ParseErrors,
    pub stats: ParseStats,
}

impl ParseResult {
    /// Check if parsing completed without diagnostics.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Per-parse mutable state.
pub(crate) struct Context<'p> {
    pub options: &'p Options,
    pub commands: &'p CommandTable,
    /// When false, an unbalanced brace degrades the whole fragment instead
    /// of only the offending command.
    pub recover: bool,
    pub math: MathStore,
    pub errors: ParseErrors,
    pub footnotes: usize,
    pub citations: usize,
}

impl<'p> Context<'p> {
    pub fn new(options: &'p Options, commands: &'p CommandTable) -> Self {
        Self {
            options,
            commands,
            recover: true,
            math: MathStore::new(),
            errors: ParseErrors::new(),
            footnotes: 0,
            citations: 0,
        }
    }

    /// protect → escape → block stages → paragraphs → restore.
    fn render_protected(&mut self, text: &str) -> String {
        let protected = self.math.protect(text);
        let escaped = escape_angles(&protected);
        let html = render_blocks(self, &escaped);
        self.restore(&html)
    }

    /// The same for a single line of inline text.
    fn render_inline(&mut self, text: &str) -> String {
        let protected = self.math.protect(text);
        let escaped = escape_angles(&protected);
        let html = normalize(self, &escaped);
        self.restore(&html)
    }

    fn restore(&mut self, html: &str) -> String {
        let (restored, errors) = self.math.restore(html);
        self.errors.extend(errors);
        restored
    }
}

fn escape_angles(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Split a body at every unescaped `\section`. Text ahead of the first one
/// is a section of its own.
fn split_sections(body: &str) -> Vec<&str> {
    let mut starts = vec![0];
    let mut pos = 0;
    while let Some(at) = find_command(body, "section", pos) {
        if at > 0 {
            starts.push(at);
        }
        pos = at + "\\section".len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            &body[start..end]
        })
        .filter(|section| !section.trim().is_empty())
        .collect()
}

/// LaTeX article to HTML parser.
///
/// ```
/// use texpaper_core::{Options, Parser};
///
/// let mut parser = Parser::new(Options {
///     wrap_sections: false,
///     ..Options::default()
/// });
/// let result = parser.parse(r"\section{Intro} Let $x$ be \textbf{bold}.").unwrap();
/// assert_eq!(result.html, r"<h1>Intro</h1><p>Let \(x\) be <strong>bold</strong>.</p>");
/// ```
pub struct Parser {
    options: Options,
    commands: CommandTable,
    recover: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Parser {
    /// Create a parser with the given options.
    pub fn new(options: Options) -> Self {
        let commands = CommandTable::with_extra(options.extra_commands.clone());
        Self {
            options,
            commands,
            recover: true,
        }
    }

    /// Enable or disable inline error recovery.
    ///
    /// When enabled (default), an unbalanced brace in a command argument is
    /// reported and only that command is left as raw text. When disabled,
    /// the paragraph holding it is rendered as a single
    /// `<span class="tex-error">` instead.
    pub fn with_recovery(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    /// Parse a document, returning the HTML and the diagnostics.
    pub fn parse(&mut self, input: &str) -> Result<ParseResult, FatalError> {
        if input.len() > self.options.max_input_bytes {
            return Err(FatalError::InputTooLarge {
                size: input.len(),
                limit: self.options.max_input_bytes,
            });
        }

        let mut ctx = Context::new(&self.options, &self.commands);
        ctx.recover = self.recover;

        let source = if self.options.strip_comments {
            strip_comments(input)
        } else {
            input.to_string()
        };

        let split = split_document(&source, self.options.require_document, &mut ctx.errors)?;
        let mut html = render_front_matter(&mut ctx, &split.front);

        let sections = split_sections(&split.body);
        for (index, section) in sections.iter().enumerate() {
            debug!(index, bytes = section.len(), "rendering section");
            let body = ctx.render_protected(section);
            if self.options.wrap_sections {
                html.push_str("<div class=\"article-section\">");
                html.push_str(&body);
                html.push_str("</div>");
            } else {
                html.push_str(&body);
            }
        }

        let stats = ParseStats {
            sections: sections.len(),
            display_math: ctx.math.display_total(),
            inline_math: ctx.math.inline_total(),
            footnotes: ctx.footnotes,
            citations: ctx.citations,
        };
        debug!(?stats, errors = ctx.errors.len(), "parse finished");

        Ok(ParseResult {
            html,
            errors: ctx.errors,
            stats,
        })
    }

    /// Parse a document and return only the HTML. Diagnostics are logged.
    pub fn render(&mut self, input: &str) -> Result<String, FatalError> {
        let result = self.parse(input)?;
        if !result.errors.is_empty() {
            warn!(count = result.errors.len(), "parse completed with errors");
            for error in result.errors.iter() {
                warn!(stage = %error.stage, kind = error.kind.as_str(), "{}", error.message);
            }
        }
        Ok(result.html)
    }
}

fn render_front_matter(ctx: &mut Context<'_>, front: &FrontMatter) -> String {
    let mut html = String::new();
    if front.is_empty() {
        return html;
    }

    let fields = [
        ("article-title", &front.title),
        ("article-subtitle", &front.subtitle),
        ("article-author", &front.author),
        ("article-date", &front.date),
    ];
    for (class, field) in fields {
        let Some(text) = field else { continue };
        let rendered = ctx.render_inline(text);
        if !rendered.is_empty() {
            html.push_str(&format!("<div class=\"{class}\">{rendered}</div>"));
        }
    }

    if let Some(body) = &front.abstract_body {
        let rendered = ctx.render_protected(body);
        html.push_str(&abstract_html(&rendered));
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_split_on_section_command() {
        let sections = split_sections("intro\n\\section{A} a\n\\section*{B} b\n\\subsection{C} c");
        assert_eq!(
            sections,
            vec!["intro\n", "\\section{A} a\n", "\\section*{B} b\n\\subsection{C} c"]
        );
    }

    #[test]
    fn blank_sections_are_skipped() {
        assert_eq!(split_sections("  \n\\section{A}"), vec!["\\section{A}"]);
    }

    #[test]
    fn size_limit() {
        let mut parser = Parser::new(Options {
            max_input_bytes: 4,
            ..Options::default()
        });
        assert_eq!(
            parser.parse("too long").unwrap_err(),
            FatalError::InputTooLarge { size: 8, limit: 4 }
        );
    }

    #[test]
    fn context_starts_empty_on_every_parse() {
        let mut parser = Parser::default();
        let first = parser.parse("a $x$ b\\footnote{n}").unwrap();
        let second = parser.parse("a $x$ b\\footnote{n}").unwrap();
        assert_eq!(first.html, second.html);
        assert_eq!(second.stats.footnotes, 1);
        assert_eq!(second.stats.inline_math, 1);
    }
}
