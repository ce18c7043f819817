//! Paragraph assembly.
//!
//! Splits block-processed text on blank lines. Fragments that already are
//! block-level HTML pass through untouched; everything else is normalized
//! and wrapped in `<p>`. Display-math placeholders are never wrapped: a
//! fragment holding one is split around it.

use crate::lexer::Lexer;
use crate::math::find_display_placeholder;
use crate::normalize::normalize;
use crate::parser::Context;

const BLOCK_PREFIXES: &[&str] = &[
    "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<div", "<ol", "<ul", "<dl", "<table", "<blockquote",
];

/// Check whether a fragment starts with a block-level HTML tag.
#[inline]
pub(crate) fn is_block_html(fragment: &str) -> bool {
    BLOCK_PREFIXES.iter().any(|p| fragment.starts_with(p))
}

/// Assemble paragraphs from `text`. Fragment outputs are concatenated with
/// no separators.
pub(crate) fn assemble(ctx: &mut Context<'_>, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut lexer = Lexer::new(text);

    while let Some(fragment) = lexer.next_fragment() {
        let fragment = fragment.trim();
        if is_block_html(fragment) {
            out.push_str(fragment);
            continue;
        }

        let mut rest = fragment;
        while let Some((start, end)) = find_display_placeholder(rest) {
            push_paragraph(ctx, &rest[..start], &mut out);
            out.push_str(&rest[start..end]);
            rest = &rest[end..];
        }
        push_paragraph(ctx, rest, &mut out);
    }

    out
}

fn push_paragraph(ctx: &mut Context<'_>, text: &str, out: &mut String) {
    if text.trim().is_empty() {
        return;
    }
    let html = normalize(ctx, text);
    if html.is_empty() {
        return;
    }
    out.push_str("<p>");
    out.push_str(&html);
    out.push_str("</p>");
}
