//! Inline text normalizer.
//!
//! The terminal pass for any text that is not already HTML. Steps run in a
//! fixed order and none of them may undo an earlier one:
//!
//! 1. inline formatting commands (the brace scanner) and font-size switches
//! 2. citations
//! 3. `\ref`, `\eqref`, `\label`
//! 4. footnotes
//! 5. line breaks
//! 6. remaining commands and stray braces
//! 7. typography and whitespace
//! 8. reserved-character escapes
//!
//! Escapes come last so that `\{`, `\}` and `\&` stay recognizable as
//! escapes, not as groups or cell separators, for as long as any earlier
//! step might look at them.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::commands::SIZE_COMMANDS;
use crate::error::{ParseError, Stage};
use crate::parser::Context;
use crate::scanner::{braced_arg, command_name_len, find_command, Scanner};

static RE_SIZE_SWITCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\\({})\b[ \t]*([^\n<}}]*)",
        SIZE_COMMANDS.join("|")
    ))
    .expect("valid size switch regex")
});
static RE_CITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(citep|citet|cite)\*?(?:\s*\[[^\]]*\]){0,2}\s*\{([^}]*)\}").expect("valid cite regex")
});
static RE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(ref|eqref|cref|autoref|label)\s*\{([^}]*)\}").expect("valid ref regex")
});
static RE_LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\\\\*?(?:\s*\[[^\]]*\])?|\\newline\b").expect("valid line break regex")
});
static RE_NEWBLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\newblock\b").expect("valid newblock regex"));
static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static RE_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([#$%&_{}])").expect("valid escape regex"));

/// Normalize one run of inline text into HTML.
pub(crate) fn normalize(ctx: &mut Context<'_>, text: &str) -> String {
    let mut scanner = Scanner::new(ctx.commands).with_recovery(ctx.recover);
    let (text, degraded) = match scanner.scan(text) {
        Ok(out) => (out, false),
        Err(err) => {
            ctx.errors.push(err);
            (text.to_string(), true)
        }
    };
    ctx.errors.extend(scanner.take_errors());

    let text = size_switches(&text);
    let text = citations(ctx, &text);
    let text = references(&text);
    let text = footnotes(ctx, &text);
    let text = RE_LINE_BREAK.replace_all(&text, "<br>");
    let text = RE_NEWBLOCK.replace_all(&text, " ");
    let text = strip_commands(&text);
    let text = typography(&text);
    let text = RE_WHITESPACE.replace_all(&text, " ");
    let text = unescape(text.trim());

    if degraded {
        format!("<span class=\"tex-error\">{text}</span>")
    } else {
        text
    }
}

fn size_switches(text: &str) -> String {
    RE_SIZE_SWITCH
        .replace_all(text, "<span class=\"tex-$1\">$2</span>")
        .into_owned()
}

fn citations(ctx: &mut Context<'_>, text: &str) -> String {
    RE_CITE
        .replace_all(text, |caps: &Captures<'_>| {
            let keys: Vec<&str> = caps[2]
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .collect();
            ctx.citations += keys.len();

            let bare = &caps[1] == "citet";
            let links = keys
                .iter()
                .map(|k| {
                    let k = escape_attr(k);
                    let label = if bare { k.clone() } else { format!("[{k}]") };
                    format!("<a href=\"#ref-{k}\" class=\"citation\">{label}</a>")
                })
                .collect::<Vec<_>>()
                .join(", ");

            match &caps[1] {
                "citep" => format!("({links})"),
                _ => links,
            }
        })
        .into_owned()
}

fn references(text: &str) -> String {
    RE_REF
        .replace_all(text, |caps: &Captures<'_>| {
            let key = escape_attr(caps[2].trim());
            match &caps[1] {
                "label" => format!("<span id=\"{key}\" class=\"label\"></span>"),
                "eqref" => format!("(<a href=\"#{key}\" class=\"ref\">{key}</a>)"),
                _ => format!("<a href=\"#{key}\" class=\"ref\">{key}</a>"),
            }
        })
        .into_owned()
}

/// `\footnote{…}` becomes a numbered marker followed by the note itself.
/// Numbers run across the whole parse.
fn footnotes(ctx: &mut Context<'_>, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(at) = find_command(text, "footnote", pos) {
        let after = at + "\\footnote".len();
        match braced_arg(text, after) {
            Ok(Some((body, next))) => {
                ctx.footnotes += 1;
                out.push_str(&text[copied..at]);
                out.push_str(&format!(
                    "<sup class=\"footnote-ref\">{n}</sup><span class=\"footnote\">{body}</span>",
                    n = ctx.footnotes,
                    body = body.slice(text),
                ));
                copied = next;
                pos = next;
            }
            Ok(None) => pos = after,
            Err(_) => {
                ctx.errors
                    .push(ParseError::unbalanced_brace(Stage::Inline, text, at));
                pos = after;
            }
        }
    }

    out.push_str(&text[copied..]);
    out
}

/// Drop every command still left, keeping escape pairs for the final step.
///
/// `\begin{…}` and `\end{…}` go with their argument. Unescaped braces go.
/// Control spaces become spaces; accents and other control symbols are
/// dropped.
fn strip_commands(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                out.push_str(&text[copied..i]);
                let Some(&next) = bytes.get(i + 1) else {
                    copied = bytes.len();
                    break;
                };
                i = if next.is_ascii_alphabetic() {
                    let name_end = i + 1 + command_name_len(bytes, i + 1);
                    let mut end = name_end;
                    if bytes.get(end) == Some(&b'*') {
                        end += 1;
                    }
                    if matches!(&text[i + 1..name_end], "begin" | "end") {
                        if let Ok(Some((_, next))) = braced_arg(text, end) {
                            end = next;
                        }
                    }
                    end
                } else {
                    match next {
                        b'#' | b'$' | b'%' | b'&' | b'_' | b'{' | b'}' => {
                            out.push('\\');
                            out.push(next as char);
                        }
                        b' ' | b',' | b';' | b':' | b'\n' => out.push(' '),
                        _ => {}
                    }
                    // a non-ASCII char after the backslash is kept
                    if next.is_ascii() {
                        i + 2
                    } else {
                        i + 1
                    }
                };
                copied = i;
            }
            b'{' | b'}' => {
                out.push_str(&text[copied..i]);
                i += 1;
                copied = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&text[copied..]);
    out
}

fn typography(text: &str) -> String {
    text.replace("---", "&mdash;")
        .replace("--", "&ndash;")
        .replace("``", "&ldquo;")
        .replace("''", "&rdquo;")
        .replace('~', "&nbsp;")
}

/// Escape a key for use inside a double-quoted attribute. The visible
/// copy of the key goes through the same escaping.
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolve the seven reserved-character escapes.
pub(crate) fn unescape(text: &str) -> String {
    RE_ESCAPE
        .replace_all(text, |caps: &Captures<'_>| {
            match &caps[1] {
                "#" => "&#35;",
                "$" => "&#36;",
                "%" => "&#37;",
                "&" => "&amp;",
                "_" => "&#95;",
                "{" => "&#123;",
                _ => "&#125;",
            }
            .to_string()
        })
        .into_owned()
}
