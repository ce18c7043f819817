//! `\begin{name}…\end{name}` matching.
//!
//! Environments nest, so the end of one cannot be found with a lazy regex:
//! `\begin{itemize}` inside an `itemize` must be paired with its own
//! `\end{itemize}`. The finder walks `\begin`/`\end` tokens and keeps a depth
//! count for the environment it is closing. Tokens for other environments are
//! ignored; they are handled when their own stage runs.

use memchr::memchr;

use crate::error::{ParseError, Stage};
use crate::scanner::{braced_arg, bracket_arg, command_name_len};
use crate::span::Span;

/// A complete environment found in some text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMatch<'a> {
    /// Environment name as written, including a trailing `*`.
    pub name: &'a str,
    /// From the backslash of `\begin` to just past the closing `}` of `\end{…}`.
    pub span: Span,
    /// The text between `\begin{name}` and `\end{name}`.
    pub body: &'a str,
}

impl<'a> EnvMatch<'a> {
    /// Name with any trailing `*` removed.
    pub fn base_name(&self) -> &'a str {
        self.name.strip_suffix('*').unwrap_or(self.name)
    }

    /// Split a leading `[…]` argument off the body.
    pub fn optional_arg(&self) -> (Option<&'a str>, &'a str) {
        split_optional(self.body)
    }

    /// Split a leading `{…}` argument off the body, after skipping an
    /// optional `[…]` argument in front of it (`\begin{tabular}[t]{lc}`).
    pub fn required_arg(&self) -> (Option<&'a str>, &'a str) {
        let (_, rest) = split_optional(self.body);
        match braced_arg(rest, 0) {
            Ok(Some((arg, next))) => (Some(arg.slice(rest)), &rest[next..]),
            _ => (None, rest),
        }
    }
}

fn split_optional(text: &str) -> (Option<&str>, &str) {
    match bracket_arg(text, 0) {
        Some((arg, next)) => (Some(arg.slice(text)), &text[next..]),
        None => (None, text),
    }
}

/// Outcome of looking for the next environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvScan<'a> {
    Found(EnvMatch<'a>),
    /// `\begin{name}` at `begin` has no matching `\end{name}`. `resume` is
    /// the offset just past the `\begin{name}` token.
    Unclosed {
        name: &'a str,
        begin: usize,
        resume: usize,
    },
}

/// A `\begin` or `\end` token with its environment name.
struct Token<'a> {
    is_begin: bool,
    name: &'a str,
    start: usize,
    end: usize,
}

/// The next `\begin{…}` or `\end{…}` at or after `from`, which must not
/// sit in the middle of an escape pair.
fn next_token(text: &str, from: usize) -> Option<Token<'_>> {
    let bytes = text.as_bytes();
    let mut pos = from;
    while let Some(rel) = memchr(b'\\', &bytes[pos..]) {
        let at = pos + rel;
        let name_len = command_name_len(bytes, at + 1);
        if name_len == 0 {
            pos = (at + 2).min(bytes.len());
            continue;
        }
        let name_end = at + 1 + name_len;
        let is_begin = match &text[at + 1..name_end] {
            "begin" => true,
            "end" => false,
            _ => {
                pos = name_end;
                continue;
            }
        };
        if let Ok(Some((name, next))) = braced_arg(text, name_end) {
            return Some(Token {
                is_begin,
                name: name.slice(text).trim(),
                start: at,
                end: next,
            });
        }
        pos = name_end;
    }
    None
}

/// Find the first environment at or after `from` whose name satisfies
/// `accept`.
pub fn find_env<'a>(text: &'a str, from: usize, accept: impl Fn(&str) -> bool) -> Option<EnvScan<'a>> {
    let mut pos = from;
    let open = loop {
        let token = next_token(text, pos)?;
        if token.is_begin && accept(token.name) {
            break token;
        }
        pos = token.end;
    };

    let mut depth = 1usize;
    let mut pos = open.end;
    while let Some(token) = next_token(text, pos) {
        pos = token.end;
        if token.name != open.name {
            continue;
        }
        if token.is_begin {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(EnvScan::Found(EnvMatch {
                    name: open.name,
                    span: Span::new(open.start, token.end),
                    body: &text[open.end..token.start],
                }));
            }
        }
    }

    Some(EnvScan::Unclosed {
        name: open.name,
        begin: open.start,
        resume: open.end,
    })
}

/// Replace every accepted environment in `text` with the output of `render`.
///
/// Environments are visited outermost first, left to right; `render` is
/// responsible for any recursion into the body. An unclosed environment is
/// left in place and reported as an error tagged with `stage`.
pub fn rewrite_envs<'a>(
    text: &'a str,
    stage: Stage,
    accept: impl Fn(&str) -> bool,
    mut render: impl FnMut(&EnvMatch<'a>) -> String,
) -> (String, Vec<ParseError>) {
    let mut out = String::with_capacity(text.len());
    let mut errors = Vec::new();
    let mut copied = 0;
    let mut pos = 0;

    while let Some(scan) = find_env(text, pos, &accept) {
        match scan {
            EnvScan::Found(env) => {
                out.push_str(&text[copied..env.span.start]);
                out.push_str(&render(&env));
                copied = env.span.end;
                pos = env.span.end;
            }
            EnvScan::Unclosed { name, begin, resume } => {
                errors.push(ParseError::unclosed_environment(stage, name, text, begin));
                pos = resume;
            }
        }
    }

    out.push_str(&text[copied..]);
    (out, errors)
}
