//! Front matter and document body isolation.
//!
//! Pulls `\title`, `\author`, `\date` and the first `abstract` out of the
//! source so they can be rendered ahead of the sections, and cuts the body
//! out of `\begin{document}…\end{document}`.

use std::sync::LazyLock;

use regex::Regex;

use crate::env::{find_env, EnvScan};
use crate::error::{FatalError, ParseError, ParseErrors, Stage};
use crate::scanner::{braced_arg, bracket_arg, find_command};
use crate::span::Span;

static RE_PREAMBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:documentclass|usepackage|bibliographystyle)\s*(?:\[[^\]]*\])?\s*\{[^}]*\}")
        .expect("valid preamble regex")
});
static RE_TITLE_PAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:maketitle|tableofcontents)\b[ \t]*").expect("valid title page regex")
});

/// Raw (unrendered) front matter fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub abstract_body: Option<String>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A document split into front matter and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub front: FrontMatter,
    pub body: String,
}

/// The first `\name{…}` in `text`: the whole command's span and its
/// argument.
fn command_arg<'a>(text: &'a str, name: &str) -> Option<(Span, &'a str)> {
    let mut pos = 0;
    while let Some(at) = find_command(text, name, pos) {
        let mut arg = at + 1 + name.len();
        if let Some((_, next)) = bracket_arg(text, arg) {
            arg = next;
        }
        if let Ok(Some((body, next))) = braced_arg(text, arg) {
            return Some((Span::new(at, next), body.slice(text)));
        }
        pos = at + 1;
    }
    None
}

fn remove_span(text: &str, span: Span) -> String {
    format!("{}{}", &text[..span.start], &text[span.end..])
}

/// Remove every `\name{…}` from `text`.
fn remove_command(text: String, name: &str) -> String {
    let mut text = text;
    while let Some((span, _)) = command_arg(&text, name) {
        text = remove_span(&text, span);
    }
    text
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Split `text` into front matter and body.
///
/// Without a `document` environment the whole input is the body (minus
/// preamble commands), unless `require_document` is set.
pub fn split_document(
    text: &str,
    require_document: bool,
    errors: &mut ParseErrors,
) -> Result<Split, FatalError> {
    let (preamble, body) = match find_env(text, 0, |name| name == "document") {
        Some(EnvScan::Found(env)) => (&text[..env.span.start], env.body.to_string()),
        Some(EnvScan::Unclosed { begin, resume, .. }) => {
            errors.push(ParseError::unclosed_environment(
                Stage::FrontMatter,
                "document",
                text,
                begin,
            ));
            (&text[..begin], text[resume..].to_string())
        }
        None if require_document => return Err(FatalError::MissingDocument),
        None => ("", RE_PREAMBLE.replace_all(text, "").into_owned()),
    };

    let mut front = FrontMatter::default();

    let lookup = |name: &str| {
        command_arg(preamble, name)
            .or_else(|| command_arg(&body, name))
            .map(|(_, arg)| arg.to_string())
    };
    if let Some(title) = lookup("title") {
        match title.split_once("\\\\") {
            Some((main, sub)) => {
                front.title = non_empty(main);
                front.subtitle = non_empty(sub);
            }
            None => front.title = non_empty(&title),
        }
    }
    front.author = lookup("author").as_deref().and_then(non_empty);
    front.date = lookup("date").as_deref().and_then(non_empty);

    let mut body = ["title", "author", "date"]
        .into_iter()
        .fold(body, remove_command);

    let in_body = match find_env(&body, 0, |name| name == "abstract") {
        Some(EnvScan::Found(env)) => Some((env.span, non_empty(env.body))),
        _ => None,
    };
    match in_body {
        Some((span, abstract_body)) => {
            front.abstract_body = abstract_body;
            body = remove_span(&body, span);
        }
        None => {
            if let Some(EnvScan::Found(env)) = find_env(preamble, 0, |name| name == "abstract") {
                front.abstract_body = non_empty(env.body);
            }
        }
    }

    let body = RE_TITLE_PAGE.replace_all(&body, "").into_owned();
    Ok(Split { front, body })
}
