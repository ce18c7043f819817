//! Math protection.
//!
//! Every math span is swapped for an opaque placeholder before any text
//! rewriting happens, and swapped back after all of it is done. Nothing in
//! between can see, and so nothing can corrupt, math source.
//!
//! Spans are found in five passes, in this order:
//!
//! 1. `$$…$$`
//! 2. `\[…\]`
//! 3. display environments (`equation`, `align`, `gather`, `eqnarray`,
//!    `displaymath`, `multline`, `flalign`, `alignat`, starred or not)
//! 4. `\(…\)`
//! 5. `$…$`
//!
//! Running `$$` before `$` keeps a `$$` pair from being read as two empty
//! inline spans.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use memchr::memchr;
use regex::{Captures, Regex};
use tracing::debug;

use crate::env::{find_env, EnvScan};
use crate::error::{ParseError, ParseErrorKind, Stage};
use crate::scanner::is_escaped;

/// Display math environments, without the optional `*`.
pub const DISPLAY_ENVIRONMENTS: &[&str] = &[
    "equation",
    "align",
    "gather",
    "eqnarray",
    "displaymath",
    "multline",
    "flalign",
    "alignat",
];

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__(DISPLAY|INLINE)_MATH_(\d+)__").expect("valid placeholder regex")
});
static RE_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.?\d*$").expect("valid currency regex"));
static RE_BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\r?\n").expect("valid blank line regex"));

/// Whether `name` is a display math environment. Every one but
/// `displaymath` also has a starred form.
pub fn is_display_env(name: &str) -> bool {
    match name.strip_suffix('*') {
        Some(base) => base != "displaymath" && DISPLAY_ENVIRONMENTS.contains(&base),
        None => DISPLAY_ENVIRONMENTS.contains(&name),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathKind {
    Display,
    Inline,
}

impl MathKind {
    fn token_prefix(self) -> &'static str {
        match self {
            MathKind::Display => "DISPLAY",
            MathKind::Inline => "INLINE",
        }
    }
}

/// Placeholder text for math span `id`.
pub fn placeholder(kind: MathKind, id: usize) -> String {
    format!("__{}_MATH_{}__", kind.token_prefix(), id)
}

/// Find the first display placeholder in `text`.
pub fn find_display_placeholder(text: &str) -> Option<(usize, usize)> {
    RE_PLACEHOLDER
        .captures_iter(text)
        .find(|c| &c[1] == "DISPLAY")
        .and_then(|c| c.get(0))
        .map(|m| (m.start(), m.end()))
}

/// One protected span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathEntry {
    pub kind: MathKind,
    /// The matched source, delimiters included.
    pub source: String,
    /// What the placeholder turns into in the HTML output.
    pub rendered: String,
}

/// Placeholder → math mapping for one parse.
///
/// [`protect`](MathStore::protect) forgets the entries of the previous call,
/// but placeholder numbers keep increasing for the life of the store, so a
/// token can never be confused with one from an earlier block of the same
/// parse.
#[derive(Debug, Default)]
pub struct MathStore {
    entries: BTreeMap<usize, MathEntry>,
    next_id: usize,
    display_total: usize,
    inline_total: usize,
}

impl MathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries recorded by the most recent `protect` call.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for placeholder number `id`.
    pub fn get(&self, id: usize) -> Option<&MathEntry> {
        self.entries.get(&id)
    }

    /// Display spans protected over the life of the store.
    pub fn display_total(&self) -> usize {
        self.display_total
    }

    /// Inline spans protected over the life of the store.
    pub fn inline_total(&self) -> usize {
        self.inline_total
    }

    /// Replace every math span in `text` with a placeholder.
    pub fn protect(&mut self, text: &str) -> String {
        self.entries.clear();

        let text = self.protect_delimited(text, "$$", "$$", MathKind::Display);
        let text = self.protect_delimited(&text, "\\[", "\\]", MathKind::Display);
        let text = self.protect_environments(&text);
        let text = self.protect_delimited(&text, "\\(", "\\)", MathKind::Inline);
        let text = self.protect_dollars(&text);

        debug!(protected = self.entries.len(), "math protected");
        text
    }

    /// Put rendered math back in place of every placeholder.
    ///
    /// Placeholders that were recorded but never found, and placeholders
    /// found more than once, are reported. Unknown placeholder-shaped text
    /// is left alone.
    pub fn restore(&self, text: &str) -> (String, Vec<ParseError>) {
        self.substitute(text, |entry| &entry.rendered)
    }

    /// Put the original source back in place of every placeholder.
    ///
    /// `restore_verbatim(protect(t)) == t` for any `t`.
    pub fn restore_verbatim(&self, text: &str) -> String {
        self.substitute(text, |entry| &entry.source).0
    }

    fn substitute(&self, text: &str, pick: impl Fn(&MathEntry) -> &str) -> (String, Vec<ParseError>) {
        let mut seen: BTreeMap<usize, usize> = BTreeMap::new();

        let out = RE_PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let entry = caps[2]
                .parse::<usize>()
                .ok()
                .and_then(|id| self.entries.get(&id).map(|e| (id, e)))
                .filter(|(_, e)| e.kind.token_prefix() == &caps[1]);
            match entry {
                Some((id, entry)) => {
                    *seen.entry(id).or_default() += 1;
                    pick(entry).to_string()
                }
                None => caps[0].to_string(),
            }
        });

        let mut errors = Vec::new();
        for (id, entry) in &self.entries {
            let token = placeholder(entry.kind, *id);
            match seen.get(id).copied().unwrap_or(0) {
                1 => {}
                0 => errors.push(
                    ParseError::new(
                        Stage::Restore,
                        ParseErrorKind::MathRestorationMismatch,
                        format!("math placeholder {token} was lost before restoration"),
                    )
                    .with_context(&entry.source),
                ),
                n => errors.push(
                    ParseError::new(
                        Stage::Restore,
                        ParseErrorKind::MathRestorationMismatch,
                        format!("math placeholder {token} was duplicated ({n} occurrences)"),
                    )
                    .with_context(&entry.source),
                ),
            }
        }

        (out.into_owned(), errors)
    }

    fn record(&mut self, kind: MathKind, source: &str, body: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;

        let rendered = match kind {
            MathKind::Display => {
                self.display_total += 1;
                format!("<div class=\"article-equation\">{}</div>", escape_angles(source))
            }
            MathKind::Inline => {
                self.inline_total += 1;
                format!("\\({}\\)", escape_angles(body))
            }
        };
        self.entries.insert(
            id,
            MathEntry {
                kind,
                source: source.to_string(),
                rendered,
            },
        );
        placeholder(kind, id)
    }

    /// Protect spans with fixed open and close delimiters. A delimiter whose
    /// first character is escaped does not count.
    fn protect_delimited(&mut self, text: &str, open: &str, close: &str, kind: MathKind) -> String {
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut pos = 0;

        while let Some(start) = find_unescaped(text, open, pos) {
            let body_start = start + open.len();
            let Some(end) = find_unescaped(text, close, body_start) else {
                break;
            };
            let span_end = end + close.len();
            out.push_str(&text[copied..start]);
            out.push_str(&self.record(kind, &text[start..span_end], &text[body_start..end]));
            copied = span_end;
            pos = span_end;
        }

        out.push_str(&text[copied..]);
        out
    }

    fn protect_environments(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut pos = 0;

        while let Some(scan) = find_env(text, pos, is_display_env) {
            match scan {
                EnvScan::Found(env) => {
                    let source = env.span.slice(text);
                    out.push_str(&text[copied..env.span.start]);
                    out.push_str(&self.record(MathKind::Display, source, env.body));
                    copied = env.span.end;
                    pos = env.span.end;
                }
                // left for the block stages to report
                EnvScan::Unclosed { resume, .. } => pos = resume,
            }
        }

        out.push_str(&text[copied..]);
        out
    }

    /// Single-dollar inline math.
    ///
    /// An opening `$` must not be followed by whitespace. The closing `$` is
    /// the next unescaped one, and it must not be preceded by whitespace or
    /// followed by a digit; if it fails, the opener is not math. The content may
    /// not span a blank line, and a span holding only a number is currency:
    /// it is skipped whole.
    fn protect_dollars(&mut self, text: &str) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut pos = 0;

        while let Some(rel) = memchr(b'$', &bytes[pos..]) {
            let open = pos + rel;
            pos = open + 1;
            if is_escaped(bytes, open) {
                continue;
            }
            match bytes.get(open + 1) {
                None => break,
                Some(b) if b.is_ascii_whitespace() || *b == b'$' => continue,
                Some(_) => {}
            }

            let Some(close) = find_dollar_close(bytes, open + 1) else {
                continue;
            };
            let body = &text[open + 1..close];
            if RE_BLANK_LINE.is_match(body) {
                continue;
            }
            if RE_CURRENCY.is_match(body) {
                pos = close + 1;
                continue;
            }

            out.push_str(&text[copied..open]);
            out.push_str(&self.record(MathKind::Inline, &text[open..=close], body));
            copied = close + 1;
            pos = close + 1;
        }

        out.push_str(&text[copied..]);
        out
    }
}

fn find_unescaped(text: &str, needle: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut pos = from;
    while pos < bytes.len() {
        let at = pos + memchr::memmem::find(&bytes[pos..], needle.as_bytes())?;
        if !is_escaped(bytes, at) {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// The next unescaped `$` after `from`, if it can close a span.
fn find_dollar_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = memchr(b'$', &bytes[pos..]) {
        let at = pos + rel;
        pos = at + 1;
        if is_escaped(bytes, at) {
            continue;
        }
        let after_space = bytes[at - 1].is_ascii_whitespace();
        let before_digit = bytes.get(at + 1).is_some_and(|b| b.is_ascii_digit());
        return (!after_space && !before_digit).then_some(at);
    }
    None
}

fn escape_angles(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}
