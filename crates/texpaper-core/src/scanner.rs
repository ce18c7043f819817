//! Brace-balanced inline scanner.
//!
//! Expands `\name{body}` for every `name` in the [`CommandTable`], where
//! `body` may hold arbitrarily nested brace groups and escaped braces. A
//! regex cannot count nesting depth, so the work is done by a single
//! left-to-right scan over bytes plus an explicit depth-counting matcher.
//!
//! The lower-level helpers here (brace and bracket matching, argument
//! readers, command search) are shared by every stage that has to find the
//! end of a LaTeX argument.

use memchr::{memchr, memmem};

use crate::commands::CommandTable;
use crate::error::{ParseError, Stage};
use crate::span::Span;

/// Check whether the byte at `pos` is escaped by an odd run of backslashes.
#[inline]
pub fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    bytes[..pos].iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 1
}

/// Find the `}` matching the `{` at `open`.
///
/// Escaped characters (`\{`, `\}`, `\\`) are skipped. Returns `None` when the
/// group never closes.
pub fn match_brace(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes.get(open), Some(&b'{'));
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Find the `]` closing the `[` at `open`, ignoring brackets inside brace
/// groups.
pub fn match_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes.get(open), Some(&b'['));
    let mut depth = 0usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b']' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

#[inline]
fn skip_inline_space(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t') {
        pos += 1;
    }
    pos
}

/// Read a required `{…}` argument starting at `pos` (leading spaces and tabs
/// are skipped).
///
/// - `Ok(Some((body, next)))`: `body` spans the text between the braces and
///   `next` is the offset just past the closing brace.
/// - `Ok(None)`: the next non-space character is not `{`.
/// - `Err(open)`: the brace at `open` never closes.
pub fn braced_arg(text: &str, pos: usize) -> Result<Option<(Span, usize)>, usize> {
    let bytes = text.as_bytes();
    let open = skip_inline_space(bytes, pos);
    if bytes.get(open) != Some(&b'{') {
        return Ok(None);
    }
    match match_brace(bytes, open) {
        Some(close) => Ok(Some((Span::new(open + 1, close), close + 1))),
        None => Err(open),
    }
}

/// Read an optional `[…]` argument starting at `pos`.
///
/// An unclosed bracket is treated as ordinary text, so this never fails.
pub fn bracket_arg(text: &str, pos: usize) -> Option<(Span, usize)> {
    let bytes = text.as_bytes();
    let open = skip_inline_space(bytes, pos);
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    match_bracket(bytes, open).map(|close| (Span::new(open + 1, close), close + 1))
}

/// Find the next unescaped `\name` at or after `from` that is not the prefix
/// of a longer command name. Returns the offset of the backslash.
pub fn find_command(text: &str, name: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let needle = format!("\\{name}");
    let finder = memmem::Finder::new(needle.as_bytes());
    let mut pos = from;
    while pos <= bytes.len() {
        let at = pos + finder.find(&bytes[pos..])?;
        let after = at + needle.len();
        let continues_name = bytes.get(after).is_some_and(|b| b.is_ascii_alphabetic());
        if !continues_name && !is_escaped(bytes, at) {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// Length of the ASCII-letter command name starting at `pos`.
#[inline]
pub fn command_name_len(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..]
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .count()
}

/// Expands known inline commands, recursing into their arguments.
pub struct Scanner<'t> {
    table: &'t CommandTable,
    recover: bool,
    errors: Vec<ParseError>,
}

impl<'t> Scanner<'t> {
    /// Create a scanner over `table`. Recovery is on by default.
    pub fn new(table: &'t CommandTable) -> Self {
        Self {
            table,
            recover: true,
            errors: Vec::new(),
        }
    }

    /// Enable or disable error recovery.
    ///
    /// With recovery on, an unterminated `\name{` is left in the output as
    /// raw text, the error is collected, and scanning resumes just after the
    /// brace so the rest of the text still expands. With recovery off the
    /// first unbalanced brace aborts the scan.
    pub fn with_recovery(mut self, recover: bool) -> Self {
        self.recover = recover;
        self
    }

    /// Expand every known command in `src`.
    pub fn scan(&mut self, src: &str) -> Result<String, ParseError> {
        let mut out = String::with_capacity(src.len() + 16);
        self.scan_into(src, &mut out)?;
        Ok(out)
    }

    /// Take the errors collected in recovery mode.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    fn scan_into(&mut self, src: &str, out: &mut String) -> Result<(), ParseError> {
        let table = self.table;
        let bytes = src.as_bytes();
        let mut copied = 0;
        let mut pos = 0;

        while let Some(rel) = memchr(b'\\', &bytes[pos..]) {
            let at = pos + rel;
            let name_len = command_name_len(bytes, at + 1);
            if name_len == 0 {
                // escape pair such as `\{` or `\\`
                pos = (at + 2).min(bytes.len());
                continue;
            }

            let name_end = at + 1 + name_len;
            let name = &src[at + 1..name_end];
            let Some(wrapper) = table.lookup(name) else {
                pos = name_end;
                continue;
            };

            let open = skip_inline_space(bytes, name_end);
            if bytes.get(open) != Some(&b'{') {
                pos = name_end;
                continue;
            }

            match match_brace(bytes, open) {
                Some(close) => {
                    out.push_str(&src[copied..at]);
                    out.push_str(wrapper.open);
                    self.scan_into(&src[open + 1..close], out)?;
                    out.push_str(wrapper.close);
                    copied = close + 1;
                    pos = close + 1;
                }
                None => {
                    let err = ParseError::unbalanced_brace(Stage::Inline, src, at);
                    if !self.recover {
                        return Err(err);
                    }
                    self.errors.push(err);
                    pos = open + 1;
                }
            }
        }

        out.push_str(&src[copied..]);
        Ok(())
    }
}
