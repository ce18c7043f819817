//! Line lexer with SIMD-accelerated newline scanning.
//!
//! Used wherever the pipeline thinks in lines rather than braces: comment
//! stripping works line by line, and the paragraph assembler groups lines
//! into blank-line-delimited fragments.

use crate::span::Span;
use memchr::memchr;

/// A single line from the input with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// The line text (without trailing newline or carriage return).
    pub text: &'a str,
    /// Byte span in the lexed text.
    pub span: Span,
}

impl<'a> Line<'a> {
    /// Check if this line contains only whitespace.
    #[inline(always)]
    pub fn is_blank(&self) -> bool {
        self.text.bytes().all(|b| b.is_ascii_whitespace())
    }
}

/// Line-based lexer with peek/consume access.
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    offset: usize,
    peeked: Option<Line<'a>>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            offset: 0,
            peeked: None,
        }
    }

    /// Check if all input has been consumed.
    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.peeked.is_none() && self.offset >= self.bytes.len()
    }

    /// Peek at the next line without consuming it.
    #[inline]
    pub fn peek_line(&mut self) -> Option<&Line<'a>> {
        if self.peeked.is_none() {
            self.peeked = self.read_line();
        }
        self.peeked.as_ref()
    }

    /// Consume and return the next line.
    #[inline]
    pub fn next_line(&mut self) -> Option<Line<'a>> {
        if let Some(line) = self.peeked.take() {
            return Some(line);
        }
        self.read_line()
    }

    /// Skip blank lines and return the count skipped.
    #[inline]
    pub fn skip_blank_lines(&mut self) -> usize {
        let mut count = 0;
        while let Some(line) = self.peek_line() {
            if !line.is_blank() {
                break;
            }
            self.next_line();
            count += 1;
        }
        count
    }

    /// Consume the next run of non-blank lines, skipping any blank lines
    /// before it.
    ///
    /// Returns the text from the start of the first line to the end of the
    /// last one, interior newlines included. `None` at end of input.
    pub fn next_fragment(&mut self) -> Option<&'a str> {
        self.skip_blank_lines();
        let first = self.next_line()?;
        let mut end = first.span.end;

        while let Some(line) = self.peek_line() {
            if line.is_blank() {
                break;
            }
            end = line.span.end;
            self.next_line();
        }

        Some(&self.input[first.span.start..end])
    }

    #[inline(always)]
    fn read_line(&mut self) -> Option<Line<'a>> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let start = self.offset;

        let end = match memchr(b'\n', &self.bytes[start..]) {
            Some(pos) => start + pos,
            None => self.bytes.len(),
        };

        let text_end = if end > start && self.bytes[end - 1] == b'\r' {
            end - 1
        } else {
            end
        };

        self.offset = if end < self.bytes.len() { end + 1 } else { end };

        Some(Line {
            // SAFETY: `start` is 0 or just past a `\n`, and `text_end` is at a
            // `\n`, a `\r` or the end of input. All three are single-byte ASCII,
            // so both offsets sit on UTF-8 char boundaries.
            text: unsafe { self.input.get_unchecked(start..text_end) },
            span: Span::new(start, text_end),
        })
    }
}

/// Remove `%` comments.
///
/// A `%` preceded by an even number of backslashes starts a comment running
/// to the end of its line. Lines that held nothing but a comment disappear
/// entirely, so they cannot split a paragraph.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut lexer = Lexer::new(input);
    let mut first = true;

    while let Some(line) = lexer.next_line() {
        let kept = match find_comment(line.text) {
            Some(pos) => {
                let code = &line.text[..pos];
                if code.trim().is_empty() {
                    // comment-only line
                    continue;
                }
                code.trim_end()
            }
            None => line.text,
        };
        if !first {
            out.push('\n');
        }
        out.push_str(kept);
        first = false;
    }

    out
}

fn find_comment(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut from = 0;
    while let Some(rel) = memchr(b'%', &bytes[from..]) {
        let pos = from + rel;
        let backslashes = bytes[..pos].iter().rev().take_while(|&&b| b == b'\\').count();
        if backslashes % 2 == 0 {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}
