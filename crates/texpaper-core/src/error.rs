//! Diagnostics and failure types.
//!
//! Two very different things can go wrong during a parse:
//!
//! - a single stage trips over one construct (an unbalanced brace, an
//!   unclosed environment, a table with no `tabular` body). These are
//!   [`ParseError`]s: recorded in [`ParseErrors`], the stage degrades its own
//!   output and the pipeline keeps going.
//! - the orchestration itself cannot produce a document. That is a
//!   [`FatalError`], and it is the only error [`crate::Parser::parse`]
//!   returns.

use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// The pipeline step that recorded a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Comment stripping, front matter and `document` isolation.
    FrontMatter,
    /// `\section` and friends.
    Headings,
    /// Theorem-like environments.
    Theorems,
    /// `itemize`, `enumerate`, `description`.
    Lists,
    /// `table` and `tabular`.
    Tables,
    /// `thebibliography`.
    Bibliography,
    /// `quote`, `quotation` and stray abstracts.
    Quotes,
    /// Inline normalization, including the brace scanner.
    Inline,
    /// Math restoration.
    Restore,
}

impl Stage {
    /// Stable lowercase name, used in logs and JSON output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::FrontMatter => "front-matter",
            Stage::Headings => "headings",
            Stage::Theorems => "theorems",
            Stage::Lists => "lists",
            Stage::Tables => "tables",
            Stage::Bibliography => "bibliography",
            Stage::Quotes => "quotes",
            Stage::Inline => "inline",
            Stage::Restore => "restore",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kinds for categorizing parse diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// An opening brace with no matching close inside a command argument.
    UnbalancedBrace,
    /// `\begin{name}` without a matching `\end{name}`.
    UnclosedEnvironment,
    /// A block construct whose structure could not be rendered.
    StageError,
    /// A math placeholder was lost or duplicated between protect and restore.
    MathRestorationMismatch,
}

impl ParseErrorKind {
    /// Stable name, used in JSON output.
    pub const fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::UnbalancedBrace => "unbalanced-brace",
            ParseErrorKind::UnclosedEnvironment => "unclosed-environment",
            ParseErrorKind::StageError => "stage-error",
            ParseErrorKind::MathRestorationMismatch => "math-restoration-mismatch",
        }
    }
}

/// Longest context snippet kept on a diagnostic, in chars.
const CONTEXT_CHARS: usize = 100;

/// A recoverable diagnostic recorded by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{stage}] {message}")]
pub struct ParseError {
    /// Stage that recorded the error.
    pub stage: Stage,
    /// Error categorization.
    pub kind: ParseErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// A short excerpt of the text around the offending construct.
    pub context: Option<String>,
    /// Location inside the stage's working text, when known.
    pub span: Option<Span>,
}

impl ParseError {
    /// Create a new diagnostic.
    pub fn new(stage: Stage, kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            context: None,
            span: None,
        }
    }

    /// An opening brace at `offset` of `text` never closed.
    pub fn unbalanced_brace(stage: Stage, text: &str, offset: usize) -> Self {
        Self::new(
            stage,
            ParseErrorKind::UnbalancedBrace,
            "unbalanced brace in command argument",
        )
        .with_span(Span::new(offset, text.len()))
        .with_context(&text[offset..])
    }

    /// `\begin{name}` at `offset` of `text` has no matching end.
    pub fn unclosed_environment(stage: Stage, name: &str, text: &str, offset: usize) -> Self {
        Self::new(
            stage,
            ParseErrorKind::UnclosedEnvironment,
            format!("unclosed environment `{name}`"),
        )
        .with_span(Span::new(offset, text.len()))
        .with_context(&text[offset..])
    }

    /// A construct the stage recognized but could not render.
    pub fn stage_error(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, ParseErrorKind::StageError, message)
    }

    /// Attach a context excerpt, truncated to a readable length.
    pub fn with_context(mut self, context: &str) -> Self {
        let mut snippet: String = context.chars().take(CONTEXT_CHARS).collect();
        if context.chars().nth(CONTEXT_CHARS).is_some() {
            snippet.push_str("...");
        }
        self.context = Some(snippet);
        self
    }

    /// Attach a location.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// A collection of diagnostics recorded during one parse.
#[derive(Debug, Clone, Default)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    /// Create an empty error collection.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Check if any errors were collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    /// Count the errors of one kind.
    pub fn count_kind(&self, kind: ParseErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// Errors recorded by one stage.
    pub fn by_stage(&self, stage: Stage) -> impl Iterator<Item = &ParseError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl Extend<ParseError> for ParseErrors {
    fn extend<T: IntoIterator<Item = ParseError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

/// A failure of the parse as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    /// The input exceeds the configured size limit.
    #[error("input is {size} bytes, limit is {limit}")]
    InputTooLarge { size: usize, limit: usize },

    /// `require_document` is set and the input has no `document` environment.
    #[error("invalid TeX document structure: no \\begin{{document}}")]
    MissingDocument,
}

/// Failure loading [`crate::Options`] from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
