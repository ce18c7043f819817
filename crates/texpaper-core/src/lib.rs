//! # texpaper core
//!
//! Converts the subset of LaTeX used in short articles into HTML.
//!
//! The transducer is staged: math is lifted out into placeholders first,
//! block environments are rewritten next, the remaining text is split into
//! paragraphs and normalized, and the math goes back in last. No stage after
//! protection can see math source, so none can corrupt it.
//!
//! ## Quick Start
//!
//! ```rust
//! use texpaper_core::Parser;
//!
//! let input = "\\section{Intro}\n\nSome $x+1=2$ text.\n\n\\begin{itemize}\\item one\\item two\\end{itemize}";
//! let mut parser = Parser::default();
//! let result = parser.parse(input).unwrap();
//!
//! assert!(result.html.contains("<h1>Intro</h1>"));
//! assert!(result.html.contains(r"<p>Some \(x+1=2\) text.</p>"));
//! assert!(result.html.contains("<ul><li>one</li><li>two</li></ul>"));
//! ```
//!
//! ## Error Recovery
//!
//! A construct that cannot be rendered degrades on its own and is reported;
//! the rest of the document renders normally:
//!
//! ```rust
//! use texpaper_core::Parser;
//!
//! let mut parser = Parser::default();
//! let result = parser.parse("\\textbf{unterminated\n\n\\section{Next} fine").unwrap();
//!
//! assert_eq!(result.errors.len(), 1);
//! assert!(result.html.contains("<h1>Next</h1>"));
//! ```
//!
//! Only a failure of the parse as a whole (input over the size limit, a
//! missing `document` environment when one is required) is a
//! [`FatalError`].

mod blocks;
pub mod commands;
pub mod config;
pub mod env;
pub mod error;
pub mod frontmatter;
pub mod lexer;
pub mod math;
mod normalize;
mod paragraph;
pub mod parser;
pub mod scanner;
pub mod span;

pub use commands::CommandTable;
pub use config::{load_options_from_yaml_file, load_options_from_yaml_str, CommandWrapper, Options};
pub use error::{ConfigError, FatalError, ParseError, ParseErrorKind, ParseErrors, Stage};
pub use math::MathStore;
pub use parser::{ParseResult, ParseStats, Parser};
pub use span::Span;
