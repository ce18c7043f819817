//! Block environment stages.
//!
//! Each stage rewrites one family of constructs into HTML and leaves
//! everything else alone. The order is fixed: headings, theorem-like
//! environments, lists, tables, bibliography, quotes, appendix. Theorem and
//! quote bodies are rendered recursively through the same stages, so a list
//! inside a theorem is handled by the list stage of the nested run.
//!
//! Every stage surrounds its output with blank lines, which is what makes
//! the paragraph assembler treat it as a fragment of its own.

use std::sync::LazyLock;

use memchr::memchr;
use regex::Regex;
use tracing::debug;

use crate::env::{find_env, rewrite_envs, EnvMatch, EnvScan};
use crate::error::{ParseError, Stage};
use crate::normalize::{escape_attr, normalize};
use crate::paragraph::assemble;
use crate::parser::Context;
use crate::scanner::{braced_arg, bracket_arg, command_name_len, find_command};

/// Theorem-like environment kinds, without the optional `*`.
pub(crate) const THEOREM_KINDS: &[&str] = &[
    "theorem",
    "definition",
    "lemma",
    "corollary",
    "proposition",
    "proof",
    "remark",
    "example",
    "claim",
    "fact",
    "observation",
    "note",
];

static RE_TABLE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(?:hline|toprule|midrule|bottomrule|centering)\b|\\(?:cline|label)\s*\{[^}]*\}|\\cmidrule\s*(?:\([^)]*\))?\s*\{[^}]*\}|\\addlinespace\b(?:\s*\[[^\]]*\])?",
    )
    .expect("valid table rule regex")
});
static RE_BIB_COMMANDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:bibliographystyle|bibliography)\s*\{[^}]*\}").expect("valid bibliography regex")
});

/// Run every block stage over `text`.
pub(crate) fn process(ctx: &mut Context<'_>, text: &str) -> String {
    let text = headings(ctx, text);
    let text = theorems(ctx, &text);
    let text = lists(ctx, &text);
    let text = tables(ctx, &text);
    let text = bibliography(ctx, &text);
    let text = quotes(ctx, &text);
    appendix(&text)
}

/// Run the block stages and assemble paragraphs.
pub(crate) fn render_blocks(ctx: &mut Context<'_>, text: &str) -> String {
    let text = process(ctx, text);
    assemble(ctx, &text)
}

fn block(html: String) -> String {
    format!("\n\n{html}\n\n")
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "section" => Some(1),
        "subsection" => Some(2),
        "subsubsection" => Some(3),
        "paragraph" => Some(4),
        _ => None,
    }
}

/// `\section{T}` → `<h1>T</h1>`, down to `\paragraph` → `<h4>`.
pub(crate) fn headings(ctx: &mut Context<'_>, text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;
    let mut count = 0usize;

    while let Some(rel) = memchr(b'\\', &bytes[pos..]) {
        let at = pos + rel;
        let name_len = command_name_len(bytes, at + 1);
        if name_len == 0 {
            pos = (at + 2).min(bytes.len());
            continue;
        }
        let name_end = at + 1 + name_len;
        let Some(level) = heading_level(&text[at + 1..name_end]) else {
            pos = name_end;
            continue;
        };

        let mut arg = name_end;
        if bytes.get(arg) == Some(&b'*') {
            arg += 1;
        }
        if let Some((_, next)) = bracket_arg(text, arg) {
            arg = next;
        }

        match braced_arg(text, arg) {
            Ok(Some((title, next))) => {
                out.push_str(&text[copied..at]);
                let title = normalize(ctx, title.slice(text));
                out.push_str(&block(format!("<h{level}>{title}</h{level}>")));
                copied = next;
                pos = next;
                count += 1;
            }
            Ok(None) => pos = name_end,
            Err(_) => {
                ctx.errors
                    .push(ParseError::unbalanced_brace(Stage::Headings, text, at));
                pos = name_end;
            }
        }
    }

    out.push_str(&text[copied..]);
    if count > 0 {
        debug!(count, "headings");
    }
    out
}

fn is_theorem(name: &str) -> bool {
    THEOREM_KINDS.contains(&name.strip_suffix('*').unwrap_or(name))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Theorem-like environments become a titled box.
pub(crate) fn theorems(ctx: &mut Context<'_>, text: &str) -> String {
    let (out, errors) = rewrite_envs(text, Stage::Theorems, is_theorem, |env| {
        let kind = env.base_name();
        let (note, body) = env.optional_arg();

        let mut title = capitalize(kind);
        if let Some(note) = note {
            title = format!("{title} ({})", normalize(ctx, note));
        }
        let class = if kind == "proof" {
            "article-proof"
        } else {
            "article-theorem"
        };
        let body = render_blocks(ctx, body.trim());

        block(format!(
            "<div class=\"{class}\"><div class=\"article-theorem-title\">{title}</div>{body}</div>"
        ))
    });
    ctx.errors.extend(errors);
    out
}

struct Item<'a> {
    label: Option<&'a str>,
    text: &'a str,
}

/// Split a list body on top-level `\item`. Anything before the first item
/// is dropped.
fn split_items(body: &str) -> Vec<Item<'_>> {
    let mut starts = Vec::new();
    let mut pos = 0;
    while let Some(at) = find_command(body, "item", pos) {
        starts.push(at);
        pos = at + "\\item".len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &at)| {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            let scope = &body[..end];
            let content = at + "\\item".len();
            match bracket_arg(scope, content) {
                Some((label, next)) => Item {
                    label: Some(label.slice(scope)),
                    text: &scope[next..],
                },
                None => Item {
                    label: None,
                    text: &scope[content..],
                },
            }
        })
        .collect()
}

/// `itemize`, `enumerate` and `description`. Nested lists and tables are
/// rendered before the items of the list holding them are split.
pub(crate) fn lists(ctx: &mut Context<'_>, text: &str) -> String {
    let (out, errors) = rewrite_envs(
        text,
        Stage::Lists,
        |name| matches!(name, "itemize" | "enumerate" | "description"),
        |env| {
            let body = lists(ctx, env.body);
            let body = tables(ctx, &body);
            let items = split_items(&body);
            let mut html = String::new();

            if env.name == "description" {
                html.push_str("<dl>");
                for item in items {
                    let term = item.label.map(|l| normalize(ctx, l)).unwrap_or_default();
                    let definition = normalize(ctx, item.text);
                    html.push_str(&format!("<dt>{term}</dt><dd>{definition}</dd>"));
                }
                html.push_str("</dl>");
            } else {
                let tag = if env.name == "enumerate" { "ol" } else { "ul" };
                html.push_str(&format!("<{tag}>"));
                for item in items {
                    let lead = match item.label {
                        Some(label) if ctx.options.render_item_labels => format!(
                            "<strong class=\"item-label\">{}</strong> ",
                            normalize(ctx, label)
                        ),
                        _ => String::new(),
                    };
                    let content = normalize(ctx, item.text);
                    if lead.is_empty() && content.is_empty() {
                        continue;
                    }
                    html.push_str(&format!("<li>{lead}{content}</li>"));
                }
                html.push_str(&format!("</{tag}>"));
            }

            block(html)
        },
    );
    ctx.errors.extend(errors);
    out
}

fn is_tabular(name: &str) -> bool {
    matches!(name, "tabular" | "tabular*")
}

/// `table` floats and bare `tabular` environments.
pub(crate) fn tables(ctx: &mut Context<'_>, text: &str) -> String {
    let (out, errors) = rewrite_envs(
        text,
        Stage::Tables,
        |name| matches!(name, "table" | "table*") || is_tabular(name),
        |env| {
            if is_tabular(env.name) {
                block(render_tabular(ctx, env, None))
            } else {
                render_float(ctx, env)
            }
        },
    );
    ctx.errors.extend(errors);
    out
}

fn render_float(ctx: &mut Context<'_>, env: &EnvMatch<'_>) -> String {
    let (caption, body) = take_caption(ctx, env.body);

    match find_env(&body, 0, is_tabular) {
        Some(EnvScan::Found(tabular)) => block(render_tabular(ctx, &tabular, caption.as_deref())),
        _ => {
            ctx.errors.push(
                ParseError::stage_error(Stage::Tables, "table has no complete tabular body")
                    .with_context(env.body.trim()),
            );
            block("<div class=\"tex-error\">Malformed table</div>".to_string())
        }
    }
}

/// Remove the first `\caption{…}` from a float body, returning the
/// normalized caption and what is left of the body.
fn take_caption(ctx: &mut Context<'_>, body: &str) -> (Option<String>, String) {
    let Some(at) = find_command(body, "caption", 0) else {
        return (None, body.to_string());
    };
    let mut arg = at + "\\caption".len();
    if let Some((_, next)) = bracket_arg(body, arg) {
        arg = next;
    }
    match braced_arg(body, arg) {
        Ok(Some((caption, next))) => {
            let caption = normalize(ctx, caption.slice(body));
            (Some(caption), format!("{}{}", &body[..at], &body[next..]))
        }
        _ => (None, body.to_string()),
    }
}

fn skip_group(text: &str) -> &str {
    match braced_arg(text, 0) {
        Ok(Some((_, next))) => &text[next..],
        _ => text,
    }
}

fn render_tabular(ctx: &mut Context<'_>, env: &EnvMatch<'_>, caption: Option<&str>) -> String {
    // `tabular*` takes a width before the column format
    let (_, rows) = env.required_arg();
    let rows = if env.name == "tabular*" {
        skip_group(rows)
    } else {
        rows
    };
    let rows = RE_TABLE_NOISE.replace_all(rows, "");

    let mut html = String::from("<table class=\"article-table\">");
    if let Some(caption) = caption {
        html.push_str(&format!("<caption>{caption}</caption>"));
    }

    let mut first = true;
    for row in split_rows(&rows) {
        if row.trim().is_empty() {
            continue;
        }
        let tag = if first { "th" } else { "td" };
        first = false;

        html.push_str("<tr>");
        for cell in split_cells(row) {
            let (span, content) = multicolumn(cell.trim());
            let content = normalize(ctx, content);
            match span {
                Some(n) => html.push_str(&format!("<{tag} colspan=\"{n}\">{content}</{tag}>")),
                None => html.push_str(&format!("<{tag}>{content}</{tag}>")),
            }
        }
        html.push_str("</tr>");
    }

    html.push_str("</table>");
    html
}

/// Split a tabular body into rows on `\\` outside brace groups. A spacing
/// argument after the break (`\\[2pt]`) goes with it.
fn split_rows(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut rows = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if depth == 0 && bytes.get(i + 1) == Some(&b'\\') => {
                rows.push(&text[start..i]);
                i += 2;
                if let Some((_, next)) = bracket_arg(text, i) {
                    i = next;
                }
                start = i;
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        rows.push(&text[start..]);
    }
    rows
}

/// Split a row into cells on unescaped `&` outside brace groups.
fn split_cells(row: &str) -> Vec<&str> {
    let bytes = row.as_bytes();
    let mut cells = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'&' if depth == 0 => {
                cells.push(&row[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    cells.push(&row[start.min(row.len())..]);
    cells
}

/// `\multicolumn{n}{align}{text}` → (`Some(n)`, `text`).
fn multicolumn(cell: &str) -> (Option<usize>, &str) {
    let Some(args) = cell.strip_prefix("\\multicolumn") else {
        return (None, cell);
    };
    let Ok(Some((count, next))) = braced_arg(args, 0) else {
        return (None, cell);
    };
    let span = count.slice(args).trim().parse::<usize>().ok();
    let rest = skip_group(&args[next..]);
    let Ok(Some((content, _))) = braced_arg(rest, 0) else {
        return (None, cell);
    };
    (span, content.slice(rest))
}

/// `thebibliography` → a numbered reference list whose items carry
/// `ref-<key>` ids for citation links.
pub(crate) fn bibliography(ctx: &mut Context<'_>, text: &str) -> String {
    let text = RE_BIB_COMMANDS.replace_all(text, "");
    let (out, errors) = rewrite_envs(
        &text,
        Stage::Bibliography,
        |name| name == "thebibliography",
        |env| {
            let (_, body) = env.required_arg();
            let mut starts = Vec::new();
            let mut pos = 0;
            while let Some(at) = find_command(body, "bibitem", pos) {
                starts.push(at);
                pos = at + "\\bibitem".len();
            }

            let mut html = String::from("<div class=\"bibliography\"><h2>References</h2><ol>");
            for (i, &at) in starts.iter().enumerate() {
                let end = starts.get(i + 1).copied().unwrap_or(body.len());
                let entry = &body[..end];
                let mut next = at + "\\bibitem".len();
                if let Some((_, after)) = bracket_arg(entry, next) {
                    next = after;
                }
                let key = match braced_arg(entry, next) {
                    Ok(Some((key, after))) => {
                        next = after;
                        Some(key.slice(entry).trim())
                    }
                    _ => None,
                };
                let content = normalize(ctx, &entry[next..]);
                match key {
                    Some(key) => html.push_str(&format!(
                        "<li id=\"ref-{}\">{content}</li>",
                        escape_attr(key)
                    )),
                    None => html.push_str(&format!("<li>{content}</li>")),
                }
            }
            html.push_str("</ol></div>");

            block(html)
        },
    );
    ctx.errors.extend(errors);
    out
}

/// The abstract box, shared with the front matter.
pub(crate) fn abstract_html(body: &str) -> String {
    format!("<div class=\"article-abstract\"><strong>Abstract:</strong>{body}</div>")
}

/// `quote` and `quotation` → `<blockquote>`; an `abstract` that was not
/// lifted into the front matter gets the abstract box.
pub(crate) fn quotes(ctx: &mut Context<'_>, text: &str) -> String {
    let (out, errors) = rewrite_envs(
        text,
        Stage::Quotes,
        |name| matches!(name, "quote" | "quotation" | "abstract"),
        |env| {
            let body = render_blocks(ctx, env.body.trim());
            if env.name == "abstract" {
                block(abstract_html(&body))
            } else {
                block(format!("<blockquote>{body}</blockquote>"))
            }
        },
    );
    ctx.errors.extend(errors);
    out
}

/// A bare `\appendix` becomes an empty marker div.
pub(crate) fn appendix(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;
    while let Some(at) = find_command(text, "appendix", pos) {
        out.push_str(&text[copied..at]);
        out.push_str(&block("<div class=\"appendix\"></div>".to_string()));
        copied = at + "\\appendix".len();
        pos = copied;
    }
    out.push_str(&text[copied..]);
    out
}
