//! Integration tests for the texpaper parser

use pretty_assertions::assert_eq;
use texpaper_core::{load_options_from_yaml_str, MathStore, Options, ParseErrorKind, Parser, Stage};

fn flat() -> Parser {
    Parser::new(Options {
        wrap_sections: false,
        ..Options::default()
    })
}

fn render(input: &str) -> String {
    let result = flat().parse(input).unwrap();
    let errors: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
    assert!(errors.is_empty(), "unexpected diagnostics: {errors:?}");
    result.html
}

// ============================================================================
// Math Protection Tests
// ============================================================================

#[test]
fn test_protect_restore_round_trip() {
    let inputs = [
        r"$$a$$ then \[b\] then \(c\) then $d$",
        r"$d$ then \(c\) then \[b\] then $$a$$",
        "mixed \\begin{equation}e=mc^2\\end{equation} and $x$ in one block",
        "\\begin{align*}\na &= b \\\\\nc &= d\n\\end{align*}\n\nafter $y_1$",
        "no math at all",
    ];
    for input in inputs {
        let mut store = MathStore::new();
        let protected = store.protect(input);
        assert_eq!(store.restore_verbatim(&protected), input);
    }
}

#[test]
fn test_currency_is_not_captured() {
    for input in ["$5$", "$5.00$", "$ $"] {
        let mut store = MathStore::new();
        store.protect(input);
        assert!(store.is_empty(), "{input} produced a placeholder");
    }

    let mut store = MathStore::new();
    assert_eq!(store.protect("$x^2$"), "__INLINE_MATH_0__");
    assert_eq!(store.len(), 1);
}

#[test]
fn test_inline_math_renders_with_paren_delimiters() {
    assert_eq!(render("Let $a<b$ hold."), r"<p>Let \(a&lt;b\) hold.</p>");
}

#[test]
fn test_display_math_is_not_wrapped_in_paragraph() {
    assert_eq!(
        render("Before\n\\[ x = 1 \\]\nafter."),
        r#"<p>Before</p><div class="article-equation">\[ x = 1 \]</div><p>after.</p>"#
    );
}

// ============================================================================
// Inline Scanner Tests
// ============================================================================

#[test]
fn test_nested_formatting() {
    assert_eq!(
        render(r"\textbf{outer \emph{inner} text}"),
        "<p><strong>outer <em>inner</em> text</strong></p>"
    );
    assert_eq!(
        render(r"\textbf{a \emph{b \texttt{c \textit{d}}}}"),
        "<p><strong>a <em>b <code>c <em>d</em></code></em></strong></p>"
    );
}

#[test]
fn test_unbalanced_brace_is_local() {
    let result = flat()
        .parse("\\section{First}\n\\textbf{unterminated\n\n\\section{Next}\nStill \\emph{fine}.")
        .unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors.count_kind(ParseErrorKind::UnbalancedBrace),
        1
    );
    assert!(result.html.contains("<h1>First</h1>"));
    assert!(result.html.contains("<p>unterminated</p>"));
    assert!(result
        .html
        .ends_with("<h1>Next</h1><p>Still <em>fine</em>.</p>"));
}

#[test]
fn test_strict_mode_degrades_fragment() {
    let mut parser = flat().with_recovery(false);
    let result = parser.parse(r"a \textbf{b").unwrap();
    assert_eq!(result.html, r#"<p><span class="tex-error">a b</span></p>"#);
    assert_eq!(result.errors.len(), 1);
}

#[test]
fn test_extra_commands_from_config() {
    let yaml = "wrap_sections: false\nextra_commands:\n  hl: { open: \"<mark>\", close: \"</mark>\" }\n";
    let mut parser = Parser::new(load_options_from_yaml_str(yaml).unwrap());
    let result = parser.parse(r"\hl{x} and \textbf{y}").unwrap();
    assert_eq!(result.html, "<p><mark>x</mark> and <strong>y</strong></p>");
}

// ============================================================================
// Heading Tests
// ============================================================================

#[test]
fn test_heading_levels() {
    assert_eq!(
        render("\\subsection{B}\n\\subsubsection*{C}\n\\paragraph{D} text"),
        "<h2>B</h2><h3>C</h3><h4>D</h4><p>text</p>"
    );
}

#[test]
fn test_heading_title_is_normalized() {
    assert_eq!(
        render(r"\section[Short]{A \emph{long} title}"),
        "<h1>A <em>long</em> title</h1>"
    );
}

#[test]
fn test_sections_are_wrapped_by_default() {
    let mut parser = Parser::default();
    let result = parser.parse("\\section{A}\nx\n\\section{B}\ny").unwrap();
    assert_eq!(
        result.html,
        "<div class=\"article-section\"><h1>A</h1><p>x</p></div>\
         <div class=\"article-section\"><h1>B</h1><p>y</p></div>"
    );
    assert_eq!(result.stats.sections, 2);
}

// ============================================================================
// Theorem Tests
// ============================================================================

#[test]
fn test_theorem_with_note() {
    assert_eq!(
        render(r"\begin{lemma}[Key]Every $n$ works.\end{lemma}"),
        r#"<div class="article-theorem"><div class="article-theorem-title">Lemma (Key)</div><p>Every \(n\) works.</p></div>"#
    );
}

#[test]
fn test_proof_has_its_own_class() {
    assert_eq!(
        render(r"\begin{proof}Trivial.\end{proof}"),
        r#"<div class="article-proof"><div class="article-theorem-title">Proof</div><p>Trivial.</p></div>"#
    );
}

#[test]
fn test_theorem_keeps_align_untouched() {
    let align = "\\begin{align}\na &= \\textbf{b} \\\\\nc &= \\cite{k}\n\\end{align}";
    let input = format!("\\begin{{theorem}}\nLet \\textbf{{x}}:\n{align}\n\\end{{theorem}}");
    let html = render(&input);
    assert_eq!(
        html,
        format!(
            "<div class=\"article-theorem\"><div class=\"article-theorem-title\">Theorem</div>\
             <p>Let <strong>x</strong>:</p><div class=\"article-equation\">{align}</div></div>"
        )
    );
}

// ============================================================================
// List Tests
// ============================================================================

#[test]
fn test_nested_lists() {
    assert_eq!(
        render(r"\begin{itemize}\item a\begin{itemize}\item b\end{itemize}\item c\end{itemize}"),
        "<ul><li>a <ul><li>b</li></ul></li><li>c</li></ul>"
    );
}

#[test]
fn test_description_list() {
    assert_eq!(
        render(r"\begin{description}\item[Term] Def.\item[Other] More.\end{description}"),
        "<dl><dt>Term</dt><dd>Def.</dd><dt>Other</dt><dd>More.</dd></dl>"
    );
}

#[test]
fn test_item_labels() {
    let input = r"\begin{enumerate}\item[a)] first\end{enumerate}";
    assert_eq!(
        render(input),
        r#"<ol><li><strong class="item-label">a)</strong> first</li></ol>"#
    );

    let mut parser = Parser::new(Options {
        wrap_sections: false,
        render_item_labels: false,
        ..Options::default()
    });
    assert_eq!(parser.parse(input).unwrap().html, "<ol><li>first</li></ol>");
}

#[test]
fn test_table_inside_list_item() {
    assert_eq!(
        render(r"\begin{itemize}\item a\begin{tabular}{l}x\end{tabular}\item b\end{itemize}"),
        r#"<ul><li>a <table class="article-table"><tr><th>x</th></tr></table></li><li>b</li></ul>"#
    );
}

#[test]
fn test_malformed_table_inside_list_item_is_reported() {
    let input = r"\begin{enumerate}\item \begin{table}no body\end{table}\end{enumerate}";
    let result = flat().parse(input).unwrap();
    assert_eq!(
        result.html,
        r#"<ol><li><div class="tex-error">Malformed table</div></li></ol>"#
    );
    assert_eq!(result.errors.by_stage(Stage::Tables).count(), 1);
}

// ============================================================================
// Table Tests
// ============================================================================

#[test]
fn test_escaped_ampersand_does_not_split_cells() {
    assert_eq!(
        render(r"\begin{tabular}{ll}A \& B & C \\\end{tabular}"),
        r#"<table class="article-table"><tr><th>A &amp; B</th><th>C</th></tr></table>"#
    );
}

#[test]
fn test_table_with_caption_and_multicolumn() {
    let input = r"\begin{table}\centering\caption{Scores}\begin{tabular}{|l|c|}\hline\multicolumn{2}{c}{Head}\\\hline x & 1\\\hline\end{tabular}\end{table}";
    assert_eq!(
        render(input),
        "<table class=\"article-table\"><caption>Scores</caption>\
         <tr><th colspan=\"2\">Head</th></tr><tr><td>x</td><td>1</td></tr></table>"
    );
}

#[test]
fn test_malformed_table_degrades_alone() {
    let input = "\\section{A}\n\n\\begin{itemize}\\item x\\end{itemize}\n\n\
                 \\begin{table}\\caption{Bad}\nno tabular here\n\\end{table}\n\n\\subsection{B}";
    let result = flat().parse(input).unwrap();
    assert_eq!(
        result.html,
        "<h1>A</h1><ul><li>x</li></ul><div class=\"tex-error\">Malformed table</div><h2>B</h2>"
    );
    assert_eq!(result.errors.len(), 1);
    let error = result.errors.iter().next().unwrap();
    assert_eq!(error.kind, ParseErrorKind::StageError);
    assert_eq!(error.stage, Stage::Tables);
    assert_eq!(result.errors.by_stage(Stage::Lists).count(), 0);
}

// ============================================================================
// Bibliography, Quote and Appendix Tests
// ============================================================================

#[test]
fn test_bibliography() {
    let input = "See \\cite{knuth}.\n\n\\begin{thebibliography}{9}\n\\bibitem[K84]{knuth} D. Knuth.\n\
                 \\bibitem{lamport} L. Lamport.\n\\end{thebibliography}";
    assert_eq!(
        render(input),
        "<p>See <a href=\"#ref-knuth\" class=\"citation\">[knuth]</a>.</p>\
         <div class=\"bibliography\"><h2>References</h2><ol>\
         <li id=\"ref-knuth\">D. Knuth.</li><li id=\"ref-lamport\">L. Lamport.</li></ol></div>"
    );
}

#[test]
fn test_bibliography_key_is_escaped() {
    let input = "\\begin{thebibliography}{9}\n\\bibitem{a\"b} Text.\n\\end{thebibliography}";
    assert_eq!(
        render(input),
        "<div class=\"bibliography\"><h2>References</h2><ol>\
         <li id=\"ref-a&quot;b\">Text.</li></ol></div>"
    );
}

#[test]
fn test_quote_renders_blocks_inside() {
    assert_eq!(
        render("\\begin{quote}Said.\n\nTwice.\\end{quote}"),
        "<blockquote><p>Said.</p><p>Twice.</p></blockquote>"
    );
}

#[test]
fn test_appendix_marker() {
    assert_eq!(
        render("\\appendix\n\\section{Extra}"),
        "<div class=\"appendix\"></div><h1>Extra</h1>"
    );
}

// ============================================================================
// Document Tests
// ============================================================================

#[test]
fn test_end_to_end_section() {
    let input = "\\section{Intro}\n\nSome $x+1=2$ text.\n\n\\begin{itemize}\\item one\\item two\\end{itemize}";
    let mut parser = Parser::default();
    let result = parser.parse(input).unwrap();
    assert!(result.is_ok());
    assert_eq!(
        result.html,
        "<div class=\"article-section\"><h1>Intro</h1><p>Some \\(x+1=2\\) text.</p>\
         <ul><li>one</li><li>two</li></ul></div>"
    );
}

#[test]
fn test_front_matter() {
    let input = "\\documentclass{article}\n\\title{On Tests}\n\\author{A. Writer}\n\\date{2024}\n\
                 \\begin{document}\n\\maketitle\n\\begin{abstract}\nShort $a$.\n\\end{abstract}\n\
                 \\section{One}\nText. % a comment\n\\end{document}\n";
    let result = flat().parse(input).unwrap();
    assert!(result.is_ok());
    assert_eq!(
        result.html,
        "<div class=\"article-title\">On Tests</div>\
         <div class=\"article-author\">A. Writer</div>\
         <div class=\"article-date\">2024</div>\
         <div class=\"article-abstract\"><strong>Abstract:</strong><p>Short \\(a\\).</p></div>\
         <h1>One</h1><p>Text.</p>"
    );
    assert_eq!(result.stats.sections, 1);
    assert_eq!(result.stats.inline_math, 1);
}

#[test]
fn test_render_returns_html_only() {
    let html = flat().render("\\section{A}\n\\textbf{broken").unwrap();
    assert_eq!(html, "<h1>A</h1><p>broken</p>");
}

#[test]
fn test_missing_document_when_required() {
    let mut parser = Parser::new(Options {
        require_document: true,
        ..Options::default()
    });
    assert!(parser.parse("just text").is_err());
}

#[test]
fn test_unclosed_environment_is_reported() {
    let result = flat().parse("\\begin{quote}never closed\n\nnext").unwrap();
    assert_eq!(
        result.errors.count_kind(ParseErrorKind::UnclosedEnvironment),
        1
    );
    assert!(result.html.contains("<p>next</p>"));
}

#[test]
fn test_footnotes_number_across_sections() {
    let result = flat()
        .parse("\\section{A}\na\\footnote{one}\n\\section{B}\nb\\footnote{two}")
        .unwrap();
    assert!(result
        .html
        .contains("b<sup class=\"footnote-ref\">2</sup><span class=\"footnote\">two</span>"));
    assert_eq!(result.stats.footnotes, 2);
}
