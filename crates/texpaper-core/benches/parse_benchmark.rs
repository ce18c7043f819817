//! Parse throughput benchmarks
//!
//! Run with: cargo bench -p texpaper-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use texpaper_core::{CommandTable, MathStore, Parser};
use texpaper_core::scanner::Scanner;

/// Sample article
const ARTICLE_SAMPLE: &str = r"\documentclass{article}
\usepackage{amsmath}
\title{Benchmark Document \\ A Subtitle}
\author{A. Writer}
\begin{document}
\maketitle
\begin{abstract}
We measure how fast an article with $n$ sections renders.
\end{abstract}

\section{Introduction}
This is a paragraph with \emph{emphasis}, \textbf{strong text}, and \texttt{code}.
It cites \citep{knuth84, lamport94} and has a footnote\footnote{A \emph{short} note.}.
Prices such as $5 are not math, but $e^{i\pi} + 1 = 0$ is.

\subsection{Lists}
\begin{itemize}
\item First item with some content
\item Second item with \textbf{more} content
\begin{enumerate}
\item Nested step one
\item Nested step two
\end{enumerate}
\end{itemize}

\section{Results}
\begin{theorem}[Main]
For every $n \ge 1$,
\begin{align}
f(n) &= \sum_{k=1}^{n} k \\
     &= \frac{n(n+1)}{2}
\end{align}
\end{theorem}
\begin{proof}
By induction on $n$.
\end{proof}

\begin{table}
\centering
\caption{Timings}
\begin{tabular}{lrr}
\toprule
Name & Speed & Memory \\
\midrule
Fast & 100ms & 10MB \\
Medium & 500ms & 50MB \\
R\&D & 1000ms & 100MB \\
\bottomrule
\end{tabular}
\end{table}

\begin{quote}
The best code is no code at all.
\end{quote}

\begin{thebibliography}{9}
\bibitem{knuth84} D. Knuth. \newblock The \TeX book.
\bibitem{lamport94} L. Lamport.
\end{thebibliography}
\end{document}
";

/// The same body without a document wrapper, so it can be repeated.
fn body_sample() -> &'static str {
    let start = ARTICLE_SAMPLE.find("\\section").unwrap_or(0);
    let end = ARTICLE_SAMPLE.find("\\end{document}").unwrap_or(ARTICLE_SAMPLE.len());
    &ARTICLE_SAMPLE[start..end]
}

fn bench_article_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    // Set throughput for bytes/sec reporting
    group.throughput(Throughput::Bytes(ARTICLE_SAMPLE.len() as u64));

    group.bench_function("article", |b| {
        let mut parser = Parser::default();
        b.iter(|| {
            let result = parser.parse(black_box(ARTICLE_SAMPLE)).unwrap();
            black_box(result.html.len())
        })
    });

    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for size in [1, 5, 10, 20].iter() {
        let content: String = body_sample().repeat(*size);

        group.throughput(Throughput::Bytes(content.len() as u64));

        group.bench_with_input(BenchmarkId::new("sections", size), &content, |b, content| {
            let mut parser = Parser::default();
            b.iter(|| {
                let result = parser.parse(black_box(content)).unwrap();
                black_box(result.stats.sections)
            })
        });
    }

    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");

    let inline = r"This has \emph{emphasis}, \textbf{strong \emph{nested}}, \texttt{code} and \textsc{caps}.";
    let table = CommandTable::builtin();

    group.bench_function("inline_scanner", |b| {
        b.iter(|| {
            let out = Scanner::new(&table).scan(black_box(inline)).unwrap();
            black_box(out.len())
        })
    });

    group.bench_function("math_protect", |b| {
        b.iter(|| {
            let mut store = MathStore::new();
            let out = store.protect(black_box(ARTICLE_SAMPLE));
            black_box((out.len(), store.len()))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_article_parse, bench_scaling, bench_stages);
criterion_main!(benches);
