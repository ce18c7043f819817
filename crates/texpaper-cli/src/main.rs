//! texpaper CLI - render, validate and inspect LaTeX articles
//!
//! Usage:
//!   texpaper [OPTIONS] <COMMAND>
//!
//! Commands:
//!   render    Render one or more files to HTML
//!   validate  Check a file for diagnostics
//!   stats     Show document statistics

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser as ClapParser, Subcommand};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use texpaper_core::{load_options_from_yaml_file, Options, ParseResult, Parser};
use texpaper_worker::{Diagnostic, Rendered, WorkerPool};
use tokio::task::JoinSet;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(version, about = "texpaper - LaTeX article to HTML", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML file with parser options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one or more files to HTML
    Render {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file, or a directory when rendering several files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Number of worker threads
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
        workers: u16,
    },
    /// Check a file for diagnostics; fails if any were recorded
    Validate {
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show document statistics
    Stats { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = match &cli.config {
        Some(path) => load_options_from_yaml_file(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to load config '{}'", path.display()))?,
        None => Options::default(),
    };

    match cli.command {
        Commands::Render {
            files,
            output,
            json,
            workers,
        } => cmd_render(files, output, json, usize::from(workers), options).await,
        Commands::Validate { file, json } => cmd_validate(&file, json, options),
        Commands::Stats { file } => cmd_stats(&file, options),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read '{}'", path.display()))
}

fn parse_file(path: &Path, options: Options) -> Result<ParseResult> {
    let input = read_source(path)?;
    Parser::new(options)
        .parse(&input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse '{}'", path.display()))
}

// =============================================================================
// Render Command
// =============================================================================

#[derive(Serialize)]
struct JsonRendered<'a> {
    file: String,
    id: &'a str,
    html: &'a str,
    diagnostics: &'a [Diagnostic],
}

async fn cmd_render(
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
    workers: usize,
    options: Options,
) -> Result<()> {
    let pool = Arc::new(WorkerPool::new(workers.min(files.len()), options));
    debug!(workers = pool.len(), files = files.len(), "rendering");

    let mut tasks = JoinSet::new();
    for (index, path) in files.iter().cloned().enumerate() {
        let source = read_source(&path)?;
        let pool = Arc::clone(&pool);
        tasks.spawn(async move { (index, pool.parse(source).await) });
    }

    // completion order is arbitrary; restore input order
    let mut results: Vec<Option<Rendered>> = vec![None; files.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.into_diagnostic()?;
        let rendered = result
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to render '{}'", files[index].display()))?;
        results[index] = Some(rendered);
    }
    let rendered: Vec<Rendered> = results.into_iter().flatten().collect();

    for (path, doc) in files.iter().zip(&rendered) {
        for diagnostic in &doc.diagnostics {
            eprintln!(
                "warning: {}: [{}] {}",
                path.display(),
                diagnostic.stage,
                diagnostic.message
            );
        }
    }

    if json {
        let docs: Vec<JsonRendered<'_>> = files
            .iter()
            .zip(&rendered)
            .map(|(path, doc)| JsonRendered {
                file: path.display().to_string(),
                id: &doc.id,
                html: &doc.html,
                diagnostics: &doc.diagnostics,
            })
            .collect();
        let text = serde_json::to_string_pretty(&docs).into_diagnostic()?;
        return write_output(output.as_deref(), &text);
    }

    match (output, rendered.as_slice()) {
        (Some(dir), docs) if docs.len() > 1 => {
            fs::create_dir_all(&dir).into_diagnostic()?;
            for (path, doc) in files.iter().zip(docs) {
                let stem = path
                    .file_stem()
                    .ok_or_else(|| miette!("'{}' has no file name", path.display()))?;
                let target = dir.join(stem).with_extension("html");
                write_output(Some(&target), &doc.html)?;
            }
            Ok(())
        }
        (output, docs) => {
            let html: Vec<&str> = docs.iter().map(|d| d.html.as_str()).collect();
            write_output(output.as_deref(), &html.join("\n"))
        }
    }
}

fn write_output(target: Option<&Path>, text: &str) -> Result<()> {
    match target {
        Some(path) => fs::write(path, format!("{text}\n"))
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write '{}'", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

// =============================================================================
// Validate Command
// =============================================================================

fn cmd_validate(file: &Path, json: bool, options: Options) -> Result<()> {
    let result = parse_file(file, options)?;

    if json {
        let errors: Vec<_> = result
            .errors
            .iter()
            .map(|e| {
                serde_json::json!({
                    "stage": e.stage.as_str(),
                    "kind": e.kind.as_str(),
                    "message": e.message,
                    "context": e.context,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({"valid": result.errors.is_empty(), "errors": errors})
        );
    } else if result.errors.is_empty() {
        println!("Valid: no errors found");
    } else {
        eprintln!("Invalid: {} error(s) found", result.errors.len());
        for error in result.errors.iter() {
            match &error.context {
                Some(context) => eprintln!("  - {error}\n      near: {context}"),
                None => eprintln!("  - {error}"),
            }
        }
    }

    if result.errors.is_empty() {
        Ok(())
    } else {
        Err(miette!("{} error(s) found", result.errors.len()))
    }
}

// =============================================================================
// Stats Command
// =============================================================================

fn cmd_stats(file: &Path, options: Options) -> Result<()> {
    let input = read_source(file)?;
    let result = Parser::new(options)
        .parse(&input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse '{}'", file.display()))?;
    let stats = result.stats;

    println!("Document Statistics");
    println!("-------------------");
    println!("Content:");
    println!("  Sections:       {}", stats.sections);
    println!("  Display math:   {}", stats.display_math);
    println!("  Inline math:    {}", stats.inline_math);
    println!("  Footnotes:      {}", stats.footnotes);
    println!("  Citations:      {}", stats.citations);
    println!();
    println!("Size:");
    println!("  Source bytes:   {}", input.len());
    println!("  Words (est.):   {}", input.split_whitespace().count());
    println!("  Lines:          {}", input.lines().count());
    println!("  HTML bytes:     {}", result.html.len());
    println!();
    println!("Errors:         {}", result.errors.len());

    Ok(())
}
