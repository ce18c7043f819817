//! Integration tests for the worker thread, host and pool

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use texpaper_core::Options;
use texpaper_worker::{HostError, ParseWorker, WorkerHost, WorkerPool, WorkerRequest, WorkerResponse};

const SECTION: &str = "\\section{Part}\nSome $x$ text with \\emph{emphasis}.\n\n\
                       \\begin{itemize}\\item one\\item two\\end{itemize}\n\n";

fn flat() -> Options {
    Options {
        wrap_sections: false,
        ..Options::default()
    }
}

// ============================================================================
// Worker Thread Tests
// ============================================================================

#[test]
fn test_worker_answers_in_request_order() {
    let (tx, rx) = mpsc::channel();
    let worker = ParseWorker::spawn("ordered", flat(), move |response| {
        let _ = tx.send(response);
    })
    .unwrap();

    for i in 0..3 {
        worker
            .send(WorkerRequest::new(format!("r{i}"), format!("doc {i}")))
            .unwrap();
    }

    let ids: Vec<String> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(10)).unwrap().id().to_string())
        .collect();
    assert_eq!(ids, vec!["r0", "r1", "r2"]);
    worker.shutdown();
}

#[test]
fn test_worker_state_does_not_leak_between_requests() {
    let (tx, rx) = mpsc::channel();
    let worker = ParseWorker::spawn("fresh", flat(), move |response| {
        let _ = tx.send(response);
    })
    .unwrap();

    let doc = "a\\footnote{n} $y$";
    worker.send(WorkerRequest::new("first", doc)).unwrap();
    worker.send(WorkerRequest::new("second", doc)).unwrap();

    let first = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let (
        WorkerResponse::Success { html: a, .. },
        WorkerResponse::Success { html: b, .. },
    ) = (first, second)
    else {
        panic!("expected two successes");
    };
    assert_eq!(a, b);
    assert!(a.contains("<sup class=\"footnote-ref\">1</sup>"));
    worker.shutdown();
}

#[test]
fn test_failure_echoes_request_id() {
    let (tx, rx) = mpsc::channel();
    let options = Options {
        max_input_bytes: 8,
        ..Options::default()
    };
    let worker = ParseWorker::spawn("small", options, move |response| {
        let _ = tx.send(response);
    })
    .unwrap();

    worker
        .send(WorkerRequest::new("big-one", "far more than eight bytes"))
        .unwrap();
    let response = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(response.id(), "big-one");
    assert!(!response.is_success());
    worker.shutdown();
}

// ============================================================================
// Host Tests
// ============================================================================

#[tokio::test]
async fn test_host_parse() {
    let host = WorkerHost::new(flat());
    let rendered = host.parse(SECTION).await.unwrap();
    assert_eq!(
        rendered.html,
        "<h1>Part</h1><p>Some \\(x\\) text with <em>emphasis</em>.</p><ul><li>one</li><li>two</li></ul>"
    );
    assert!(rendered.diagnostics.is_empty());
    assert_eq!(host.pending(), 0);
}

#[tokio::test]
async fn test_host_correlates_concurrent_requests() {
    let host = WorkerHost::new(flat());
    let (a, b, c) = tokio::join!(
        host.parse("\\section{A}"),
        host.parse("\\section{B}"),
        host.parse("\\section{C}"),
    );
    assert_eq!(a.unwrap().html, "<h1>A</h1>");
    assert_eq!(b.unwrap().html, "<h1>B</h1>");
    assert_eq!(c.unwrap().html, "<h1>C</h1>");
}

#[tokio::test]
async fn test_host_reports_failures() {
    let host = WorkerHost::new(Options {
        max_input_bytes: 2,
        ..Options::default()
    });
    let err = host.parse("abc").await.unwrap_err();
    assert!(matches!(err, HostError::Parse { .. }));
    assert!(err.id().starts_with("texpaper-worker-"));
}

#[tokio::test]
async fn test_local_host_parses_on_caller() {
    let host = WorkerHost::local(flat());
    assert!(!host.is_busy());
    let rendered = host.parse("\\textbf{x}").await.unwrap();
    assert_eq!(rendered.html, "<p><strong>x</strong></p>");
    assert_eq!(rendered.id, "local-0");
}

#[tokio::test]
async fn test_timeout_forgets_the_request() {
    let host = WorkerHost::new(flat());
    let large = SECTION.repeat(20_000);

    let err = host
        .parse_with_timeout(large, Duration::from_millis(1))
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Timeout { .. }));
    assert_eq!(host.pending(), 0);

    // the worker keeps going and answers the next request after the slow one
    let rendered = host.parse("\\section{After}").await.unwrap();
    assert_eq!(rendered.html, "<h1>After</h1>");
}

// ============================================================================
// Pool Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_renders_every_document() {
    let pool = Arc::new(WorkerPool::new(3, flat()));
    assert_eq!(pool.len(), 3);

    let mut tasks = Vec::new();
    for i in 0..12 {
        let pool = Arc::clone(&pool);
        tasks.push(tokio::spawn(async move {
            pool.parse(format!("\\section{{Doc {i}}}")).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let rendered = task.await.unwrap().unwrap();
        assert_eq!(rendered.html, format!("<h1>Doc {i}</h1>"));
    }
}

#[tokio::test]
async fn test_pool_never_has_zero_workers() {
    let pool = WorkerPool::new(0, flat());
    assert_eq!(pool.len(), 1);
    assert!(pool.parse("x").await.is_ok());
    pool.shutdown();
}
