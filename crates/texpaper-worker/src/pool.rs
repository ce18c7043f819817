use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use texpaper_core::Options;
use tracing::debug;

use crate::error::HostError;
use crate::host::{Rendered, WorkerHost};

/// Several workers, one document per request.
///
/// Workers share nothing, so documents routed to different workers parse in
/// parallel and may finish in any order.
pub struct WorkerPool {
    hosts: Vec<WorkerHost>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Start `size` workers (at least one).
    pub fn new(size: usize, options: Options) -> Self {
        let hosts = (0..size.max(1))
            .map(|i| WorkerHost::with_name(format!("texpaper-worker-{i}"), options.clone()))
            .collect();
        Self {
            hosts,
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// An idle host when there is one, otherwise the next one in turn.
    fn pick(&self) -> &WorkerHost {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let len = self.hosts.len();
        let host = (0..len)
            .map(|offset| &self.hosts[(start + offset) % len])
            .find(|host| !host.is_busy())
            .unwrap_or(&self.hosts[start % len]);
        debug!(worker = %host.name(), "routing request");
        host
    }

    pub async fn parse(&self, source: impl Into<String>) -> Result<Rendered, HostError> {
        self.pick().parse(source).await
    }

    pub async fn parse_with_timeout(
        &self,
        source: impl Into<String>,
        timeout: Duration,
    ) -> Result<Rendered, HostError> {
        self.pick().parse_with_timeout(source, timeout).await
    }

    /// Stop every worker after its queued requests finish.
    pub fn shutdown(self) {
        for host in self.hosts {
            host.shutdown();
        }
    }
}
