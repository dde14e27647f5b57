//! Dispatcher: feeds the worker pool from the endpoint list.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::queue::{QueueClosed, WorkQueue};
use super::worker::{Job, WorkerPool, WorkerStats};
use crate::endpoint::Target;
use crate::probe::Connector;
use crate::template::RequestTemplate;

/// Counts of what was dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Targets handed to workers.
    pub tasks: usize,
    /// Non-blank lines that did not parse.
    pub malformed: usize,
    /// Per-worker counters.
    pub workers: Vec<WorkerStats>,
}

pub struct Dispatcher<C> {
    connector: Arc<C>,
    template: Arc<RequestTemplate>,
    workers: usize,
    timeout: Duration,
}

impl<C: Connector> Dispatcher<C> {
    pub fn new(connector: C, template: RequestTemplate, workers: usize, timeout: Duration) -> Self {
        Dispatcher {
            connector: Arc::new(connector),
            template: Arc::new(template),
            workers: workers.max(1),
            timeout,
        }
    }

    /// Probe every endpoint in `lines` with at most `workers` connections in flight.
    ///
    /// Returns once every target and every shutdown signal has been handled.
    pub async fn run<I>(&self, lines: I) -> Result<DispatchSummary, QueueClosed>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let queue = Arc::new(WorkQueue::new(self.workers));
        let pool = WorkerPool::start(
            self.workers,
            Arc::clone(&queue),
            Arc::clone(&self.template),
            Arc::clone(&self.connector),
            self.timeout,
        );

        let mut summary = DispatchSummary::default();

        info!("Loading tasks to queue");
        for line in lines {
            let line = line.as_ref();
            match Target::parse(line) {
                Some(target) => {
                    queue.put(Job::Probe(target)).await?;
                    summary.tasks += 1;
                }
                None if !line.trim().is_empty() => summary.malformed += 1,
                None => {}
            }
        }

        info!(workers = self.workers, "Loading shutdown signals to queue");
        for _ in 0..self.workers {
            queue.put(Job::Shutdown).await?;
        }

        info!("Waiting for last requests");
        queue.join().await;

        summary.workers = pool.join().await;
        debug_assert!(summary.workers.iter().all(|w| w.shutdowns == 1));
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf};

    const TIMEOUT: Duration = Duration::from_secs(15);

    /// Open-connection gauge with a high-water mark.
    #[derive(Default)]
    struct Gauge {
        open: AtomicUsize,
        peak: AtomicUsize,
        connects: AtomicUsize,
    }

    /// Client stream that lowers the gauge when dropped.
    struct Tracked {
        inner: DuplexStream,
        gauge: Arc<Gauge>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.gauge.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AsyncRead for Tracked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Tracked {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    /// Hosts starting with `dead` never accept; everything else answers
    /// every request immediately.
    #[derive(Clone, Default)]
    struct FakeNet {
        gauge: Arc<Gauge>,
    }

    impl Connector for FakeNet {
        type Stream = Tracked;

        async fn connect(&self, target: &Target) -> io::Result<Tracked> {
            self.gauge.connects.fetch_add(1, Ordering::SeqCst);
            if target.host.starts_with("dead") {
                return pending().await;
            }

            let open = self.gauge.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.gauge.peak.fetch_max(open, Ordering::SeqCst);

            let (client, server) = tokio::io::duplex(64 * 1024);
            tokio::spawn(async move {
                let (reader, mut writer) = tokio::io::split(server);
                let mut lines = BufReader::new(reader).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.is_empty() {
                        let _ = writer.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
                    }
                }
            });
            Ok(Tracked {
                inner: client,
                gauge: Arc::clone(&self.gauge),
            })
        }
    }

    fn template() -> RequestTemplate {
        RequestTemplate::from_art("ab\nc").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_parses_and_counts() {
        let net = FakeNet::default();
        let dispatcher = Dispatcher::new(net.clone(), template(), 3, TIMEOUT);
        let lines = [
            "1.2.3.4:80",
            "",
            "1.2.3.4",
            "1.2.3.4:80:extra",
            "  5.6.7.8:8080  ",
            "   ",
        ];

        let summary = dispatcher.run(lines).await.unwrap();

        assert_eq!(summary.tasks, 2);
        assert_eq!(summary.malformed, 2);
        assert_eq!(net.gauge.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_workers() {
        let net = FakeNet::default();
        let dispatcher = Dispatcher::new(net.clone(), template(), 4, TIMEOUT);
        let lines: Vec<String> = (0..50).map(|i| format!("10.0.0.{i}:80")).collect();

        let summary = dispatcher.run(&lines).await.unwrap();

        assert_eq!(summary.tasks, 50);
        assert_eq!(net.gauge.connects.load(Ordering::SeqCst), 50);
        assert!(net.gauge.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(net.gauge.open.load(Ordering::SeqCst), 0);

        assert_eq!(summary.workers.len(), 4);
        assert!(summary.workers.iter().all(|w| w.shutdowns == 1));
        assert_eq!(summary.workers.iter().map(|w| w.probes).sum::<usize>(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_targets_do_not_stall_the_run() {
        let net = FakeNet::default();
        let dispatcher = Dispatcher::new(net.clone(), template(), 2, TIMEOUT);
        let lines = ["ok1:80", "ok2:80", "ok3:80", "dead4:80", "dead5:80"];

        let started = tokio::time::Instant::now();
        let summary = dispatcher.run(lines).await.unwrap();

        assert_eq!(summary.tasks, 5);
        assert_eq!(summary.workers.len(), 2);
        assert!(summary.workers.iter().all(|w| w.shutdowns == 1));
        assert_eq!(summary.workers.iter().map(|w| w.probes).sum::<usize>(), 5);
        // Both dead targets time out side by side, one budget in total.
        assert!(started.elapsed() >= TIMEOUT);
        assert!(started.elapsed() < TIMEOUT * 2);
    }

    #[tokio::test]
    async fn test_empty_list() {
        let dispatcher = Dispatcher::new(FakeNet::default(), template(), 2, TIMEOUT);
        let summary = dispatcher.run(Vec::<String>::new()).await.unwrap();

        assert_eq!(summary.tasks, 0);
        assert_eq!(summary.workers.len(), 2);
    }
}
