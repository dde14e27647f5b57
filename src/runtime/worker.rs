//! Worker pool.
//!
//! Each worker pulls jobs from the shared queue until it receives its
//! shutdown signal. Probes run as their own tasks so a panic inside one
//! is contained to that target.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::queue::WorkQueue;
use crate::endpoint::Target;
use crate::probe::{send_request, Connector};
use crate::template::RequestTemplate;

/// A queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Probe one target.
    Probe(Target),
    /// No more work for the worker that takes this.
    Shutdown,
}

/// Per-worker counters, returned when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub id: usize,
    pub probes: usize,
    pub close_timeouts: usize,
    pub panics: usize,
    pub shutdowns: usize,
}

/// Shared inputs of every worker.
struct WorkerContext<C> {
    queue: Arc<WorkQueue<Job>>,
    template: Arc<RequestTemplate>,
    connector: Arc<C>,
    timeout: Duration,
}

/// Running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
}

impl WorkerPool {
    /// Spawn `count` workers on the current runtime.
    pub fn start<C: Connector>(
        count: usize,
        queue: Arc<WorkQueue<Job>>,
        template: Arc<RequestTemplate>,
        connector: Arc<C>,
        timeout: Duration,
    ) -> Self {
        let context = Arc::new(WorkerContext {
            queue,
            template,
            connector,
            timeout,
        });

        let handles = (1..=count)
            .map(|id| {
                info!(worker = id, "Starting worker");
                tokio::spawn(run_worker(id, Arc::clone(&context)))
            })
            .collect();

        WorkerPool { handles }
    }

    /// Wait for every worker to stop.
    pub async fn join(self) -> Vec<WorkerStats> {
        let mut stats = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(worker) => stats.push(worker),
                Err(e) => error!(error = %e, "Worker terminated abnormally"),
            }
        }
        stats
    }
}

async fn run_worker<C: Connector>(id: usize, context: Arc<WorkerContext<C>>) -> WorkerStats {
    let mut stats = WorkerStats {
        id,
        ..WorkerStats::default()
    };

    loop {
        let target = match context.queue.get().await {
            Some(Job::Probe(target)) => target,
            Some(Job::Shutdown) => {
                stats.shutdowns += 1;
                context.queue.task_done();
                debug!(
                    worker = stats.id,
                    probes = stats.probes,
                    close_timeouts = stats.close_timeouts,
                    panics = stats.panics,
                    "Worker stopped"
                );
                return stats;
            }
            None => return stats,
        };

        debug!(worker = id, %target, queued = context.queue.queued(), "Sending request");
        let probe = {
            let context = Arc::clone(&context);
            let target = target.clone();
            tokio::spawn(async move {
                send_request(&*context.connector, &target, &context.template, context.timeout).await
            })
        };

        match probe.await {
            Ok(report) if report.escalate() => {
                stats.close_timeouts += 1;
                warn!(worker = id, %target, "Timed out closing connection");
            }
            Ok(_) => {}
            Err(e) => {
                stats.panics += 1;
                error!(worker = id, %target, error = %e, "Probe aborted");
            }
        }

        stats.probes += 1;
        context.queue.task_done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::io::DuplexStream;

    /// Panics on one host, refuses the rest.
    struct FlakyConnector;

    impl Connector for FlakyConnector {
        type Stream = DuplexStream;

        async fn connect(&self, target: &Target) -> io::Result<DuplexStream> {
            if target.host == "boom" {
                panic!("connector bug");
            }
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }

    #[tokio::test]
    async fn test_worker_survives_failures() {
        let queue = Arc::new(WorkQueue::new(4));
        let template = Arc::new(RequestTemplate::from_art("x").unwrap());
        let pool = WorkerPool::start(
            1,
            Arc::clone(&queue),
            template,
            Arc::new(FlakyConnector),
            Duration::from_secs(15),
        );

        queue.put(Job::Probe(Target::new("boom", "80"))).await.unwrap();
        queue.put(Job::Probe(Target::new("10.0.0.1", "80"))).await.unwrap();
        queue.put(Job::Shutdown).await.unwrap();
        queue.join().await;

        let stats = pool.join().await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].probes, 2);
        assert_eq!(stats[0].panics, 1);
        assert_eq!(stats[0].shutdowns, 1);
    }

    #[tokio::test]
    async fn test_each_worker_takes_one_shutdown() {
        let queue = Arc::new(WorkQueue::new(3));
        let template = Arc::new(RequestTemplate::from_art("x").unwrap());
        let pool = WorkerPool::start(
            3,
            Arc::clone(&queue),
            template,
            Arc::new(FlakyConnector),
            Duration::from_secs(15),
        );

        for _ in 0..3 {
            queue.put(Job::Shutdown).await.unwrap();
        }
        queue.join().await;

        let stats = pool.join().await;
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|worker| worker.shutdowns == 1));
    }
}
