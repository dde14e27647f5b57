//! pipespray: bounded-concurrency pipelined request sprayer
//!
//! Turns an ASCII-art file into a batch of pipelined HTTP requests, one per
//! art line, and sends the batch to every endpoint in a list:
//! - A fixed number of workers, each holding at most one connection
//! - Every network step bounded by the same timeout
//! - Connections close as soon as every request has been answered
//! - Configuration via CLI arguments or TOML file

mod config;
mod endpoint;
mod probe;
mod runtime;
mod template;

use std::path::Path;
use std::time::Duration;

use config::{Command, Config};
use endpoint::{count_endpoints, endpoint_lines, Target};
use probe::{send_request, TcpConnector};
use runtime::{Dispatcher, Progress};
use template::RequestTemplate;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Workers are multiplexed onto one thread; they only wait on I/O.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match config.command {
        Command::Run {
            endpoints,
            art,
            workers,
        } => rt.block_on(run(&endpoints, &art, usize::try_from(workers)?, config.timeout)),
        Command::SendTest { art, addr, port } => {
            rt.block_on(send_test(&art, addr, port, config.timeout))
        }
    }
}

/// Probe every endpoint in the list.
async fn run(
    endpoints: &Path,
    art: &Path,
    workers: usize,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(art).await?;
    let list = tokio::fs::read_to_string(endpoints).await?;
    let total = count_endpoints(&list);

    info!(
        endpoints = total,
        workers,
        requests = template.request_count(),
        timeout_secs = timeout.as_secs(),
        "Starting run"
    );

    let dispatcher = Dispatcher::new(TcpConnector, template, workers, timeout);
    let summary = dispatcher.run(Progress::new(endpoint_lines(&list), total)).await?;

    info!(
        tasks = summary.tasks,
        malformed = summary.malformed,
        close_timeouts = summary.workers.iter().map(|w| w.close_timeouts).sum::<usize>(),
        "Run complete"
    );
    Ok(())
}

/// Probe a single endpoint, for diagnostics.
async fn send_test(
    art: &Path,
    addr: String,
    port: u16,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let template = load_template(art).await?;
    let target = Target::new(addr, port.to_string());

    let report = send_request(&TcpConnector, &target, &template, timeout).await;
    match &report.exchange {
        Ok(outcome) => info!(%target, ?outcome, close = ?report.close, "Request sent"),
        Err(e) => info!(%target, error = %e, close = ?report.close, "Request failed"),
    }
    Ok(())
}

async fn load_template(path: &Path) -> Result<RequestTemplate, Box<dyn std::error::Error>> {
    let art = tokio::fs::read_to_string(path).await?;
    Ok(RequestTemplate::from_art(&art)?)
}
