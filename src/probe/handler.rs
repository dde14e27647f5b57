//! Connection handler: one target, one connection, every step time-bounded.

use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time;
use tracing::{debug, trace};

use super::connector::Connector;
use super::drain::{drain_responses, DrainOutcome};
use crate::endpoint::Target;
use crate::template::{count_requests, RequestTemplate};

/// How the connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    /// No connection was established.
    NotConnected,
    /// Closed after a normal exchange.
    Clean,
    /// Closed after an earlier step timed out.
    AfterTimeout,
    /// Closing did not finish within the timeout.
    TimedOut,
}

/// Why the request/response exchange failed.
#[derive(Debug)]
pub enum ProbeError {
    ConnectTimeout,
    Connect(io::Error),
    FlushTimeout,
    Write(io::Error),
    Read(io::Error),
}

impl ProbeError {
    fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::ConnectTimeout | ProbeError::FlushTimeout)
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::ConnectTimeout => write!(f, "connect timed out"),
            ProbeError::Connect(e) => write!(f, "connect failed: {e}"),
            ProbeError::FlushTimeout => write!(f, "write timed out"),
            ProbeError::Write(e) => write!(f, "write failed: {e}"),
            ProbeError::Read(e) => write!(f, "read failed: {e}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Connect(e) | ProbeError::Write(e) | ProbeError::Read(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of one probe.
#[derive(Debug)]
pub struct ProbeReport {
    pub exchange: Result<DrainOutcome, ProbeError>,
    pub close: CloseStatus,
}

impl ProbeReport {
    /// Closing itself stalled; the caller decides how loudly to report it.
    pub fn escalate(&self) -> bool {
        self.close == CloseStatus::TimedOut
    }

    fn timed_out(&self) -> bool {
        match &self.exchange {
            Ok(outcome) => *outcome == DrainOutcome::TimedOut,
            Err(e) => e.is_timeout(),
        }
    }
}

/// Send the rendered template to `target` and drain the responses.
///
/// Failures never propagate: they are logged and recorded in the report.
pub async fn send_request<C: Connector>(
    connector: &C,
    target: &Target,
    template: &RequestTemplate,
    timeout: Duration,
) -> ProbeReport {
    let request = template.render(&target.host);
    let expected = count_requests(&request);

    let mut stream = match time::timeout(timeout, connector.connect(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return skipped(target, ProbeError::Connect(e)),
        Err(_) => return skipped(target, ProbeError::ConnectTimeout),
    };
    trace!(%target, expected, "Connected");

    let mut report = ProbeReport {
        exchange: exchange(&mut stream, &request, expected, timeout).await,
        close: CloseStatus::Clean,
    };
    match &report.exchange {
        Ok(outcome) => debug!(%target, ?outcome, "Responses drained"),
        Err(e) => debug!(%target, error = %e, "Request failed"),
    }

    report.close = match time::timeout(timeout, stream.shutdown()).await {
        Err(_) => CloseStatus::TimedOut,
        Ok(_) if report.timed_out() => CloseStatus::AfterTimeout,
        Ok(_) => CloseStatus::Clean,
    };
    report
}

fn skipped(target: &Target, error: ProbeError) -> ProbeReport {
    debug!(%target, error = %error, "Failed to connect");
    ProbeReport {
        exchange: Err(error),
        close: CloseStatus::NotConnected,
    }
}

async fn exchange<S>(
    stream: &mut S,
    request: &[u8],
    expected: usize,
    timeout: Duration,
) -> Result<DrainOutcome, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let write = async {
        stream.write_all(request).await?;
        stream.flush().await
    };
    match time::timeout(timeout, write).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ProbeError::Write(e)),
        Err(_) => return Err(ProbeError::FlushTimeout),
    }

    let mut reader = BufReader::new(stream);
    drain_responses(&mut reader, expected, timeout)
        .await
        .map_err(ProbeError::Read)
}
