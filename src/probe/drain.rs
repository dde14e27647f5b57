//! Response draining.
//!
//! Reads the response stream line by line and counts status lines. Reading
//! stops once every pipelined request has been answered, when the stream
//! ends, or when the read budget is spent. The budget is shared by all reads
//! on the connection, so a peer trickling short lines cannot hold it open
//! longer than one budget. Lines are capped in length, so a peer that never
//! sends a newline cannot grow the line buffer without bound.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::{self, Instant};
use tracing::trace;

/// Prefix of an HTTP/1.x status line.
const STATUS_LINE_PREFIX: &[u8] = b"HTTP/1";

/// Longest response line accepted, newline included.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Why draining stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every expected response arrived.
    Satisfied,
    /// A single read, or all reads together, exceeded the budget.
    TimedOut,
    /// The peer closed the stream.
    StreamEnded,
}

/// Read responses until `expected` status lines are seen.
///
/// Each read is bounded by what is left of `budget`, so the total time spent
/// reading never exceeds it. A line longer than [`MAX_LINE_LENGTH`] fails
/// with [`io::ErrorKind::InvalidData`].
pub async fn drain_responses<R>(
    reader: &mut R,
    expected: usize,
    budget: Duration,
) -> io::Result<DrainOutcome>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(256);
    let mut responses = 0;
    let mut spent = Duration::ZERO;

    loop {
        line.clear();

        let started = Instant::now();
        let mut limited = (&mut *reader).take(MAX_LINE_LENGTH as u64);
        let read = limited.read_until(b'\n', &mut line);
        let n = match time::timeout(budget.saturating_sub(spent), read).await {
            Ok(result) => result?,
            Err(_) => return Ok(DrainOutcome::TimedOut),
        };
        if n == 0 {
            return Ok(DrainOutcome::StreamEnded);
        }
        if n == MAX_LINE_LENGTH && line.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "response line too long",
            ));
        }

        spent += started.elapsed();
        if spent >= budget {
            trace!(?spent, responses, "Read budget spent");
            return Ok(DrainOutcome::TimedOut);
        }

        if line.starts_with(STATUS_LINE_PREFIX) {
            responses += 1;
            if responses == expected {
                return Ok(DrainOutcome::Satisfied);
            }
        }
    }
}
