//! Result collector.
//!
//! Drains samples in arrival order and writes one line per connection:
//! elapsed seconds on success, `Failed: <error>` otherwise.

use super::round_trip::RoundTripError;
use super::worker::Sample;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::trace;

/// Counts of what the collector saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Format the output line for one outcome, including the trailing newline.
pub fn format_line(outcome: &Result<Duration, RoundTripError>) -> String {
    match outcome {
        Ok(elapsed) => format!("{}\n", elapsed.as_secs_f64()),
        Err(e) => format!("Failed: {e}\n"),
    }
}

/// Consume samples until the channel is closed and drained.
///
/// Each line is flushed as soon as it is written. The sink is handed back
/// with the summary so callers can inspect or reuse it.
pub async fn collect<W>(
    mut results: mpsc::Receiver<Sample>,
    mut sink: W,
) -> io::Result<(W, Summary)>
where
    W: AsyncWrite + Unpin,
{
    let mut summary = Summary::default();

    while let Some(sample) = results.recv().await {
        match sample.outcome {
            Ok(_) => summary.succeeded += 1,
            Err(_) => summary.failed += 1,
        }
        sink.write_all(format_line(&sample.outcome).as_bytes()).await?;
        sink.flush().await?;
        trace!(connection = sample.connection, "Result written");
    }

    Ok((sink, summary))
}
