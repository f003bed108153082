//! Connection worker.
//!
//! One worker drives one connection: wait for the start signal, dial, run
//! the round trips and report exactly one `Sample`.

use super::completion::CompletionGuard;
use super::payload::Payload;
use super::round_trip::{round_trip, RoundTripError};
use super::signal::Listener;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Outcome of one connection.
#[derive(Debug)]
pub struct Sample {
    /// Index of the worker that produced this sample.
    pub connection: usize,
    /// Measured round-trip time, or why there is none.
    pub outcome: Result<Duration, RoundTripError>,
}

pub(crate) struct Worker {
    pub id: usize,
    pub addr: Arc<str>,
    pub payload: Payload,
    pub round_trips: usize,
    pub start: Listener,
    pub stop: Listener,
    pub results: mpsc::Sender<Sample>,
    pub done: CompletionGuard,
}

impl Worker {
    /// Run to completion and report the result.
    ///
    /// The completion guard is dropped only after the sample has been
    /// handed to the channel.
    pub async fn run(mut self) {
        let mut stop = self.stop.clone();
        let outcome = tokio::select! {
            biased;
            _ = stop.fired() => Err(RoundTripError::Cancelled),
            outcome = self.exchange() => outcome,
        };

        match &outcome {
            Ok(elapsed) => trace!(connection = self.id, ?elapsed, "Connection finished"),
            Err(e) => debug!(
                connection = self.id,
                transport = e.is_transport(),
                error = %e,
                "Connection failed"
            ),
        }

        let sample = Sample {
            connection: self.id,
            outcome,
        };
        if self.results.send(sample).await.is_err() {
            debug!(connection = self.id, "Result collector gone, dropping sample");
        }
        drop(self.done);
    }

    async fn exchange(&mut self) -> Result<Duration, RoundTripError> {
        self.start
            .wait()
            .await
            .map_err(|_| RoundTripError::Cancelled)?;

        // Closed when dropped, on every return path.
        let mut stream = TcpStream::connect(&*self.addr)
            .await
            .map_err(RoundTripError::Dial)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = self.id, error = %e, "Failed to set TCP_NODELAY");
        }

        round_trip(&mut stream, self.round_trips, &self.payload).await
    }
}
