//! Benchmark orchestrator.
//!
//! A run moves through three phases, each a distinct type:
//!
//! 1. `Benchmark::connect` generates the payload and spawns one worker per
//!    connection. Workers park on the start signal; nothing is dialed yet.
//! 2. `Connected::start` launches the result collector, then fires the
//!    start signal once, releasing every worker together.
//! 3. `Running::wait` resolves when every worker has reported and exited.
//!    `Running::finish` additionally joins the collector.
//!
//! Completion is tracked by a counter that is independent of the results
//! channel: "all workers finished" and "all results written" are separate
//! events. The channel closes on its own once the last worker drops its
//! sender.

mod collector;
mod completion;
mod payload;
mod round_trip;
mod signal;
mod worker;

pub use collector::Summary;

use collector::collect;
use completion::CompletionCounter;
use payload::Payload;
use signal::{signal, Trigger};
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};
use worker::{Sample, Worker};

/// Immutable parameters of one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Server address, `host:port`.
    pub addr: String,
    /// Number of concurrent connections.
    pub connections: usize,
    /// Round trips per connection, at least one.
    pub round_trips: usize,
}

impl BenchConfig {
    pub fn new(addr: impl Into<String>, connections: usize, round_trips: usize) -> Self {
        let round_trips = if round_trips == 0 {
            warn!("Round trips per connection must be at least 1, using 1");
            1
        } else {
            round_trips
        };

        BenchConfig {
            addr: addr.into(),
            connections,
            round_trips,
        }
    }
}

/// Fatal benchmark errors. Per-connection failures are never reported here.
#[derive(Debug)]
pub enum BenchError {
    /// The OS entropy source could not produce a payload.
    Entropy(rand::Error),
    /// Writing to the output sink failed.
    Output(io::Error),
    /// The collector task panicked or was aborted.
    Collector(JoinError),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Entropy(e) => write!(f, "Failed to generate payload: {}", e),
            BenchError::Output(e) => write!(f, "Failed to write results: {}", e),
            BenchError::Collector(e) => write!(f, "Result collector failed: {}", e),
        }
    }
}

impl std::error::Error for BenchError {}

/// Final outcome of a run.
#[derive(Debug)]
pub struct Report<W> {
    /// The output sink, returned after the last line was flushed.
    pub sink: W,
    pub summary: Summary,
}

/// A configured run that has not spawned anything yet.
pub struct Benchmark<W> {
    config: BenchConfig,
    sink: W,
}

impl<W> Benchmark<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(config: BenchConfig, sink: W) -> Self {
        Benchmark { config, sink }
    }

    /// Spawn one idle worker per connection.
    ///
    /// Only fails if the payload cannot be generated. Must be called from
    /// within a tokio runtime.
    pub fn connect(self) -> Result<Connected<W>, BenchError> {
        let payload = Payload::generate().map_err(BenchError::Entropy)?;

        let (start, start_listener) = signal();
        let (stop, stop_listener) = signal();
        let (tx, rx) = mpsc::channel(self.config.connections.max(1));
        let completion = CompletionCounter::new();
        let addr: Arc<str> = Arc::from(self.config.addr.as_str());

        for id in 0..self.config.connections {
            let worker = Worker {
                id,
                addr: Arc::clone(&addr),
                payload: payload.clone(),
                round_trips: self.config.round_trips,
                start: start_listener.clone(),
                stop: stop_listener.clone(),
                results: tx.clone(),
                done: completion.register(),
            };
            tokio::spawn(worker.run());
        }

        info!(
            connections = self.config.connections,
            round_trips = self.config.round_trips,
            addr = %self.config.addr,
            "Workers ready"
        );

        Ok(Connected {
            start,
            stop,
            results: rx,
            completion,
            sink: self.sink,
        })
    }
}

/// Workers are spawned and parked on the start signal.
///
/// Dropping this without calling `start` releases the workers with
/// `RoundTripError::Cancelled`.
pub struct Connected<W> {
    start: Trigger,
    stop: Trigger,
    results: Receiver<Sample>,
    completion: CompletionCounter,
    sink: W,
}

impl<W> Connected<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Start the collector, then release every worker at once.
    pub fn start(self) -> Running<W> {
        let collector = tokio::spawn(collect(self.results, self.sink));
        self.start.fire();
        info!("Benchmark started");

        Running {
            stop: Some(self.stop),
            completion: self.completion,
            collector,
        }
    }
}

/// Workers are running and the collector is draining results.
pub struct Running<W> {
    stop: Option<Trigger>,
    completion: CompletionCounter,
    collector: JoinHandle<io::Result<(W, Summary)>>,
}

impl<W> Running<W> {
    /// Wait until every worker has reported and exited.
    pub async fn wait(&self) {
        self.completion.wait().await;
        debug!("All workers finished");
    }

    /// Number of workers still running.
    pub fn outstanding(&self) -> usize {
        self.completion.remaining()
    }

    /// Ask workers to abandon their exchanges. Later calls do nothing.
    ///
    /// Workers that already reported are unaffected; the rest report
    /// `RoundTripError::Cancelled`.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            info!(outstanding = self.outstanding(), "Stopping benchmark");
            stop.fire();
        }
    }

    /// Wait for the workers, then for the collector to drain the channel.
    pub async fn finish(self) -> Result<Report<W>, BenchError> {
        self.wait().await;

        let (sink, summary) = self
            .collector
            .await
            .map_err(BenchError::Collector)?
            .map_err(BenchError::Output)?;

        info!(
            total = summary.total(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Benchmark complete"
        );
        Ok(Report { sink, summary })
    }
}
