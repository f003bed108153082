//! Benchmark client.
//!
//! Runs the orchestrator in operator-paced stages: a confirmation before
//! connecting, another before sending, and a last one before exiting.
//! Prompts go to stderr so they never mix with result lines.
//!
//! Ctrl-C is handled for the whole run. While connections are in flight
//! the first interrupt cancels them and the results are still written;
//! any other interrupt, at a prompt or during the drain, exits with 130.

use crate::bench::{BenchConfig, Benchmark};
use crate::config::ClientSettings;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Notify;
use tracing::{info, warn};

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Manual pacing points between benchmark phases.
struct Gate {
    stdin: Option<BufReader<Stdin>>,
}

impl Gate {
    fn new(interactive: bool) -> Self {
        Gate {
            stdin: interactive.then(|| BufReader::new(tokio::io::stdin())),
        }
    }

    /// Print `prompt` and wait for a line on stdin. No-op when non-interactive.
    async fn confirm(&mut self, prompt: &str) -> std::io::Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(());
        };

        let mut stderr = std::io::stderr();
        write!(stderr, "{prompt}")?;
        stderr.flush()?;

        let mut line = String::new();
        stdin.read_line(&mut line).await?;
        Ok(())
    }
}

/// Exit status for a run ended by Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What an interrupt does at the current point of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Cancel the in-flight connections.
    Cancel,
    /// Leave the process.
    Exit,
}

/// Process-wide Ctrl-C routing.
///
/// Cancellation is armed only while the benchmark is running, and an armed
/// interrupt disarms it, so a second Ctrl-C always exits.
#[derive(Debug, Clone, Default)]
struct Interrupts {
    armed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
}

impl Interrupts {
    /// Spawn the task that owns SIGINT for the rest of the process.
    fn install() -> Self {
        let interrupts = Interrupts::default();
        let handler = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if handler.on_interrupt() == InterruptAction::Exit {
                    warn!("Interrupted, exiting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        });
        interrupts
    }

    fn on_interrupt(&self) -> InterruptAction {
        if self.armed.swap(false, Ordering::AcqRel) {
            self.cancel.notify_one();
            InterruptAction::Cancel
        } else {
            InterruptAction::Exit
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Resolves once an armed interrupt arrives.
    async fn cancelled(&self) {
        self.cancel.notified().await;
    }
}

async fn open_sink(output: Option<&Path>) -> std::io::Result<Sink> {
    match output {
        Some(path) => Ok(Box::new(File::create(path).await?)),
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Run one benchmark with the given settings.
///
/// Ctrl-C while connections are running fires the stop signal; every
/// connection still in flight then reports as cancelled.
pub async fn run(settings: ClientSettings) -> Result<(), Box<dyn std::error::Error>> {
    let interrupts = Interrupts::install();

    let sink = open_sink(settings.output.as_deref()).await.map_err(|e| {
        let target = settings
            .output
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        format!("cannot create file '{}': {}", target, e)
    })?;

    let config = BenchConfig::new(settings.addr, settings.connections, settings.round_trips);
    let mut gate = Gate::new(settings.interactive);

    gate.confirm("Ready to start the connections? [Enter] ").await?;
    let connected = Benchmark::new(config, sink).connect()?;

    gate.confirm("Ready to start sending? [Enter] ").await?;
    let mut running = connected.start();

    interrupts.arm();
    tokio::select! {
        _ = running.wait() => {}
        _ = interrupts.cancelled() => {
            warn!("Interrupted, cancelling outstanding connections");
            running.stop();
        }
    }
    interrupts.disarm();

    let mut report = running.finish().await?;
    report.sink.shutdown().await?;
    info!(
        succeeded = report.summary.succeeded,
        failed = report.summary.failed,
        "Results written"
    );

    gate.confirm("Hit Enter to stop").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_interrupt_outside_run_exits() {
        let interrupts = Interrupts::default();
        assert_eq!(interrupts.on_interrupt(), InterruptAction::Exit);

        interrupts.arm();
        interrupts.disarm();
        assert_eq!(interrupts.on_interrupt(), InterruptAction::Exit);
    }

    #[test]
    fn test_first_interrupt_cancels_second_exits() {
        let interrupts = Interrupts::default();
        interrupts.arm();

        let mut cancelled = task::spawn(interrupts.cancelled());
        assert_pending!(cancelled.poll());

        assert_eq!(interrupts.on_interrupt(), InterruptAction::Cancel);
        assert!(cancelled.is_woken());
        assert_ready!(cancelled.poll());

        assert_eq!(interrupts.on_interrupt(), InterruptAction::Exit);
    }

    #[tokio::test]
    async fn test_cancel_before_wait_is_kept() {
        let interrupts = Interrupts::default();
        interrupts.arm();
        assert_eq!(interrupts.on_interrupt(), InterruptAction::Cancel);

        tokio::time::timeout(Duration::from_secs(1), interrupts.cancelled())
            .await
            .unwrap();
    }
}
