//! Process-level failure supervision.
//!
//! # Responsibilities
//! - Own the serving task's lifecycle handle and the shutdown coordinator
//! - Collect fatal reports from supervised background tasks
//! - On a fatal report: log once, close the listener, exit non-zero
//!
//! # Design Decisions
//! - A fatal background failure is unrecoverable by definition; the only
//!   response is an orderly close, never a retry
//! - The shutdown handle is passed in explicitly, no ambient globals
//! - Ctrl-C takes the same close path with a zero exit code

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Result type for supervised background tasks.
pub type TaskResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A failure severe enough to bring the process down.
#[derive(Debug, thiserror::Error)]
#[error("task {task} failed: {message}")]
pub struct FatalError {
    pub task: &'static str,
    pub message: String,
}

/// Reporting handle cloned into supervised tasks.
#[derive(Clone)]
pub struct FatalHandle {
    tx: mpsc::UnboundedSender<FatalError>,
}

impl FatalHandle {
    /// Report a fatal failure. Never blocks; a report after shutdown has
    /// already begun is dropped.
    pub fn report(&self, task: &'static str, message: impl Into<String>) {
        let _ = self.tx.send(FatalError {
            task,
            message: message.into(),
        });
    }
}

/// Spawn a background task whose failure is fatal to the process.
///
/// The task's own panic or error is translated into a report; it never
/// takes the process down directly.
pub fn spawn_supervised<F>(task: &'static str, fatal: &FatalHandle, future: F) -> JoinHandle<()>
where
    F: Future<Output = TaskResult> + Send + 'static,
{
    let handle = fatal.clone();
    tokio::spawn(async move {
        let inner = tokio::spawn(future);
        match inner.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => handle.report(task, err.to_string()),
            Err(join_err) if join_err.is_panic() => handle.report(task, "task panicked"),
            Err(join_err) => handle.report(task, join_err.to_string()),
        }
    })
}

/// Top-level supervisor owning the listener's lifecycle.
pub struct Supervisor {
    shutdown: Arc<Shutdown>,
    fatal_rx: mpsc::UnboundedReceiver<FatalError>,
}

impl Supervisor {
    pub fn new(shutdown: Arc<Shutdown>) -> (Self, FatalHandle) {
        let (tx, fatal_rx) = mpsc::unbounded_channel();
        (Self { shutdown, fatal_rx }, FatalHandle { tx })
    }

    /// Supervise the serving task until it finishes, a fatal error is
    /// reported, or the process receives Ctrl-C.
    ///
    /// Returns the process exit code: 1 on the fatal path, 0 otherwise.
    /// The listener is closed (accept stops, in-flight requests drain)
    /// before this returns.
    pub async fn run(mut self, mut server: JoinHandle<std::io::Result<()>>) -> u8 {
        let code = tokio::select! {
            Some(fatal) = self.fatal_rx.recv() => {
                tracing::error!(task = fatal.task, error = %fatal.message, "Fatal error, closing listener");
                self.shutdown.trigger();
                1
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                self.shutdown.trigger();
                0
            }
            result = &mut server => {
                return Self::server_exit_code(result);
            }
        };

        // Wait for the drain to finish before reporting the exit code.
        let result = (&mut server).await;
        if let Ok(Err(err)) = &result {
            tracing::error!(error = %err, "Server ended with an error during shutdown");
        }
        code
    }

    fn server_exit_code(result: Result<std::io::Result<()>, tokio::task::JoinError>) -> u8 {
        match result {
            Ok(Ok(())) => 0,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Server ended with an error");
                1
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "Server task aborted");
                1
            }
        }
    }
}
