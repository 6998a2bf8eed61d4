//! Process lifecycle: `Starting -> Serving -> Draining -> Stopped`.
//!
//! The server runs on its own task. Once the shutdown signal resolves, no new
//! connections are accepted and in-flight requests get at most the drain
//! timeout to finish before the serving task is aborted.

use std::{future::Future, net::TcpListener, time::Duration};

use axum::Router;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Serving,
    Draining,
    Stopped,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("can't bind listener: {0}")]
    Bind(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct Supervisor {
    drain_timeout: Duration,
    phase: watch::Sender<Phase>,
}

impl Supervisor {
    pub fn new(drain_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            drain_timeout,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn transition(&self, next: Phase) {
        let previous = self.phase.send_replace(next);
        tracing::info!(from = ?previous, to = ?next, "lifecycle transition");
    }

    /// Serves `app` on `listener` until `signal` resolves, then drains.
    ///
    /// Returns early with an error if the server stops on its own.
    pub async fn serve<S>(
        &self,
        listener: TcpListener,
        app: Router,
        signal: S,
    ) -> Result<(), SupervisorError>
    where
        S: Future<Output = ()> + Send,
    {
        let server = axum::Server::from_tcp(listener)
            .map_err(|e| SupervisorError::Bind(e.to_string()))?
            .serve(app.into_make_service());
        tracing::info!(addr = %server.local_addr(), "server started");

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let graceful = server.with_graceful_shutdown(async move {
            // A dropped sender also counts as a stop request.
            let _ = stop_rx.changed().await;
        });
        let mut task = tokio::spawn(graceful);
        self.transition(Phase::Serving);

        tokio::select! {
            _ = signal => {}
            finished = &mut task => {
                self.transition(Phase::Stopped);
                return match finished? {
                    Ok(()) => Ok(()),
                    Err(e) => Err(SupervisorError::Server(e.to_string())),
                };
            }
        }

        self.transition(Phase::Draining);
        let _ = stop_tx.send(true);

        let outcome = match tokio::time::timeout(self.drain_timeout, &mut task).await {
            Ok(finished) => finished?.map_err(|e| SupervisorError::Server(e.to_string())),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.drain_timeout.as_secs_f64(),
                    "drain timed out, abandoning in-flight requests"
                );
                task.abort();
                Ok(())
            }
        };
        self.transition(Phase::Stopped);
        outcome
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
