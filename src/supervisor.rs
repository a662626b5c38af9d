//! Process supervisor: the one place that decides the process must stop.
//!
//! Ctrl-C, SIGTERM, a fatal startup error or the death of the server task
//! all end up here. The server drains through graceful shutdown and `main`
//! maps the outcome to an exit code.

use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
    Failed,
}

#[derive(Clone)]
pub struct Supervisor {
    state: Arc<watch::Sender<RunState>>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    /// Log every panic through tracing before the default report.
    ///
    /// A panic only fails the task it happened in: request handlers and
    /// fan-out slots recover from it. The process stops only when the
    /// server task itself dies, see [`Supervisor::watch_task`].
    pub fn install_panic_hook(&self) {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic| {
            let location = panic
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown location".to_string());
            let message = panic
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());

            error!("Panic at {}: {}", location, message);
            previous(panic);
        }));
    }

    /// Await the task that carries the server. If it panics or is
    /// cancelled the supervisor fails and `None` comes back.
    pub async fn watch_task<T>(&self, task: JoinHandle<T>) -> Option<T> {
        match task.await {
            Ok(value) => Some(value),
            Err(err) if err.is_panic() => {
                self.fail("server task panicked");
                None
            }
            Err(err) => {
                self.fail(&format!("server task stopped: {}", err));
                None
            }
        }
    }

    /// Orderly stop, exit code 0
    pub fn shutdown(&self) {
        self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Stopping;
                true
            } else {
                false
            }
        });
    }

    /// Fatal stop, exit code 1. Overrides a pending orderly stop.
    pub fn fail(&self, reason: &str) {
        error!("Fatal error, shutting down: {}", reason);
        self.state.send_replace(RunState::Failed);
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Resolves once a stop was requested or a termination signal arrived
    pub async fn wait(&self) {
        let mut changes = self.state.subscribe();
        tokio::select! {
            _ = changes.wait_for(|state| *state != RunState::Running) => {}
            _ = ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                self.shutdown();
            }
            _ = terminate() => {
                info!("Received SIGTERM, shutting down");
                self.shutdown();
            }
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.state() {
            RunState::Failed => ExitCode::FAILURE,
            RunState::Running | RunState::Stopping => ExitCode::SUCCESS,
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_releases_waiters() {
        let supervisor = Supervisor::new();
        let waiter = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.wait().await })
        };

        supervisor.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(supervisor.state(), RunState::Stopping);
    }

    #[tokio::test]
    async fn failure_wins_over_orderly_stop() {
        let supervisor = Supervisor::new();
        supervisor.shutdown();
        supervisor.fail("boom");
        supervisor.shutdown();

        // already stopped: wait returns immediately
        tokio::time::timeout(Duration::from_secs(1), supervisor.wait())
            .await
            .unwrap();
        assert_eq!(supervisor.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn panic_inside_a_request_task_keeps_running() {
        let supervisor = Supervisor::new();
        supervisor.install_panic_hook();

        let handler = tokio::spawn(async {
            if true {
                panic!("driver bug");
            }
        });
        assert!(handler.await.unwrap_err().is_panic());
        assert_eq!(supervisor.state(), RunState::Running);
    }

    #[tokio::test]
    async fn dead_server_task_is_fatal() {
        let supervisor = Supervisor::new();

        let finished = supervisor.watch_task(tokio::spawn(async { 7 })).await;
        assert_eq!(finished, Some(7));
        assert_eq!(supervisor.state(), RunState::Running);

        let server = tokio::spawn(async {
            if true {
                panic!("listener gone");
            }
        });
        assert_eq!(supervisor.watch_task(server).await, None);
        assert_eq!(supervisor.state(), RunState::Failed);
    }
}
