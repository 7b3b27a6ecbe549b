//! Cooperative shutdown.
//!
//! One watch channel fans the stop request out to every background worker
//! (reservation sweeper on the Cloud; WebSocket client, snapshot puller and
//! queue drainer on a Gate Node). The coordinator keeps the workers' join
//! handles and drains them under a deadline before the process exits.
//! Workers cut off by the deadline lose no work: the gate's event queue is
//! durable and the sweeper's state is volatile by design.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

/// Read side of the stop request. Cheap to clone; every worker holds one
/// and checks it at its loop boundary.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Late callers return
    /// immediately, so this is safe in `select!` arms of long loops.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // Err means the coordinator is gone, which also means: stop
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// Owns the stop switch and the workers it stops.
pub struct ShutdownCoordinator {
    stop: Arc<watch::Sender<bool>>,
    workers: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.stop.subscribe(),
        }
    }

    /// Track a worker so `drain` can wait for it.
    pub fn register(&self, name: &'static str, handle: JoinHandle<()>) {
        self.workers
            .lock()
            .expect("worker list poisoned")
            .push((name, handle));
    }

    /// Flip the stop switch. Idempotent.
    pub fn trigger(&self) {
        if !self.stop.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    /// Spawn the OS signal watcher (SIGTERM / interrupt).
    pub fn start_signal_listener(&self) {
        let stop = self.stop.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            if !stop.send_replace(true) {
                info!("Shutdown requested by OS signal");
            }
        });
    }

    /// Trigger (if not already) and wait for every registered worker, with
    /// one deadline for the whole batch. Stragglers are logged and left to
    /// die with the process.
    pub async fn drain(self, timeout: Duration) {
        self.trigger();

        let workers = self.workers.into_inner().expect("worker list poisoned");
        if workers.is_empty() {
            return;
        }

        info!(count = workers.len(), "Draining background workers");
        let deadline = Instant::now() + timeout;

        for (name, handle) in workers {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => info!(worker = name, "Worker stopped"),
                Ok(Err(e)) => warn!(worker = name, error = %e, "Worker panicked"),
                Err(_) => {
                    warn!(worker = name, "Worker missed the shutdown deadline; abandoning")
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler; interrupt only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM received"),
            _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Interrupt received");
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_resolves_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });

        coordinator.trigger();
        waiter.await.unwrap(); // must not hang
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn wait_after_trigger_returns_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger();
        coordinator.signal().wait().await;
    }

    #[test]
    fn double_trigger_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger();
        coordinator.trigger();
        assert!(coordinator.signal().is_triggered());
    }

    #[tokio::test]
    async fn drain_waits_for_cooperative_workers() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        coordinator.register(
            "test-worker",
            tokio::spawn(async move {
                signal.wait().await;
                let _ = done_tx.send(());
            }),
        );

        coordinator.drain(Duration::from_secs(1)).await;
        done_rx.await.unwrap(); // worker observed the stop and finished
    }

    #[tokio::test]
    async fn drain_abandons_stuck_workers_at_the_deadline() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.register(
            "stuck-worker",
            tokio::spawn(async {
                std::future::pending::<()>().await;
            }),
        );

        // Must come back despite the worker never finishing
        coordinator.drain(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn drain_with_no_workers_is_a_noop() {
        ShutdownCoordinator::new().drain(Duration::from_secs(1)).await;
    }
}
