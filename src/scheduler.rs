// Single shared poll scheduler: one dedicated thread re-polls every registered collector
// at a fixed interval until shut down.

use crate::collectors::Refresh;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, warn};

const THREAD_NAME: &str = "sysmon-scheduler";

/// Runs one refresh of every collector. A failing collector is logged and skipped.
pub fn poll_once(collectors: &[Arc<dyn Refresh>]) {
    for collector in collectors {
        if let Err(e) = collector.refresh() {
            warn!(
                collector = collector.name(),
                error = %e,
                operation = "refresh",
                "refresh failed; keeping previous state"
            );
        }
    }
}

/// Handle to the background poll loop. Dropping it stops future polls.
pub struct Scheduler {
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Starts polling immediately, then every `period`.
    pub fn spawn(period: Duration, collectors: Vec<Arc<dyn Refresh>>) -> std::io::Result<Self> {
        if period.is_zero() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "poll interval must be non-zero",
            ));
        }
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = std::thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "scheduler runtime failed to start; no polling");
                        return;
                    }
                };
                runtime.block_on(run(period, collectors, shutdown_rx));
            })?;
        Ok(Self {
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle,
        })
    }

    /// Stops future polls. Does not wait for a poll already in progress.
    pub fn shutdown(&self) {
        let tx = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    period: Duration,
    collectors: Vec<Arc<dyn Refresh>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let span = tracing::span!(
        tracing::Level::DEBUG,
        "scheduler",
        period_ms = period.as_millis() as u64,
        collectors = collectors.len()
    );
    let _guard = span.enter();

    loop {
        tokio::select! {
            _ = tick.tick() => poll_once(&collectors),
            _ = &mut shutdown_rx => {
                debug!("Scheduler shutting down");
                break;
            }
        }
    }
}
