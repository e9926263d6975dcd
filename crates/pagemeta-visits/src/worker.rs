//! Background worker that periodically flushes the visit buffer.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, instrument, warn};

use pagemeta_core::{defaults, Error, Result};

use crate::tracker::VisitTracker;

/// Shortest flush period the worker will schedule.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Event emitted by the flush worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushEvent {
    /// Worker started.
    Started,
    /// Buffered hits were written.
    Flushed { records: usize, hits: u64 },
    /// A flush failed; the hits stay buffered.
    Failed { error: String },
    /// Worker stopped after its final flush.
    Stopped,
}

/// Handle for controlling a running flush worker.
pub struct FlushHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<FlushEvent>,
}

impl FlushHandle {
    /// Signal the worker to flush one last time and stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<FlushEvent> {
        self.event_rx.resubscribe()
    }
}

/// Periodic flush task owned by a [`VisitTracker`]'s lifecycle.
pub struct FlushWorker {
    tracker: VisitTracker,
    event_tx: broadcast::Sender<FlushEvent>,
}

impl FlushWorker {
    pub fn new(tracker: VisitTracker) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self { tracker, event_tx }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> FlushHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        FlushHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "visits", component = "flush_worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        let config = self.tracker.config();
        if !config.flush_enabled {
            info!("Visit flush worker is disabled, not starting");
            return;
        }

        let period = config.flush_interval.max(MIN_FLUSH_INTERVAL);
        info!(
            flush_interval_ms = period.as_millis() as u64,
            "Visit flush worker started"
        );
        let _ = self.event_tx.send(FlushEvent::Started);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Visit flush worker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => self.flush_once().await,
            }
        }

        self.flush_once().await;
        let _ = self.event_tx.send(FlushEvent::Stopped);
        info!("Visit flush worker stopped");
    }

    async fn flush_once(&self) {
        match self.tracker.flush().await {
            Ok(stats) if stats.is_empty() => {}
            Ok(stats) => {
                let _ = self.event_tx.send(FlushEvent::Flushed {
                    records: stats.records,
                    hits: stats.hits,
                });
            }
            Err(e) => {
                warn!(error = %e, "Scheduled visit flush failed, will retry");
                let _ = self.event_tx.send(FlushEvent::Failed {
                    error: e.to_string(),
                });
            }
        }
    }
}
