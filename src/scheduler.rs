use crate::collectors::Sampler;
use crate::metrics::Metrics;
use crate::publisher::PublishError;
use crate::state::Snapshot;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("collection failed: {0}")]
    Collect(String),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl CycleError {
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Collect(_) => "collect",
            CycleError::Publish(_) => "publish",
        }
    }
}

pub trait SnapshotSource: Send + 'static {
    fn snapshot(&mut self) -> Result<Snapshot, CycleError>;
}

impl SnapshotSource for Sampler {
    fn snapshot(&mut self) -> Result<Snapshot, CycleError> {
        Ok(self.collect())
    }
}

pub trait SnapshotSink: Send + Sync + 'static {
    fn publish(&self, snapshot: &Snapshot) -> Result<(), PublishError>;
}

pub type LatestSnapshot = Arc<RwLock<Option<Snapshot>>>;

pub struct Scheduler<S, P> {
    source: Arc<Mutex<S>>,
    sink: Arc<P>,
    interval: Duration,
    metrics: Arc<Metrics>,
    latest: LatestSnapshot,
}

impl<S: SnapshotSource, P: SnapshotSink> Scheduler<S, P> {
    pub fn new(
        source: S,
        sink: P,
        interval: Duration,
        metrics: Arc<Metrics>,
        latest: LatestSnapshot,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            sink: Arc::new(sink),
            interval,
            metrics,
            latest,
        }
    }

    pub async fn run_cycle(&self) -> Result<(), CycleError> {
        let started = Instant::now();
        let source = self.source.clone();
        let sink = self.sink.clone();

        let snapshot = tokio::task::spawn_blocking(move || {
            let mut source = source.lock().unwrap_or_else(PoisonError::into_inner);
            let snapshot = source.snapshot()?;
            sink.publish(&snapshot)?;
            Ok::<_, CycleError>(snapshot)
        })
        .await
        .map_err(|err| CycleError::Collect(format!("cycle task aborted: {err}")))??;

        self.metrics
            .record_publish(&snapshot, started.elapsed().as_secs_f64());
        *self.latest.write().await = Some(snapshot);
        Ok(())
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = %humantime::format_duration(self.interval),
            "scheduler started"
        );
        loop {
            if let Err(err) = self.run_cycle().await {
                self.metrics.inc_cycle_error(err.stage());
                error!(stage = err.stage(), error = %err, "cycle failed, retrying after interval");
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown signal received, stopping scheduler");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
