use crate::{Collector, Reading};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// Receives every reading produced by the sampler.
pub trait SampleSink: Send + Sync {
    fn accept(&self, reading: Reading);
}

impl<F> SampleSink for F
where
    F: Fn(Reading) + Send + Sync,
{
    fn accept(&self, reading: Reading) {
        self(reading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Pause after a clean cycle.
    pub interval: Duration,
    /// Pause after a cycle in which any collector failed.
    pub error_backoff: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
        }
    }
}

struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

type Collectors = Arc<Mutex<Vec<Box<dyn Collector>>>>;

/// Periodic host sampling loop. At most one loop runs per sampler.
pub struct BackgroundSampler {
    config: SamplerConfig,
    collectors: Collectors,
    running: Mutex<Option<Running>>,
}

impl BackgroundSampler {
    pub fn new(config: SamplerConfig, collectors: Vec<Box<dyn Collector>>) -> Self {
        Self {
            config,
            collectors: Arc::new(Mutex::new(collectors)),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> SamplerConfig {
        self.config
    }

    /// Start the loop on `runtime`. Returns `false` if it is already running.
    pub fn start(&self, sink: Arc<dyn SampleSink>, runtime: &Handle) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            tracing::debug!("Background sampler already running");
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = runtime.spawn(run(
            self.config,
            Arc::clone(&self.collectors),
            sink,
            stop_rx,
        ));
        *running = Some(Running { stop, task });

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            error_backoff_secs = self.config.error_backoff.as_secs(),
            "Background sampler started"
        );
        true
    }

    /// Signal the loop to stop. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match running {
            Some(running) => {
                // the receiver may already be gone if the task ended on its own
                let _ = running.stop.send(true);
                tracing::info!("Background sampler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

impl Drop for BackgroundSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    config: SamplerConfig,
    collectors: Collectors,
    sink: Arc<dyn SampleSink>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let failed = collect_once(&collectors, sink.as_ref());
        let pause = if failed {
            config.error_backoff
        } else {
            config.interval
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = stop.changed() => break,
        }
    }
}

/// Run every collector once. Returns `true` if any of them failed.
fn collect_once(collectors: &Mutex<Vec<Box<dyn Collector>>>, sink: &dyn SampleSink) -> bool {
    let mut readings = Vec::new();
    let mut failed = false;
    {
        let mut collectors = collectors.lock().unwrap_or_else(PoisonError::into_inner);
        for collector in collectors.iter_mut() {
            match collector.collect() {
                Ok(batch) => readings.extend(batch),
                Err(e) => {
                    tracing::warn!(collector = collector.name(), error = %e, "Collection failed");
                    failed = true;
                }
            }
        }
    }

    tracing::debug!(count = readings.len(), "Collected host metrics");
    for reading in readings {
        sink.accept(reading);
    }
    failed
}
