use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use reqwest::Client;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cache::SourceCache;
use crate::error::PipelineError;
use crate::frame::RawBatch;
use crate::pipeline::{CycleReport, Pipeline};
use crate::source::DataSource;

/// Default auto-refresh period of the live dashboard
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(60);

/// Timer-driven refresh loop: fetch (through the cache), run a cycle,
/// hand the report on.
pub struct Monitor {
    source: DataSource,
    client: Client,
    cache: SourceCache<Arc<RawBatch>>,
    pipeline: Arc<Pipeline>,
    refresh: Duration,
    cycles: u64,
    last_report: Option<Arc<CycleReport>>,
}

impl Monitor {
    pub fn new(source: DataSource, pipeline: Arc<Pipeline>, refresh: Duration, ttl: Duration) -> Self {
        Self {
            source,
            client: Client::new(),
            cache: SourceCache::new(ttl),
            pipeline,
            refresh,
            cycles: 0,
            last_report: None,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Report of the last successful cycle
    pub fn last_report(&self) -> Option<&Arc<CycleReport>> {
        self.last_report.as_ref()
    }

    /// Cycles attempted so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn cache(&self) -> &SourceCache<Arc<RawBatch>> {
        &self.cache
    }

    /// Runs one cycle. `force` drops the cached batch first, as a manual
    /// refresh does.
    pub async fn refresh(&mut self, force: bool) -> Result<Arc<CycleReport>, PipelineError> {
        self.refresh_at(force, Instant::now()).await
    }

    /// Runs one cycle as of `now`, normally the tick that triggered it.
    /// A fetched batch is stamped with `now`, not with the time the fetch
    /// finished, so it expires in step with the refresh period.
    pub async fn refresh_at(&mut self, force: bool, now: Instant) -> Result<Arc<CycleReport>, PipelineError> {
        self.cycles += 1;
        let key = self.source.id();
        if force && self.cache.invalidate(&key) {
            info!("Cache for {} invalidated", self.source);
        }

        let batch = match self.cache.get(&key, now) {
            Some(batch) => Arc::clone(batch),
            None => {
                let batch = Arc::new(self.source.fetch(&self.client).await?);
                self.cache.insert(key, Arc::clone(&batch), now);
                batch
            }
        };

        let report = Arc::new(self.pipeline.run_cycle(&batch)?);
        self.last_report = Some(Arc::clone(&report));
        Ok(report)
    }

    /// Refreshes on every tick until `shutdown` resolves. A failed cycle is
    /// logged and passed to `on_cycle`; the loop keeps going.
    pub async fn run<F, S>(&mut self, mut on_cycle: F, shutdown: S)
    where
        F: FnMut(&Result<Arc<CycleReport>, PipelineError>),
        S: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Monitoring {} every {:?}", self.source, self.refresh);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Monitor stopped after {} cycles", self.cycles);
                    break;
                }
                tick = interval.tick() => {
                    let outcome = self.refresh_at(false, tick).await;
                    match &outcome {
                        Ok(report) => info!(
                            "Cycle {}: {} rows labelled, {} dropped",
                            self.cycles,
                            report.len(),
                            report.dropped()
                        ),
                        Err(e) if e.is_fatal() => error!("Cycle {} failed: {}", self.cycles, e),
                        Err(e) => warn!("Cycle {} skipped: {}", self.cycles, e),
                    }
                    on_cycle(&outcome);
                }
            }
        }
    }
}
