use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{error, info, warn};
use tokio::sync::watch;

use crate::config::Config;
use crate::data::cache::SnapshotCache;
use crate::data::generator::{unique_symbols, PriceGenerator};
use crate::data::source::TickerSource;
use crate::hub::Hub;

/// Sleep seam so cadence and cooldowns can be checked without waiting in real time.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { instruments: usize },
    /// Source reported nothing to track.
    Empty,
    /// Fetch, transport or decode failure.
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    pub error_cooldown: Duration,
    pub empty_cooldown: Duration,
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            error_cooldown: config.error_cooldown,
            empty_cooldown: config.empty_cooldown,
        }
    }
}

pub struct IngestionPoller {
    hub: Hub,
    source: Arc<dyn TickerSource>,
    generator: Arc<dyn PriceGenerator>,
    cache: Option<SnapshotCache>,
    clock: Arc<dyn Clock>,
    settings: PollerSettings,
}

impl IngestionPoller {
    pub fn new(
        hub: Hub,
        source: Arc<dyn TickerSource>,
        generator: Arc<dyn PriceGenerator>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            hub,
            source,
            generator,
            cache: None,
            clock: Arc::new(TokioClock),
            settings,
        }
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Polls until `shutdown` flips to true or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Ingestion poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_cycle().await;
            let pause = self.pause_after(outcome);
            info!("Sleeping for {:?} before the next poll", pause);

            tokio::select! {
                _ = self.clock.sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Ingestion poller stopped");
    }

    /// One fetch -> generate -> publish -> persist pass. Never fails; the outcome picks the next pause.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let listing = match self.source.fetch_listing().await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Error fetching ticker symbols: {}", e);
                return CycleOutcome::Failed;
            }
        };

        if listing.is_empty() {
            warn!("Ticker source reported no instruments to track");
            return CycleOutcome::Empty;
        }

        let symbols = unique_symbols(listing.symbols());
        if symbols.is_empty() {
            warn!("Ticker source reported {} instruments but none had a symbol", listing.count);
            return CycleOutcome::Empty;
        }

        let snapshot = Arc::new(self.generator.generate(&symbols));
        let instruments = snapshot.len();

        if !self.hub.publish(snapshot.clone()) {
            warn!("Broadcast queue is closed; snapshot stored but not fanned out");
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.write(&snapshot).await {
                warn!("Failed to persist snapshot to {}: {}", cache.path().display(), e);
            }
        }

        info!("Stocks data fetched and stored successfully ({} instruments)", instruments);
        CycleOutcome::Published { instruments }
    }

    pub fn pause_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Published { .. } => self.settings.poll_interval,
            CycleOutcome::Empty => self.settings.empty_cooldown,
            CycleOutcome::Failed => self.settings.error_cooldown,
        }
    }
}
