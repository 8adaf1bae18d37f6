use crate::api::SweepReport;
use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::Exchange;
use crate::feed::{to_quotes, OddsProvider};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub struct Reconciler {
    exchange: Arc<Exchange>,
    provider: Box<dyn OddsProvider + Send + Sync>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Reconciler {
    pub fn new(
        exchange: Arc<Exchange>,
        provider: Box<dyn OddsProvider + Send + Sync>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            exchange,
            provider,
            interval,
            shutdown,
        }
    }

    /// Ticks until the shutdown flag turns true. The first cycle runs right away.
    pub async fn run(mut self) {
        info!("Reconciler started, sweeping every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Reconciler received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Reconciliation cycle failed: {}", e);
                    }
                }
            }
        }
        info!("Reconciler stopped");
    }

    /// An unreachable feed only means no update this cycle, the sweep still runs on what is stored.
    pub async fn run_once(&self) -> ExchangeResult<SweepReport> {
        match self.refresh().await {
            Ok(applied) => debug!("Applied {} feed records", applied),
            Err(e) => warn!("{}", e),
        }
        self.exchange.sweep().await
    }

    async fn refresh(&self) -> ExchangeResult<usize> {
        let records = self
            .provider
            .fetch()
            .await
            .map_err(|e| ExchangeError::Transient(format!("odds feed unavailable: {:#}", e)))?;
        let quotes = to_quotes(records);
        Ok(self.exchange.apply_feed(&quotes).await)
    }
}
