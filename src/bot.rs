//! Bot runner: fixed-interval cycle loop with graceful shutdown.
//!
//! Handles:
//! - Running one engine cycle per tick, first tick immediately
//! - Skipping missed ticks when a cycle overruns the interval
//! - Observing shutdown only between cycles

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::trading::{CycleOutcome, ExecutionEngine};

/// Runs the execution engine on a fixed cadence.
pub struct Scheduler {
    engine: ExecutionEngine,
    period: Duration,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(engine: ExecutionEngine) -> Self {
        let period = engine.config().interval();
        Self {
            engine,
            period,
            stats: SchedulerStats::default(),
        }
    }

    #[cfg(test)]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Run cycles until `shutdown` resolves. A cycle already in progress is
    /// always allowed to finish.
    pub async fn run_until<F>(mut self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        info!(
            symbol = %self.engine.config().symbol,
            interval = ?self.period,
            "Starting scheduler"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    let outcome = self.engine.run_cycle().await;
                    self.stats.record(&outcome);
                    debug!(cycles = self.stats.cycles, outcome = ?outcome, "Cycle complete");
                }
            }
        }

        info!(
            cycles = self.stats.cycles,
            orders = self.stats.orders_submitted,
            failures = self.stats.failed_cycles,
            "Scheduler stopped"
        );
        self.stats
    }

    /// Run until Ctrl+C.
    pub async fn run(self) -> SchedulerStats {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

/// Counters collected over a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub orders_submitted: u64,
    pub failed_cycles: u64,
}

impl SchedulerStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Submitted(_) => self.orders_submitted += 1,
            CycleOutcome::Failed(_) => self.failed_cycles += 1,
            CycleOutcome::Idle(_) => {}
        }
    }
}

impl std::fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Scheduler Statistics ===")?;
        writeln!(f, "Cycles:          {}", self.cycles)?;
        writeln!(f, "Orders:          {}", self.orders_submitted)?;
        writeln!(f, "Failed Cycles:   {}", self.failed_cycles)?;
        Ok(())
    }
}
