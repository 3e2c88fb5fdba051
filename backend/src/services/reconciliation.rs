//! Daily snapshots, inventory alerts and the scheduler that runs them
//!
//! [`Reconciliation`] does the work and serves the report reads;
//! [`ReconciliationScheduler`] owns the two periodic tasks. Neither takes a
//! product hold: both only read committed product state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use shared::{Actor, AlertReport, Capability, DailySnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::authz::CapabilityCheck;
use crate::config::SchedulerConfig;
use crate::error::AppResult;
use crate::store::InventoryStore;

/// Snapshot and alert runs plus the report reads
#[derive(Clone)]
pub struct Reconciliation<S> {
    store: S,
    authz: Arc<dyn CapabilityCheck>,
    /// Latest report from the alert sweep
    alerts: Arc<watch::Sender<Option<AlertReport>>>,
}

impl<S: InventoryStore> Reconciliation<S> {
    pub fn new(store: S, authz: Arc<dyn CapabilityCheck>) -> Self {
        let (alerts, _) = watch::channel(None);
        Self {
            store,
            authz,
            alerts: Arc::new(alerts),
        }
    }

    /// Upsert one snapshot row per product for `date`; returns the row count.
    ///
    /// Opening and closing quantity are the quantity at run time. Running
    /// again for the same date overwrites every field of the existing rows.
    /// A product whose row cannot be captured is logged and left out; the
    /// other products are still written.
    pub async fn run_daily_snapshot(&self, date: NaiveDate) -> AppResult<usize> {
        let products = self.store.all_products().await?;
        let totals = self.store.movement_totals(date).await?;
        let refreshed_at = Utc::now();

        let mut snapshots = Vec::with_capacity(products.len());
        for product in &products {
            let movement = totals.get(&product.id).copied().unwrap_or_default();
            match DailySnapshot::capture(product, date, movement, refreshed_at) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => tracing::warn!(
                    product_id = product.id,
                    %date,
                    error = %e,
                    "Product left out of daily snapshot"
                ),
            }
        }

        self.store.upsert_snapshots(&snapshots).await?;
        Ok(snapshots.len())
    }

    /// Build the alert report and publish it to subscribers
    pub async fn run_alert_sweep(&self) -> AppResult<AlertReport> {
        let products = self.store.all_products().await?;
        let report = AlertReport::build(&products, Utc::now());
        self.alerts.send_replace(Some(report.clone()));
        Ok(report)
    }

    /// Receiver that observes every published alert report
    pub fn subscribe(&self) -> watch::Receiver<Option<AlertReport>> {
        self.alerts.subscribe()
    }

    pub async fn snapshots_for_date(
        &self,
        actor: &Actor,
        date: NaiveDate,
    ) -> AppResult<Vec<DailySnapshot>> {
        self.authz.check(actor, Capability::ViewSnapshots)?;
        self.store.snapshots_for_date(date).await
    }

    /// Alert report computed from current product state
    pub async fn current_alerts(&self, actor: &Actor) -> AppResult<AlertReport> {
        self.authz.check(actor, Capability::ViewAlerts)?;

        let products = self.store.all_products().await?;
        Ok(AlertReport::build(&products, Utc::now()))
    }

    /// Report from the most recent sweep, if one has run
    pub fn latest_alerts(&self, actor: &Actor) -> AppResult<Option<AlertReport>> {
        self.authz.check(actor, Capability::ViewAlerts)?;
        Ok(self.alerts.borrow().clone())
    }

    async fn snapshot_tick(&self) {
        let date = Utc::now().date_naive();
        match self.run_daily_snapshot(date).await {
            Ok(rows) => tracing::info!(%date, rows, "Daily snapshot refreshed"),
            Err(e) => tracing::error!(%date, error = %e, "Daily snapshot run failed"),
        }
    }

    async fn alert_tick(&self) {
        match self.run_alert_sweep().await {
            Ok(report) => tracing::info!(
                low_stock = report.low_stock_count,
                high_stock = report.high_stock_count,
                "Inventory alert sweep finished"
            ),
            Err(e) => tracing::error!(error = %e, "Inventory alert sweep failed"),
        }
    }
}

/// Owns the snapshot and alert tasks between `start` and `shutdown`
pub struct ReconciliationScheduler<S> {
    reconciliation: Reconciliation<S>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl<S: InventoryStore> ReconciliationScheduler<S> {
    pub fn new(reconciliation: Reconciliation<S>, config: SchedulerConfig) -> Self {
        Self {
            reconciliation,
            config,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Spawn both periodic tasks. Each runs once immediately, then on its
    /// interval. Calling `start` on a running scheduler does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let snapshot_interval = self.config.snapshot_interval();
        let alert_interval = self.config.alert_interval();

        let snapshots = self.reconciliation.clone();
        self.spawn("daily_snapshot", snapshot_interval, move || {
            let snapshots = snapshots.clone();
            async move { snapshots.snapshot_tick().await }
        });

        let alerts = self.reconciliation.clone();
        self.spawn("alert_sweep", alert_interval, move || {
            let alerts = alerts.clone();
            async move { alerts.alert_tick().await }
        });

        tracing::info!(
            snapshot_interval_secs = snapshot_interval.as_secs(),
            alert_interval_secs = alert_interval.as_secs(),
            "Reconciliation scheduler started"
        );
    }

    fn spawn<F, Fut>(&mut self, name: &'static str, period: Duration, tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(run_every(name, period, shutdown, tick));
        self.tasks.push((name, handle));
    }

    /// Cancel both tasks and wait for them to exit
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();

        for (name, handle) in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "Scheduler task ended abnormally");
            }
        }
        tracing::info!("Reconciliation scheduler stopped");
    }
}

/// Run `tick` on a fixed interval until `shutdown` is cancelled.
///
/// Each tick runs in its own task, so a panicking run is logged and the
/// next tick still fires. A tick in progress runs to completion.
async fn run_every<F, Fut>(name: &'static str, period: Duration, shutdown: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                tracing::debug!(task = name, "Scheduler tick");
                if let Err(e) = tokio::spawn(tick()).await {
                    tracing::error!(task = name, error = %e, "Scheduler run aborted");
                }
            }
        }
    }
}
