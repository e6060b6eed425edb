use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time;

use crate::delivery::{DeliveryOutcome, DeliveryPipeline};
use crate::store::{StoreError, SubscriptionStore};

/// Totals of one delivery pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub processed: usize,
    pub skipped: usize,
    pub sent: usize,
    pub no_results: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: &DeliveryOutcome) {
        self.processed += 1;
        match outcome {
            DeliveryOutcome::Skipped => self.skipped += 1,
            DeliveryOutcome::Sent(_) => self.sent += 1,
            DeliveryOutcome::NoResults => self.no_results += 1,
            DeliveryOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Long-lived loop that runs a delivery pass, then sleeps for `period`, forever.
///
/// Subscriptions of a pass are processed one at a time, in snapshot order. The sleep starts
/// when a pass ends, so passes drift by however long they take.
pub struct SchedulerLoop {
    store: Arc<dyn SubscriptionStore>,
    pipeline: Arc<DeliveryPipeline>,
    period: time::Duration,
}

impl SchedulerLoop {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        pipeline: Arc<DeliveryPipeline>,
        period: time::Duration,
    ) -> SchedulerLoop {
        SchedulerLoop {
            store,
            pipeline,
            period,
        }
    }

    pub async fn run_until_stopped(self) {
        loop {
            tracing::info!("Starting a delivery pass");

            match self.run_pass().await {
                Ok(report) => tracing::info!(
                    processed = report.processed,
                    sent = report.sent,
                    skipped = report.skipped,
                    no_results = report.no_results,
                    failed = report.failed,
                    "Delivery pass completed"
                ),
                Err(err) => tracing::error!(
                    "Failed to load subscriptions, retrying on the next pass: {:?}",
                    err
                ),
            }

            tracing::info!("Next delivery pass in {:?}", self.period);
            tokio::time::sleep(self.period).await;
        }
    }

    /// Loads one snapshot of all subscriptions and delivers each of them.
    ///
    /// Fails only when the snapshot cannot be loaded; anything going wrong with a single
    /// subscription, panics included, is logged and counted as failed.
    #[tracing::instrument(name = "Running a delivery pass", skip(self))]
    pub async fn run_pass(&self) -> Result<PassReport, StoreError> {
        let subscriptions = self.store.find_all().await?;
        let mut report = PassReport::default();

        for subscription in &subscriptions {
            let delivery = self.pipeline.deliver(subscription, Utc::now());

            let outcome = match AssertUnwindSafe(delivery).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => DeliveryOutcome::Failed(String::from("the delivery panicked")),
            };

            if let DeliveryOutcome::Failed(reason) = &outcome {
                tracing::error!(
                    subscriber_id = subscription.subscriber_id,
                    "Failed to process subscription {}: {}",
                    subscription.id,
                    reason
                );
            }

            report.record(&outcome);
        }

        Ok(report)
    }
}
