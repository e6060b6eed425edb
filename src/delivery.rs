use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::frequency::{decide, FrequencyDecision};
use crate::domain::subscription::Subscription;
use crate::listings_client::{ListingsClient, ListingsQuery};
use crate::store::SubscriptionStore;
use crate::telegram_client::TelegramClient;

/// Listings delivered per subscription and per pass.
pub const PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The frequency window has not elapsed yet.
    Skipped,
    /// Number of listings for which a message was attempted.
    Sent(usize),
    NoResults,
    Failed(String),
}

/// Runs one delivery attempt for one subscription: policy, search, send, mark as sent.
pub struct DeliveryPipeline {
    store: Arc<dyn SubscriptionStore>,
    listings_client: Arc<ListingsClient>,
    telegram_client: Arc<TelegramClient>,
}

impl DeliveryPipeline {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        listings_client: Arc<ListingsClient>,
        telegram_client: Arc<TelegramClient>,
    ) -> DeliveryPipeline {
        DeliveryPipeline {
            store,
            listings_client,
            telegram_client,
        }
    }

    #[tracing::instrument(
        name = "Delivering listings for a subscription",
        skip(self, subscription, now),
        fields(
            subscription_id = %subscription.id,
            subscriber_id = %subscription.subscriber_id,
            frequency = %subscription.frequency.as_ref()
        )
    )]
    pub async fn deliver(&self, subscription: &Subscription, now: DateTime<Utc>) -> DeliveryOutcome {
        if !subscription.frequency.is_recognized() {
            tracing::warn!(
                "Unknown frequency {:?}, delivering without a recency filter",
                subscription.frequency.as_ref()
            );
        }

        let decision = decide(&subscription.frequency, subscription.last_sent, now);

        if decision.skip {
            tracing::info!(
                "Interval has not elapsed yet ({} minutes since last delivery)",
                decision.reference_minutes
            );
            return DeliveryOutcome::Skipped;
        }

        let query = listings_query(subscription, decision);
        let listings = match self.listings_client.fetch(&query).await {
            Ok(listings) => listings,
            Err(err) => {
                tracing::error!("Failed to fetch listings: {:?}", err);
                return DeliveryOutcome::Failed(err.to_string());
            }
        };

        // last_sent stays put so the next pass looks back over this quiet interval too
        if listings.is_empty() {
            tracing::info!("No new listings");
            return DeliveryOutcome::NoResults;
        }

        tracing::info!("Found {} listings", listings.len());

        for listing in &listings {
            if let Err(err) = self
                .telegram_client
                .send_message(subscription.subscriber_id, &listing.to_message())
                .await
            {
                tracing::error!(listing_url = %listing.url, "Failed to send a listing: {:?}", err);
            }
        }

        if let Err(err) = self.store.update_last_sent(&subscription.id, now).await {
            tracing::error!("Failed to mark the subscription as sent: {:?}", err);
            return DeliveryOutcome::Failed(err.to_string());
        }

        tracing::info!("Subscription marked as sent at {}", now);

        DeliveryOutcome::Sent(listings.len())
    }
}

fn listings_query(subscription: &Subscription, decision: FrequencyDecision) -> ListingsQuery {
    ListingsQuery {
        keywords: subscription.keywords.clone(),
        level: subscription.level,
        area: subscription.area.clone(),
        page_size: PAGE_SIZE,
        since_minutes: Some(decision.reference_minutes).filter(|minutes| *minutes > 0),
    }
}
