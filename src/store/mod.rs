//! Persistence for subscriptions and user settings.
//!
//! The scheduler and the bot only see the [`SubscriptionStore`] and [`SettingsStore`] traits;
//! [`PgStore`] backs them in production and [`InMemoryStore`] in tests.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::level::Level;
use crate::domain::subscription::{NewSubscription, Subscription, SubscriptionId};
use crate::domain::user_settings::UserSettings;
use crate::utils::error_chain_fmt;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Snapshot of every stored subscription, oldest first.
    async fn find_all(&self) -> Result<Vec<Subscription>, StoreError>;

    async fn find_by_subscriber(&self, subscriber_id: i64)
        -> Result<Vec<Subscription>, StoreError>;

    async fn insert(&self, new_subscription: NewSubscription) -> Result<Subscription, StoreError>;

    /// Targeted single-field update. Never moves `last_sent` backwards.
    async fn update_last_sent(
        &self,
        id: &SubscriptionId,
        last_sent: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Removes every subscription of a subscriber, returning how many were deleted.
    async fn delete_by_subscriber(&self, subscriber_id: i64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings of a user, or the defaults when nothing was stored yet.
    async fn get(&self, user_id: i64) -> Result<UserSettings, StoreError>;

    async fn set_city(&self, user_id: i64, city_id: &str) -> Result<(), StoreError>;

    async fn set_level(&self, user_id: i64, level: Level) -> Result<(), StoreError>;
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Failed to execute a database query.")]
    Database(#[from] sqlx::Error),
    #[error("Subscription {0} does not exist.")]
    NotFound(SubscriptionId),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
