use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{SettingsStore, StoreError, SubscriptionStore};
use crate::domain::level::Level;
use crate::domain::subscription::{NewSubscription, Subscription, SubscriptionId};
use crate::domain::user_settings::UserSettings;

/// Process-local store with the same semantics as [`super::PgStore`].
#[derive(Default)]
pub struct InMemoryStore {
    subscriptions: RwLock<Vec<Subscription>>,
    settings: RwLock<HashMap<i64, UserSettings>>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    /// Stores a subscription as-is, keeping its id and `last_sent`.
    pub async fn put(&self, subscription: Subscription) {
        self.subscriptions.write().await.push(subscription);
    }

    pub async fn get_subscription(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.subscriptions
            .read()
            .await
            .iter()
            .find(|subscription| &subscription.id == id)
            .cloned()
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn find_all(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(self.subscriptions.read().await.clone())
    }

    async fn find_by_subscriber(
        &self,
        subscriber_id: i64,
    ) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|subscription| subscription.subscriber_id == subscriber_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, new_subscription: NewSubscription) -> Result<Subscription, StoreError> {
        let subscription = new_subscription.into_subscription(SubscriptionId::generate());
        self.subscriptions.write().await.push(subscription.clone());

        Ok(subscription)
    }

    async fn update_last_sent(
        &self,
        id: &SubscriptionId,
        last_sent: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .iter_mut()
            .find(|subscription| &subscription.id == id)
            .ok_or(StoreError::NotFound(*id))?;

        subscription.last_sent = Some(match subscription.last_sent {
            Some(previous) => previous.max(last_sent),
            None => last_sent,
        });

        Ok(())
    }

    async fn delete_by_subscriber(&self, subscriber_id: i64) -> Result<u64, StoreError> {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.subscriber_id != subscriber_id);

        Ok((before - subscriptions.len()) as u64)
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn get(&self, user_id: i64) -> Result<UserSettings, StoreError> {
        Ok(self
            .settings
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserSettings::defaults(user_id)))
    }

    async fn set_city(&self, user_id: i64, city_id: &str) -> Result<(), StoreError> {
        self.settings
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| UserSettings::defaults(user_id))
            .city_id = Some(city_id.to_string());

        Ok(())
    }

    async fn set_level(&self, user_id: i64, level: Level) -> Result<(), StoreError> {
        self.settings
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| UserSettings::defaults(user_id))
            .level = Some(level);

        Ok(())
    }
}
