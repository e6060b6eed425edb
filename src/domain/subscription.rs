use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::frequency::Frequency;
use crate::domain::level::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn generate() -> SubscriptionId {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SubscriptionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A persisted standing request for periodic listing alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub subscriber_id: i64,
    pub keywords: Option<String>,
    pub level: Option<Level>,
    pub area: Option<String>,
    pub frequency: Frequency,
    pub last_sent: Option<DateTime<Utc>>,
}

/// A subscription collected by the bot that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub subscriber_id: i64,
    pub keywords: Option<String>,
    pub level: Option<Level>,
    pub area: Option<String>,
    pub frequency: Frequency,
}

impl NewSubscription {
    pub fn into_subscription(self, id: SubscriptionId) -> Subscription {
        Subscription {
            id,
            subscriber_id: self.subscriber_id,
            keywords: self.keywords,
            level: self.level,
            area: self.area,
            frequency: self.frequency,
            last_sent: None,
        }
    }
}
