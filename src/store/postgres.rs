use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{SettingsStore, StoreError, SubscriptionStore};
use crate::domain::frequency::Frequency;
use crate::domain::level::Level;
use crate::domain::subscription::{NewSubscription, Subscription, SubscriptionId};
use crate::domain::user_settings::UserSettings;

#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> PgStore {
        PgStore { db_pool }
    }
}

/// Rows are converted once here: unknown frequencies are kept as unrecognized and
/// unknown levels are dropped so one bad row never breaks a delivery pass.
fn subscription_from_row(row: PgRow) -> Result<Subscription, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    let level = row
        .try_get::<Option<String>, _>("level")?
        .and_then(|level| match Level::parse(level) {
            Ok(level) => Some(level),
            Err(err) => {
                tracing::warn!(subscription_id = %id, "Ignoring stored level: {}", err);
                None
            }
        });

    Ok(Subscription {
        id: SubscriptionId::from(id),
        subscriber_id: row.try_get("subscriber_id")?,
        keywords: row.try_get("keywords")?,
        level,
        area: row.try_get("area")?,
        frequency: Frequency::from_stored(row.try_get("frequency")?),
        last_sent: row.try_get("last_sent")?,
    })
}

#[async_trait]
impl SubscriptionStore for PgStore {
    #[tracing::instrument(name = "Loading all subscriptions", skip(self))]
    async fn find_all(&self) -> Result<Vec<Subscription>, StoreError> {
        let subscriptions = sqlx::query(
            r#"
            SELECT id, subscriber_id, keywords, level, area, frequency, last_sent
            FROM subscriptions
            ORDER BY created_at
            "#,
        )
        .try_map(subscription_from_row)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(subscriptions)
    }

    #[tracing::instrument(name = "Loading subscriptions of a subscriber", skip(self))]
    async fn find_by_subscriber(
        &self,
        subscriber_id: i64,
    ) -> Result<Vec<Subscription>, StoreError> {
        let subscriptions = sqlx::query(
            r#"
            SELECT id, subscriber_id, keywords, level, area, frequency, last_sent
            FROM subscriptions
            WHERE subscriber_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(subscriber_id)
        .try_map(subscription_from_row)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(subscriptions)
    }

    #[tracing::instrument(
        name = "Insert a new subscription into the database",
        skip(self, new_subscription),
        fields(subscriber_id = %new_subscription.subscriber_id)
    )]
    async fn insert(&self, new_subscription: NewSubscription) -> Result<Subscription, StoreError> {
        let subscription = sqlx::query(
            r#"
            INSERT INTO subscriptions (id, subscriber_id, keywords, level, area, frequency, last_sent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, $7)
            RETURNING id, subscriber_id, keywords, level, area, frequency, last_sent
            "#,
        )
        .bind(*SubscriptionId::generate().as_uuid())
        .bind(new_subscription.subscriber_id)
        .bind(new_subscription.keywords.as_deref())
        .bind(new_subscription.level.as_ref().map(|level| level.as_ref()))
        .bind(new_subscription.area.as_deref())
        .bind(new_subscription.frequency.as_ref())
        .bind(Utc::now())
        .try_map(subscription_from_row)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(subscription)
    }

    #[tracing::instrument(name = "Marking a subscription as sent", skip(self))]
    async fn update_last_sent(
        &self,
        id: &SubscriptionId,
        last_sent: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // GREATEST ignores NULL, so the first delivery simply sets the timestamp
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_sent = GREATEST(last_sent, $1)
            WHERE id = $2
            "#,
        )
        .bind(last_sent)
        .bind(*id.as_uuid())
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(*id));
        }

        Ok(())
    }

    #[tracing::instrument(name = "Deleting subscriptions of a subscriber", skip(self))]
    async fn delete_by_subscriber(&self, subscriber_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1")
            .bind(subscriber_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    #[tracing::instrument(name = "Loading user settings", skip(self))]
    async fn get(&self, user_id: i64) -> Result<UserSettings, StoreError> {
        let settings = sqlx::query("SELECT user_id, city_id, level FROM user_settings WHERE user_id = $1")
            .bind(user_id)
            .try_map(|row: PgRow| {
                Ok(UserSettings {
                    user_id: row.try_get("user_id")?,
                    city_id: row.try_get("city_id")?,
                    level: row
                        .try_get::<Option<String>, _>("level")?
                        .and_then(|level| Level::parse(level).ok()),
                })
            })
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(settings.unwrap_or_else(|| UserSettings::defaults(user_id)))
    }

    #[tracing::instrument(name = "Saving the city of a user", skip(self))]
    async fn set_city(&self, user_id: i64, city_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, city_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET city_id = EXCLUDED.city_id
            "#,
        )
        .bind(user_id)
        .bind(city_id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Saving the level of a user", skip(self))]
    async fn set_level(&self, user_id: i64, level: Level) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, level)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET level = EXCLUDED.level
            "#,
        )
        .bind(user_id)
        .bind(level.as_ref())
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }
}
