//! Per-user conversation state for the multi-step commands (`/subscribe`, `/pylint`).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::level::Level;
use crate::utils::error_chain_fmt;

/// Abandoned dialogues expire after a day.
const DIALOGUE_TTL_SECONDS: u64 = 60 * 60 * 24;

/// Fields collected so far by the subscription wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubscriptionForm {
    pub keywords: Option<String>,
    pub level: Option<Level>,
    pub area: Option<String>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DialogueState {
    AwaitingKeywords,
    AwaitingLevel { form: SubscriptionForm },
    AwaitingArea { form: SubscriptionForm },
    AwaitingFrequency { form: SubscriptionForm },
    AwaitingConfirmation { form: SubscriptionForm },
    AwaitingCode,
}

#[async_trait]
pub trait DialogueStorage: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<DialogueState>, DialogueError>;

    async fn set(&self, user_id: i64, state: &DialogueState) -> Result<(), DialogueError>;

    async fn clear(&self, user_id: i64) -> Result<(), DialogueError>;
}

#[derive(thiserror::Error)]
pub enum DialogueError {
    #[error("Failed to talk to Redis.")]
    Redis(#[from] redis::RedisError),
    #[error("Failed to (de)serialize a dialogue state.")]
    Serialization(#[from] serde_json::Error),
}

impl std::fmt::Debug for DialogueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub struct RedisDialogueStorage {
    redis_client: redis::Client,
}

impl RedisDialogueStorage {
    pub fn new(redis_client: redis::Client) -> RedisDialogueStorage {
        RedisDialogueStorage { redis_client }
    }
}

fn dialogue_key(user_id: i64) -> String {
    format!("dialogue:{}", user_id)
}

#[async_trait]
impl DialogueStorage for RedisDialogueStorage {
    #[tracing::instrument(name = "Load a dialogue state from Redis", skip(self))]
    async fn get(&self, user_id: i64) -> Result<Option<DialogueState>, DialogueError> {
        let mut redis_conn = self.redis_client.get_tokio_connection().await?;

        let raw: Option<String> = redis::cmd("GET")
            .arg(dialogue_key(user_id))
            .query_async(&mut redis_conn)
            .await?;

        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    #[tracing::instrument(name = "Store a dialogue state in Redis", skip(self))]
    async fn set(&self, user_id: i64, state: &DialogueState) -> Result<(), DialogueError> {
        let mut redis_conn = self.redis_client.get_tokio_connection().await?;

        redis::cmd("SET")
            .arg(dialogue_key(user_id))
            .arg(serde_json::to_string(state)?)
            .arg("EX")
            .arg(DIALOGUE_TTL_SECONDS)
            .query_async::<_, ()>(&mut redis_conn)
            .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Remove a dialogue state from Redis", skip(self))]
    async fn clear(&self, user_id: i64) -> Result<(), DialogueError> {
        let mut redis_conn = self.redis_client.get_tokio_connection().await?;

        redis::cmd("DEL")
            .arg(dialogue_key(user_id))
            .query_async::<_, ()>(&mut redis_conn)
            .await?;

        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDialogueStorage {
    states: RwLock<HashMap<i64, DialogueState>>,
}

impl InMemoryDialogueStorage {
    pub fn new() -> InMemoryDialogueStorage {
        InMemoryDialogueStorage::default()
    }
}

#[async_trait]
impl DialogueStorage for InMemoryDialogueStorage {
    async fn get(&self, user_id: i64) -> Result<Option<DialogueState>, DialogueError> {
        Ok(self.states.read().await.get(&user_id).cloned())
    }

    async fn set(&self, user_id: i64, state: &DialogueState) -> Result<(), DialogueError> {
        self.states.write().await.insert(user_id, state.clone());
        Ok(())
    }

    async fn clear(&self, user_id: i64) -> Result<(), DialogueError> {
        self.states.write().await.remove(&user_id);
        Ok(())
    }
}
