use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::bot::{bot_commands, run_update_poller, BotOptions, Dispatcher};
use crate::config::{DatabaseSettings, Settings};
use crate::delivery::DeliveryPipeline;
use crate::dialogue::{DialogueStorage, RedisDialogueStorage};
use crate::feeds::FeedClient;
use crate::learning::{LearningCatalog, LearningCatalogError};
use crate::lint::LintRunner;
use crate::listings_client::ListingsClient;
use crate::routes::health_check;
use crate::scheduler::SchedulerLoop;
use crate::store::{PgStore, SettingsStore, SubscriptionStore};
use crate::telegram_client::TelegramClient;
use crate::utils::error_chain_fmt;

/// Persistence backends the application runs on.
pub struct Storage {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub dialogues: Arc<dyn DialogueStorage>,
}

pub struct Application {
    port: u16,
    server: Server,
    dispatcher: Arc<Dispatcher>,
    scheduler: SchedulerLoop,
    long_polling_seconds: u64,
}

#[derive(thiserror::Error)]
pub enum StartupError {
    #[error("Failed to bind the health check server.")]
    Io(#[from] std::io::Error),
    #[error("Failed to build an HTTP client.")]
    HttpClient(#[from] reqwest::Error),
    #[error("Invalid Redis configuration.")]
    Redis(#[from] redis::RedisError),
    #[error("Failed to load the learning data.")]
    LearningData(#[from] LearningCatalogError),
}

impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl Application {
    /// Wires the Postgres store and the Redis dialogue storage. Neither is contacted until
    /// first used.
    pub async fn build(config: Settings) -> Result<Self, StartupError> {
        let db_pool = get_connection_db_pool(&config.database);
        let store = Arc::new(PgStore::new(db_pool));
        let redis_client = redis::Client::open(config.get_redis_address())?;

        let storage = Storage {
            subscriptions: store.clone(),
            settings: store,
            dialogues: Arc::new(RedisDialogueStorage::new(redis_client)),
        };

        Application::build_with_storage(config, storage).await
    }

    pub async fn build_with_storage(config: Settings, storage: Storage) -> Result<Self, StartupError> {
        let listings_client = Arc::new(ListingsClient::new(
            config.listings_client.base_url.clone(),
            &config.listings_client.user_agent,
            Some(config.listings_client.get_timeout()),
        )?);
        let telegram_client = Arc::new(TelegramClient::new(
            config.telegram.base_url.clone(),
            config.telegram.bot_token.clone(),
            Some(config.telegram.get_timeout()),
        )?);

        let pipeline = Arc::new(DeliveryPipeline::new(
            storage.subscriptions.clone(),
            listings_client.clone(),
            telegram_client.clone(),
        ));
        let scheduler = SchedulerLoop::new(
            storage.subscriptions.clone(),
            pipeline,
            config.scheduler.get_period(),
        );

        let dispatcher = Arc::new(Dispatcher {
            telegram_client,
            listings_client,
            feed_client: Arc::new(FeedClient::new(None)?),
            lint_runner: Arc::new(LintRunner::new(
                config.bot.lint.program.clone(),
                config.bot.lint.get_timeout(),
            )),
            learning: Arc::new(LearningCatalog::load(&config.bot.learning_data_path)?),
            subscriptions: storage.subscriptions,
            settings: storage.settings,
            dialogues: storage.dialogues,
            options: BotOptions {
                cities: config.bot.cities.clone(),
                default_city: config.bot.default_city.clone(),
                feeds: config.bot.feeds.clone(),
            },
        });

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener)?;

        Ok(Self {
            port,
            server,
            dispatcher,
            scheduler,
            long_polling_seconds: config.telegram.long_polling_seconds,
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Runs the health check server, the update poller and the scheduler loop until one of
    /// them stops.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        if let Err(err) = self
            .dispatcher
            .telegram_client
            .set_my_commands(&bot_commands())
            .await
        {
            tracing::warn!("Failed to publish the bot commands: {:?}", err);
        }

        let poller = run_update_poller(self.dispatcher, self.long_polling_seconds);
        let scheduler = self.scheduler.run_until_stopped();

        tokio::select! {
            result = self.server => result,
            _ = poller => Ok(()),
            _ = scheduler => Ok(()),
        }
    }
}

pub fn run(listener: TcpListener) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
