//! Chat command handling: routes Telegram updates to the command handlers.

mod command;
mod learn;
mod lint;
mod news;
mod settings;
mod subscribe;
mod vacancies;

pub use command::{bot_commands, Command};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time;

use crate::dialogue::{DialogueError, DialogueState, DialogueStorage};
use crate::feeds::FeedClient;
use crate::learning::LearningCatalog;
use crate::lint::LintRunner;
use crate::listings_client::ListingsClient;
use crate::store::{SettingsStore, StoreError, SubscriptionStore};
use crate::telegram_client::{CallbackQuery, ChatError, Message, TelegramClient, Update};
use crate::utils::error_chain_fmt;

const POLLING_RETRY_DELAY: time::Duration = time::Duration::from_secs(5);

const HELP_TEXT: &str = "Hi! I can send you fresh vacancies and a bit more:\n\
/subscribe - subscribe to vacancy alerts\n\
/show_subscriptions - list your subscriptions\n\
/unsubscribe - remove your subscriptions\n\
/vacancies [keywords] - search vacancies now\n\
/settings - set your city and level\n\
/news - latest Python news\n\
/tip - a random tip for your level\n\
/learn - learning resources for your level\n\
/pylint - check a Python snippet";

const APOLOGY_TEXT: &str = "Sorry, something went wrong. Please try again later.";

/// Static options of the bot taken from the configuration.
#[derive(Debug, Clone)]
pub struct BotOptions {
    /// City id to display name, as understood by the listings service.
    pub cities: BTreeMap<String, String>,
    pub default_city: String,
    pub feeds: Vec<String>,
}

/// Everything the command handlers need. Built once at startup and shared.
pub struct Dispatcher {
    pub telegram_client: Arc<TelegramClient>,
    pub listings_client: Arc<ListingsClient>,
    pub feed_client: Arc<FeedClient>,
    pub lint_runner: Arc<LintRunner>,
    pub learning: Arc<LearningCatalog>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub dialogues: Arc<dyn DialogueStorage>,
    pub options: BotOptions,
}

#[derive(thiserror::Error)]
pub enum BotError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dialogue(#[from] DialogueError),
}

impl std::fmt::Debug for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl Dispatcher {
    /// Handles one update. Errors are logged and never stop the caller.
    pub async fn handle_update(&self, update: Update) {
        let chat_id = update
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .or_else(|| update.callback_query.as_ref().map(|query| query.from.id));

        let result = if let Some(message) = update.message {
            self.handle_message(message).await
        } else if let Some(callback_query) = update.callback_query {
            self.handle_callback_query(callback_query).await
        } else {
            Ok(())
        };

        let err = match result {
            Ok(()) => return,
            Err(err) => err,
        };
        tracing::error!(update_id = update.update_id, "Failed to handle update: {:?}", err);

        // No point in apologising through a chat that just failed
        if let (Some(chat_id), false) = (chat_id, matches!(err, BotError::Chat(_))) {
            if let Err(err) = self.telegram_client.send_message(chat_id, APOLOGY_TEXT).await {
                tracing::warn!("Failed to apologise: {:?}", err);
            }
        }
    }

    #[tracing::instrument(
        name = "Handling a chat message",
        skip(self, message),
        fields(chat_id = %message.chat.id, user_id = tracing::field::Empty)
    )]
    async fn handle_message(&self, message: Message) -> Result<(), BotError> {
        let chat_id = message.chat.id;
        let user_id = message.from.as_ref().map(|user| user.id).unwrap_or(chat_id);
        tracing::Span::current().record("user_id", &user_id);

        let text = match message.text {
            Some(text) => text,
            None => return Ok(()),
        };
        let command = Command::parse(&text);

        if command == Some(Command::Cancel) {
            return self.cancel(chat_id, user_id).await;
        }

        let dialogue = match self.dialogues.get(user_id).await {
            Ok(dialogue) => dialogue,
            Err(err) => {
                tracing::error!("Failed to load the dialogue, ignoring it: {:?}", err);
                None
            }
        };

        if let Some(state) = dialogue {
            let is_reply = command.as_ref().map_or(true, Command::is_dialogue_reply);
            if is_reply {
                return self.continue_dialogue(chat_id, user_id, state, &text).await;
            }
            // Any other command abandons the dialogue
            self.dialogues.clear(user_id).await?;
        }

        match command {
            Some(Command::Start) => self.reply(chat_id, HELP_TEXT).await,
            Some(Command::Settings) => self.settings_menu(chat_id).await,
            Some(Command::Subscribe) => self.start_subscription(chat_id, user_id).await,
            Some(Command::Unsubscribe) => self.unsubscribe(chat_id, user_id).await,
            Some(Command::ShowSubscriptions) => self.show_subscriptions(chat_id, user_id).await,
            Some(Command::Vacancies(keywords)) => {
                self.search_vacancies(chat_id, user_id, keywords).await
            }
            Some(Command::News) => self.send_news(chat_id).await,
            Some(Command::Pylint) => self.start_lint(chat_id, user_id).await,
            Some(Command::Tip) => self.send_tip(chat_id, user_id).await,
            Some(Command::Learn) => self.send_resources(chat_id, user_id).await,
            Some(Command::Confirm) | Some(Command::Skip) => {
                self.reply(chat_id, "There is nothing to confirm or skip right now.")
                    .await
            }
            Some(Command::Cancel) | Some(Command::Unknown(_)) | None => {
                self.reply(
                    chat_id,
                    "I did not get that. Send /start to see what I can do.",
                )
                .await
            }
        }
    }

    async fn continue_dialogue(
        &self,
        chat_id: i64,
        user_id: i64,
        state: DialogueState,
        text: &str,
    ) -> Result<(), BotError> {
        match state {
            DialogueState::AwaitingCode => self.lint_code(chat_id, user_id, text).await,
            state => self.continue_subscription(chat_id, user_id, state, text).await,
        }
    }

    async fn cancel(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        self.dialogues.clear(user_id).await?;
        self.reply(chat_id, "Cancelled.").await
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        self.telegram_client.send_message(chat_id, text).await?;
        Ok(())
    }

    async fn handle_callback_query(&self, callback_query: CallbackQuery) -> Result<(), BotError> {
        // Stops the loading indicator on the button, failures here are cosmetic
        if let Err(err) = self
            .telegram_client
            .answer_callback_query(&callback_query.id)
            .await
        {
            tracing::warn!("Failed to answer a callback query: {:?}", err);
        }

        let user_id = callback_query.from.id;
        let chat_id = callback_query
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .unwrap_or(user_id);

        match callback_query.data.as_deref() {
            Some(data) => self.handle_settings_callback(chat_id, user_id, data).await,
            None => Ok(()),
        }
    }
}

/// Long polls Telegram for updates and hands them to the dispatcher, one at a time, forever.
pub async fn run_update_poller(dispatcher: Arc<Dispatcher>, long_polling_seconds: u64) {
    let mut offset: Option<i64> = None;

    loop {
        match dispatcher
            .telegram_client
            .get_updates(offset, long_polling_seconds)
            .await
        {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    dispatcher.handle_update(update).await;
                }
            }
            Err(err) => {
                tracing::error!("Failed to fetch updates: {:?}", err);
                tokio::time::sleep(POLLING_RETRY_DELAY).await;
            }
        }
    }
}
