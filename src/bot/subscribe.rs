use super::{BotError, Command, Dispatcher};
use crate::dialogue::{DialogueState, SubscriptionForm};
use crate::domain::frequency::Frequency;
use crate::domain::keywords::Keywords;
use crate::domain::level::Level;
use crate::domain::subscription::NewSubscription;
use crate::telegram_client::escape_html;

const NOT_SET: &str = "not set";

impl Dispatcher {
    pub(super) async fn start_subscription(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        self.dialogues
            .set(user_id, &DialogueState::AwaitingKeywords)
            .await?;

        self.reply(
            chat_id,
            "Let's set up a subscription.\nWhich keywords should I search for? (e.g. <i>python django</i>)\nSend /cancel at any time to stop.",
        )
        .await
    }

    /// Feeds one answer to the subscription wizard and moves it to the next state.
    #[tracing::instrument(name = "Continuing the subscription wizard", skip(self, state, text))]
    pub(super) async fn continue_subscription(
        &self,
        chat_id: i64,
        user_id: i64,
        state: DialogueState,
        text: &str,
    ) -> Result<(), BotError> {
        let skipped = Command::parse(text) == Some(Command::Skip);

        match state {
            DialogueState::AwaitingKeywords => match Keywords::parse(text.to_string()) {
                Ok(keywords) => {
                    let form = SubscriptionForm {
                        keywords: Some(keywords.as_ref().to_string()),
                        ..SubscriptionForm::default()
                    };
                    self.dialogues
                        .set(user_id, &DialogueState::AwaitingLevel { form })
                        .await?;
                    self.reply(
                        chat_id,
                        "Which level? Send junior, middle or senior, or /skip.",
                    )
                    .await
                }
                Err(_) => {
                    self.reply(
                        chat_id,
                        "Keywords must be a non-empty text of at most 256 characters. Try again.",
                    )
                    .await
                }
            },
            DialogueState::AwaitingLevel { mut form } => {
                if !skipped {
                    match Level::parse(text.to_string()) {
                        Ok(level) => form.level = Some(level),
                        Err(_) => {
                            return self
                                .reply(
                                    chat_id,
                                    "Please send junior, middle or senior, or /skip.",
                                )
                                .await
                        }
                    }
                }
                self.dialogues
                    .set(user_id, &DialogueState::AwaitingArea { form })
                    .await?;
                self.reply(chat_id, &self.area_prompt()).await
            }
            DialogueState::AwaitingArea { mut form } => {
                if !skipped {
                    match self.parse_area(text) {
                        Some(area) => form.area = Some(area),
                        None => return self.reply(chat_id, &self.area_prompt()).await,
                    }
                }
                self.dialogues
                    .set(user_id, &DialogueState::AwaitingFrequency { form })
                    .await?;
                self.reply(chat_id, "How often? Send daily or weekly.").await
            }
            DialogueState::AwaitingFrequency { mut form } => {
                let frequency = match Frequency::parse(text.to_string()) {
                    Ok(frequency) => frequency,
                    Err(_) => return self.reply(chat_id, "Please send daily or weekly.").await,
                };
                form.frequency = Some(frequency.as_ref().to_string());

                let preview = format!(
                    "Your subscription:\n{}\n\nSend /confirm to save it or /cancel to drop it.",
                    self.describe(
                        form.keywords.as_deref(),
                        form.level,
                        form.area.as_deref(),
                        &frequency
                    )
                );
                self.dialogues
                    .set(user_id, &DialogueState::AwaitingConfirmation { form })
                    .await?;
                self.reply(chat_id, &preview).await
            }
            DialogueState::AwaitingConfirmation { form } => {
                if Command::parse(text) != Some(Command::Confirm) {
                    return self
                        .reply(chat_id, "Send /confirm to save the subscription or /cancel to drop it.")
                        .await;
                }
                self.confirm_subscription(chat_id, user_id, form).await
            }
            DialogueState::AwaitingCode => Ok(()),
        }
    }

    async fn confirm_subscription(
        &self,
        chat_id: i64,
        user_id: i64,
        form: SubscriptionForm,
    ) -> Result<(), BotError> {
        let frequency = form
            .frequency
            .map(Frequency::from_stored)
            .unwrap_or(Frequency::Daily);

        let subscription = self
            .subscriptions
            .insert(NewSubscription {
                subscriber_id: user_id,
                keywords: form.keywords,
                level: form.level,
                area: form.area,
                frequency,
            })
            .await?;
        self.dialogues.clear(user_id).await?;

        tracing::info!(subscription_id = %subscription.id, "New subscription saved");

        self.reply(
            chat_id,
            "Subscription saved! The first vacancies will arrive with the next delivery.",
        )
        .await
    }

    pub(super) async fn show_subscriptions(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        let subscriptions = self.subscriptions.find_by_subscriber(user_id).await?;

        if subscriptions.is_empty() {
            return self
                .reply(chat_id, "You have no subscriptions. Send /subscribe to create one.")
                .await;
        }

        let listed: Vec<String> = subscriptions
            .iter()
            .enumerate()
            .map(|(index, subscription)| {
                format!(
                    "{}.\n{}",
                    index + 1,
                    self.describe(
                        subscription.keywords.as_deref(),
                        subscription.level,
                        subscription.area.as_deref(),
                        &subscription.frequency,
                    )
                )
            })
            .collect();

        self.reply(
            chat_id,
            &format!("Your subscriptions:\n\n{}", listed.join("\n\n")),
        )
        .await
    }

    pub(super) async fn unsubscribe(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        let removed = self.subscriptions.delete_by_subscriber(user_id).await?;

        let text = if removed == 0 {
            String::from("You have no subscriptions.")
        } else {
            format!("Removed {} subscription(s).", removed)
        };
        self.reply(chat_id, &text).await
    }

    fn area_prompt(&self) -> String {
        let cities: Vec<String> = self
            .options
            .cities
            .iter()
            .map(|(id, name)| format!("{} - {}", id, escape_html(name)))
            .collect();

        format!(
            "Which area? Send a city name or id, or /skip.\n{}",
            cities.join("\n")
        )
    }

    /// Accepts a configured city name (case-insensitive) or any area id.
    fn parse_area(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() || text.starts_with('/') {
            return None;
        }

        let by_name = self
            .options
            .cities
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(text))
            .map(|(id, _)| id.clone());

        if by_name.is_some() {
            return by_name;
        }

        text.chars()
            .all(|c| c.is_ascii_digit())
            .then(|| text.to_string())
    }

    fn describe(
        &self,
        keywords: Option<&str>,
        level: Option<Level>,
        area: Option<&str>,
        frequency: &Frequency,
    ) -> String {
        let area = area.map(|id| match self.options.cities.get(id) {
            Some(name) => format!("{} ({})", name, id),
            None => id.to_string(),
        });

        format!(
            "Keywords: {}\nLevel: {}\nArea: {}\nFrequency: {}",
            keywords.map(escape_html).as_deref().unwrap_or(NOT_SET),
            level.map(|level| level.display_name()).unwrap_or(NOT_SET),
            area.map(|area| escape_html(&area)).as_deref().unwrap_or(NOT_SET),
            escape_html(frequency.as_ref()),
        )
    }
}
