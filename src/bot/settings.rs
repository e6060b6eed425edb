use super::{BotError, Dispatcher};
use crate::domain::level::Level;
use crate::telegram_client::{escape_html, InlineButton, InlineKeyboard};

fn main_menu() -> InlineKeyboard {
    InlineKeyboard::single_column(vec![
        InlineButton::new("City", "settings:city"),
        InlineButton::new("Level", "settings:level"),
        InlineButton::new("Show my settings", "settings:show"),
    ])
}

fn back_button() -> InlineButton {
    InlineButton::new("Back", "settings:main")
}

impl Dispatcher {
    pub(super) async fn settings_menu(&self, chat_id: i64) -> Result<(), BotError> {
        self.telegram_client
            .send_message_with_keyboard(chat_id, "What do you want to change?", &main_menu())
            .await?;
        Ok(())
    }

    /// Dispatches inline keyboard presses: `settings:*`, `set_city:<id>`, `set_level:<level>`.
    #[tracing::instrument(name = "Handling a settings button", skip(self))]
    pub(super) async fn handle_settings_callback(
        &self,
        chat_id: i64,
        user_id: i64,
        data: &str,
    ) -> Result<(), BotError> {
        let (action, argument) = data.split_once(':').unwrap_or((data, ""));

        match (action, argument) {
            ("settings", "main") => self.settings_menu(chat_id).await,
            ("settings", "city") => {
                let mut buttons: Vec<InlineButton> = self
                    .options
                    .cities
                    .iter()
                    .map(|(id, name)| InlineButton::new(name.as_str(), format!("set_city:{}", id)))
                    .collect();
                buttons.push(back_button());

                self.telegram_client
                    .send_message_with_keyboard(
                        chat_id,
                        "Choose your city:",
                        &InlineKeyboard::single_column(buttons),
                    )
                    .await?;
                Ok(())
            }
            ("settings", "level") => {
                let mut buttons: Vec<InlineButton> = Level::ALL
                    .iter()
                    .map(|level| {
                        InlineButton::new(level.display_name(), format!("set_level:{}", level.as_ref()))
                    })
                    .collect();
                buttons.push(back_button());

                self.telegram_client
                    .send_message_with_keyboard(
                        chat_id,
                        "Choose your level:",
                        &InlineKeyboard::single_column(buttons),
                    )
                    .await?;
                Ok(())
            }
            ("settings", "show") => self.show_settings(chat_id, user_id).await,
            ("set_city", city_id) if self.options.cities.contains_key(city_id) => {
                self.settings.set_city(user_id, city_id).await?;
                let name = self.city_name(city_id);
                self.reply(chat_id, &format!("City set to {}.", escape_html(&name)))
                    .await
            }
            ("set_level", level) => match Level::parse(level.to_string()) {
                Ok(level) => {
                    self.settings.set_level(user_id, level).await?;
                    self.reply(chat_id, &format!("Level set to {}.", level.display_name()))
                        .await
                }
                Err(_) => {
                    tracing::warn!("Unknown level in a callback");
                    Ok(())
                }
            },
            _ => {
                tracing::warn!("Unknown callback data");
                Ok(())
            }
        }
    }

    async fn show_settings(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        let settings = self.settings.get(user_id).await?;
        let city_id = settings
            .city_id
            .unwrap_or_else(|| self.options.default_city.clone());
        let level = settings.level.unwrap_or_default();

        self.reply(
            chat_id,
            &format!(
                "Your settings:\nCity: {}\nLevel: {}",
                escape_html(&self.city_name(&city_id)),
                level.display_name()
            ),
        )
        .await
    }

    /// Configured name of a city, the id itself when it is not configured.
    pub(super) fn city_name(&self, city_id: &str) -> String {
        self.options
            .cities
            .get(city_id)
            .cloned()
            .unwrap_or_else(|| city_id.to_string())
    }
}
