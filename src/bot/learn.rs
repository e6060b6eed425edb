use super::{BotError, Dispatcher};
use crate::domain::level::Level;
use crate::telegram_client::escape_html;

impl Dispatcher {
    pub(super) async fn send_tip(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        let level = self.user_level(user_id).await?;

        let text = match self.learning.random_tip(level) {
            Some(tip) => format!("Tip for {}:\n{}", level.display_name(), escape_html(tip)),
            None => format!("No tips for {} yet.", level.display_name()),
        };
        self.reply(chat_id, &text).await
    }

    pub(super) async fn send_resources(&self, chat_id: i64, user_id: i64) -> Result<(), BotError> {
        let level = self.user_level(user_id).await?;
        let resources = self.learning.resources(level);

        let text = if resources.is_empty() {
            format!("No resources for {} yet.", level.display_name())
        } else {
            let items: Vec<String> = resources
                .iter()
                .map(|resource| format!("• {}", escape_html(resource)))
                .collect();
            format!(
                "Resources for {}:\n{}",
                level.display_name(),
                items.join("\n")
            )
        };
        self.reply(chat_id, &text).await
    }

    async fn user_level(&self, user_id: i64) -> Result<Level, BotError> {
        Ok(self.settings.get(user_id).await?.level.unwrap_or_default())
    }
}
