use super::{BotError, Dispatcher};
use crate::feeds::latest;
use crate::telegram_client::escape_html;

const NEWS_COUNT: usize = 5;

impl Dispatcher {
    #[tracing::instrument(name = "Sending the latest news", skip(self))]
    pub(super) async fn send_news(&self, chat_id: i64) -> Result<(), BotError> {
        let mut entries = Vec::new();

        for url in &self.options.feeds {
            match self.feed_client.fetch(url).await {
                Ok(feed_entries) => entries.extend(feed_entries),
                Err(err) => tracing::warn!(feed = %url, "Skipping a feed: {:?}", err),
            }
        }

        let entries = latest(entries, NEWS_COUNT);
        if entries.is_empty() {
            return self.reply(chat_id, "No news yet.").await;
        }

        for entry in entries {
            let date = entry
                .date()
                .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();

            self.reply(
                chat_id,
                &format!("<b>{}</b>\n{}\n{}", escape_html(&entry.title), date, entry.link),
            )
            .await?;
        }

        Ok(())
    }
}
