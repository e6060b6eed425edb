use super::{BotError, Dispatcher};
use crate::delivery::PAGE_SIZE;
use crate::listings_client::ListingsQuery;

const DEFAULT_KEYWORDS: &str = "python";

impl Dispatcher {
    /// One-off search with the user's settings, no recency window.
    #[tracing::instrument(name = "Searching vacancies on demand", skip(self))]
    pub(super) async fn search_vacancies(
        &self,
        chat_id: i64,
        user_id: i64,
        keywords: Option<String>,
    ) -> Result<(), BotError> {
        let settings = self.settings.get(user_id).await?;

        let query = ListingsQuery {
            keywords: Some(keywords.unwrap_or_else(|| DEFAULT_KEYWORDS.to_string())),
            level: settings.level,
            area: Some(
                settings
                    .city_id
                    .unwrap_or_else(|| self.options.default_city.clone()),
            ),
            page_size: PAGE_SIZE,
            since_minutes: None,
        };

        let listings = match self.listings_client.fetch(&query).await {
            Ok(listings) => listings,
            Err(err) => {
                tracing::error!("Failed to search vacancies: {:?}", err);
                return self
                    .reply(
                        chat_id,
                        "Sorry, the vacancy search is not available right now. Try again later.",
                    )
                    .await;
            }
        };

        if listings.is_empty() {
            return self.reply(chat_id, "No vacancies found.").await;
        }

        for listing in &listings {
            self.reply(chat_id, &listing.to_message()).await?;
        }

        Ok(())
    }
}
