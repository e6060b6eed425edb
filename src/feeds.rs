use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time;

use crate::utils::error_chain_fmt;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedEntry {
    /// Publication date, falling back to the last update.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.published.or(self.updated)
    }
}

#[derive(thiserror::Error)]
pub enum FeedError {
    #[error("Failed to download the feed.")]
    Download(#[from] reqwest::Error),
    #[error("Failed to parse the feed.")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

impl std::fmt::Debug for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Downloads and parses RSS / Atom feeds.
pub struct FeedClient {
    http_client: Client,
}

impl FeedClient {
    pub fn new(timeout: Option<time::Duration>) -> Result<FeedClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(FeedClient { http_client })
    }

    #[tracing::instrument(name = "Fetching a news feed", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        let body = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let feed = feed_rs::parser::parse(body.as_ref())?;

        Ok(feed
            .entries
            .into_iter()
            .map(|entry| FeedEntry {
                title: entry
                    .title
                    .map(|title| title.content)
                    .unwrap_or_default(),
                link: entry
                    .links
                    .into_iter()
                    .next()
                    .map(|link| link.href)
                    .unwrap_or_default(),
                published: entry.published,
                updated: entry.updated,
            })
            .collect())
    }
}

/// Newest `count` entries, undated entries last.
pub fn latest(mut entries: Vec<FeedEntry>, count: usize) -> Vec<FeedEntry> {
    // None sorts before any date, so reversing the comparison puts undated entries at the end
    entries.sort_by(|a, b| b.date().cmp(&a.date()));
    entries.truncate(count);
    entries
}
