use chrono::{Duration, SecondsFormat, Utc};
use reqwest::{header, Client, StatusCode};
use std::time;

use crate::domain::level::Level;
use crate::domain::listing::Listing;
use crate::utils::error_chain_fmt;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// HTTP client for the job search service (hh.ru compatible `/vacancies` endpoint).
pub struct ListingsClient {
    http_client: Client,
    base_url: String,
}

/// Filters for one search. `since_minutes` restricts results to listings published in the
/// last N minutes and asks for the most recent ones first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingsQuery {
    pub keywords: Option<String>,
    pub level: Option<Level>,
    pub area: Option<String>,
    pub page_size: u32,
    pub since_minutes: Option<i64>,
}

#[derive(serde::Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(serde::Deserialize)]
struct SearchItem {
    name: String,
    alternate_url: String,
}

#[derive(thiserror::Error)]
pub enum ListingsError {
    #[error("Failed to reach the listings service.")]
    Unreachable(#[source] reqwest::Error),
    #[error("The listings service answered with status {0}.")]
    UnexpectedStatus(StatusCode),
    #[error("The listings service returned a body that could not be decoded.")]
    InvalidBody(#[source] reqwest::Error),
}

impl std::fmt::Debug for ListingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ListingsQuery {
    /// Search text: level first, then keywords, space separated.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .level
            .as_ref()
            .map(|level| level.as_ref())
            .into_iter()
            .chain(self.keywords.as_deref().filter(|k| !k.trim().is_empty()))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl ListingsClient {
    pub fn new(
        base_url: String,
        user_agent: &str,
        timeout: Option<time::Duration>,
    ) -> Result<ListingsClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .user_agent(user_agent)
            .build()?;

        Ok(ListingsClient {
            http_client,
            base_url,
        })
    }

    #[tracing::instrument(name = "Fetching listings", skip(self))]
    pub async fn fetch(&self, query: &ListingsQuery) -> Result<Vec<Listing>, ListingsError> {
        let url = format!("{}/vacancies", self.base_url);
        let text = query.text();
        let mut params: Vec<(&str, String)> = vec![("per_page", query.page_size.to_string())];

        if let Some(text) = &text {
            params.push(("text", text.clone()));
        }

        if let Some(area) = &query.area {
            params.push(("area", area.clone()));
        }

        // A zero window means the caller does not know how far back to look
        if let Some(minutes) = query.since_minutes.filter(|minutes| *minutes > 0) {
            let date_from = (Utc::now() - Duration::minutes(minutes))
                .to_rfc3339_opts(SecondsFormat::Secs, false);
            params.push(("date_from", date_from));
            params.push(("order_by", String::from("publication_time")));
        }

        let response = self
            .http_client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await
            .map_err(ListingsError::Unreachable)?;

        if !response.status().is_success() {
            return Err(ListingsError::UnexpectedStatus(response.status()));
        }

        let body: SearchResponse = response.json().await.map_err(ListingsError::InvalidBody)?;

        tracing::info!("Received {} listings", body.items.len());

        Ok(body
            .items
            .into_iter()
            .map(|item| Listing {
                title: item.name,
                url: item.alternate_url,
                query: text.clone(),
            })
            .collect())
    }
}
