use crate::telegram_client::escape_html;

/// One job posting returned by the listings service. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub title: String,
    pub url: String,
    /// Query text the listing matched, if any was sent.
    pub query: Option<String>,
}

impl Listing {
    /// Chat message announcing this listing (HTML parse mode).
    pub fn to_message(&self) -> String {
        format!("<b>{}</b>\n{}", escape_html(&self.title), self.url)
    }
}
