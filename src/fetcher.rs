use std::time::Duration;

use reqwest::Client;
use tracing::info;

/// Downloads the raw trends feed.
pub struct FeedFetcher {
    client: Client,
    feed_url: String,
}

impl FeedFetcher {
    pub fn new(feed_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("TrendPress/1.0 (Trends Reader)")
            .build()?;

        Ok(Self {
            client,
            feed_url: feed_url.into(),
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Single attempt; any non-2xx status is an error.
    pub async fn fetch(&self) -> Result<String, reqwest::Error> {
        info!("Fetching trends feed: {}", self.feed_url);

        let response = self
            .client
            .get(&self.feed_url)
            .send()
            .await?
            .error_for_status()?;
        response.text().await
    }
}
