//! Discovery feed collaborator
//!
//! The upstream video platform is consumed through the `DiscoveryFeed`
//! trait: list a channel's recent videos, or refresh statistics for known
//! video ids. Every call has a declared unit cost (see `quota`) that the
//! scheduler checks against the daily budget before fetching.
//!
//! `HttpDiscoveryFeed` adapts a JSON HTTP API. Errors are returned to the
//! caller and end the current cycle; the scheduler retries on its next
//! tick, so nothing here needs retry logic of its own.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{instrument, trace};

use crate::VideoObservation;
use crate::config::FeedConfig;

/// Source of fresh video observations.
#[async_trait]
pub trait DiscoveryFeed: Send + Sync {
    /// Videos a channel published since `since` (all recent uploads when
    /// `None`), with their current statistics.
    async fn list_channel_videos(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<VideoObservation>>;

    /// Current statistics for specific videos. Unknown ids are simply
    /// absent from the result, not an error.
    async fn video_statistics(&self, video_ids: &[String]) -> Result<Vec<VideoObservation>>;
}

/// Wire shape of one video item in the upstream response.
#[derive(Debug, Deserialize)]
struct FeedVideo {
    video_id: String,
    channel_id: String,
    view_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    comment_count: u64,
    published_at: DateTime<Utc>,
}

impl FeedVideo {
    fn into_observation(self, observed_at: DateTime<Utc>) -> VideoObservation {
        VideoObservation::new(
            self.video_id,
            self.channel_id,
            self.view_count,
            self.like_count,
            self.comment_count,
            self.published_at,
            observed_at,
        )
    }
}

/// HTTP adapter for the upstream discovery API.
pub struct HttpDiscoveryFeed {
    /// HTTP client (reused across requests for efficiency)
    client: reqwest::Client,
    config: FeedConfig,
}

impl HttpDiscoveryFeed {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    async fn fetch_videos(&self, url: &str) -> Result<Vec<VideoObservation>> {
        trace!("requesting videos from {url}");

        let mut request = self.client.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().await.context("failed to send HTTP request")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        let videos: Vec<FeedVideo> =
            serde_json::from_str(&body).context("failed to parse feed JSON")?;

        let observed_at = Utc::now();
        Ok(videos
            .into_iter()
            .map(|v| v.into_observation(observed_at))
            .collect())
    }
}

#[async_trait]
impl DiscoveryFeed for HttpDiscoveryFeed {
    #[instrument(skip(self))]
    async fn list_channel_videos(
        &self,
        channel_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<VideoObservation>> {
        let mut url = format!(
            "{}/channels/{channel_id}/videos",
            self.config.base_url.trim_end_matches('/')
        );
        if let Some(since) = since {
            // "Z" suffix instead of "+00:00": no characters needing escaping.
            url.push_str(&format!(
                "?since={}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }

        self.fetch_videos(&url).await
    }

    #[instrument(skip(self, video_ids), fields(count = video_ids.len()))]
    async fn video_statistics(&self, video_ids: &[String]) -> Result<Vec<VideoObservation>> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/videos?ids={}",
            self.config.base_url.trim_end_matches('/'),
            video_ids.join(",")
        );

        self.fetch_videos(&url).await
    }
}
