//! Helper utilities shared by the monitoring-engine integration tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use trendwatch::VideoObservation;
use trendwatch::config::Config;
use trendwatch::feed::DiscoveryFeed;
use trendwatch::storage::StorageBackend;
use trendwatch::storage::memory::MemoryBackend;
use trendwatch::supervisor::MonitorSupervisor;

/// One canned upstream video served by [`ScriptedFeed`].
#[derive(Clone)]
pub struct ScriptedVideo {
    pub video_id: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub age_hours: i64,
}

pub fn video(video_id: &str, views: u64, likes: u64, comments: u64) -> ScriptedVideo {
    ScriptedVideo {
        video_id: video_id.to_string(),
        views,
        likes,
        comments,
        age_hours: 10,
    }
}

/// Feed double serving canned videos per channel.
///
/// Records every channel fetch so tests can assert which channels were
/// (or were not) contacted. With `fixed_observed_at` set, every served
/// observation carries that timestamp, making repeat cycles produce
/// identical observations.
pub struct ScriptedFeed {
    videos: HashMap<String, Vec<ScriptedVideo>>,
    fixed_observed_at: Option<DateTime<Utc>>,
    fetched_channels: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self {
            videos: HashMap::new(),
            fixed_observed_at: None,
            fetched_channels: Mutex::new(Vec::new()),
        }
    }

    pub fn with_video(mut self, channel_id: &str, video: ScriptedVideo) -> Self {
        self.videos
            .entry(channel_id.to_string())
            .or_default()
            .push(video);
        self
    }

    pub fn with_fixed_observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.fixed_observed_at = Some(at);
        self
    }

    /// Channels fetched so far, in call order.
    pub fn fetched_channels(&self) -> Vec<String> {
        self.fetched_channels.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched_channels.lock().unwrap().len()
    }
}

#[async_trait]
impl DiscoveryFeed for ScriptedFeed {
    async fn list_channel_videos(
        &self,
        channel_id: &str,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<VideoObservation>> {
        self.fetched_channels
            .lock()
            .unwrap()
            .push(channel_id.to_string());

        let observed_at = self.fixed_observed_at.unwrap_or_else(Utc::now);
        Ok(self
            .videos
            .get(channel_id)
            .map(|videos| {
                videos
                    .iter()
                    .map(|v| {
                        VideoObservation::new(
                            v.video_id.clone(),
                            channel_id,
                            v.views,
                            v.likes,
                            v.comments,
                            observed_at - Duration::hours(v.age_hours),
                            observed_at,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn video_statistics(&self, _video_ids: &[String]) -> Result<Vec<VideoObservation>> {
        Ok(Vec::new())
    }
}

/// Build an engine over in-memory storage with the given feed and daily
/// quota limit. The storage handle is returned separately for direct
/// assertions against persisted state.
pub fn engine(
    feed: Arc<ScriptedFeed>,
    daily_limit: u64,
) -> (Arc<dyn StorageBackend>, MonitorSupervisor) {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let mut config = Config::default();
    config.quota.daily_limit = daily_limit;

    let supervisor = MonitorSupervisor::new(storage.clone(), feed, config);
    (storage, supervisor)
}
