pub mod actors;
pub mod config;
pub mod feed;
pub mod folders;
pub mod logging;
pub mod metrics;
pub mod quota;
pub mod rules;
pub mod storage;
pub mod supervisor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a video's public counters at one point in time.
///
/// Observations are never mutated; a refresh produces a new observation for
/// the same `video_id` which supersedes the old one. The storage layer keeps
/// the previous observation around so growth rate has a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoObservation {
    pub video_id: String,
    pub channel_id: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub published_at: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

impl VideoObservation {
    /// Create a new observation.
    ///
    /// Upholds the `observed_at >= published_at` invariant: an observation
    /// claiming to predate its own publish time (clock skew between us and
    /// the upstream platform) is clamped to the publish time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        video_id: impl Into<String>,
        channel_id: impl Into<String>,
        view_count: u64,
        like_count: u64,
        comment_count: u64,
        published_at: DateTime<Utc>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            channel_id: channel_id.into(),
            view_count,
            like_count,
            comment_count,
            published_at,
            observed_at: observed_at.max(published_at),
        }
    }

    /// Hours between publish and this observation. Never negative.
    pub fn age_hours(&self) -> f64 {
        let seconds = (self.observed_at - self.published_at).num_seconds();
        (seconds.max(0) as f64) / 3600.0
    }
}
